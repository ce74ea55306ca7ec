use oxc_span::Span;

/// Precomputed line starts for offset → line lookups.
pub(crate) struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { line_starts }
    }

    /// 1-based line containing `offset`.
    pub fn line(&self, offset: u32) -> u32 {
        let idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(0) => 0,
            Err(idx) => idx - 1,
        };
        (idx + 1) as u32
    }

    /// Byte offset where the line containing `offset` begins.
    pub fn line_start(&self, offset: u32) -> u32 {
        let idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(0) => 0,
            Err(idx) => idx - 1,
        };
        self.line_starts[idx]
    }
}

/// Source text covered by `span`, or "" if the span is out of range.
pub(crate) fn slice(source: &str, span: Span) -> &str {
    source
        .get(span.start as usize..span.end as usize)
        .unwrap_or_default()
}

/// Text with all whitespace removed. Used to normalize written type arguments.
pub(crate) fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Leading whitespace of the line containing `offset`.
pub(crate) fn indentation_at(source: &str, index: &LineIndex, offset: u32) -> String {
    let start = index.line_start(offset) as usize;
    source[start..]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_lookup() {
        let source = "a\nbb\n\nccc";
        let index = LineIndex::new(source);
        assert_eq!(index.line(0), 1);
        assert_eq!(index.line(2), 2);
        assert_eq!(index.line(5), 3);
        assert_eq!(index.line(7), 4);
        assert_eq!(index.line_start(8), 6);
    }

    #[test]
    fn indentation_is_taken_from_the_line_start() {
        let source = "function f() {\n    return 1;\n}";
        let index = LineIndex::new(source);
        assert_eq!(indentation_at(source, &index, 20), "    ");
        assert_eq!(indentation_at(source, &index, 3), "");
    }

    #[test]
    fn compact_strips_whitespace() {
        assert_eq!(compact("Map< string ,\n User >"), "Map<string,User>");
    }
}
