//! Span-based source edits.
//!
//! Rewrites are expressed as byte-range replacements against the original
//! text, so everything the transformer does not touch is kept exactly,
//! comments and formatting included.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    start: u32,
    end: u32,
    text: String,
    /// Order of insertion, to keep same-offset inserts stable.
    seq: usize,
}

#[derive(Debug, Default)]
pub(crate) struct SourceEdits {
    edits: Vec<Edit>,
}

impl SourceEdits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, at: u32, text: impl Into<String>) {
        self.replace(at, at, text);
    }

    pub fn replace(&mut self, start: u32, end: u32, text: impl Into<String>) {
        let seq = self.edits.len();
        self.edits.push(Edit {
            start,
            end,
            text: text.into(),
            seq,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Apply all edits to `source`.
    ///
    /// Inserts at the same offset keep their insertion order and come before
    /// a replacement starting there. Two replacements that overlap fail.
    pub fn apply(mut self, path: &str, source: &str) -> Result<String> {
        self.edits
            .sort_by_key(|e| (e.start, e.end != e.start, e.seq));

        let added: usize = self.edits.iter().map(|e| e.text.len()).sum();
        let mut out = String::with_capacity(source.len() + added);
        let mut cursor = 0usize;

        for edit in &self.edits {
            let start = edit.start as usize;
            let end = edit.end as usize;
            if start < cursor || end > source.len() || end < start {
                return Err(Error::OverlappingEdits {
                    path: path.to_string(),
                    offset: edit.start,
                });
            }
            out.push_str(&source[cursor..start]);
            out.push_str(&edit.text);
            cursor = end;
        }
        out.push_str(&source[cursor..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_inserts_and_replacements_in_offset_order() {
        let mut edits = SourceEdits::new();
        edits.replace(6, 11, "there");
        edits.insert(0, "// a\n");
        edits.insert(11, "!");
        assert_eq!(edits.apply("x.ts", "hello world").unwrap(), "// a\nhello there!");
    }

    #[test]
    fn same_offset_inserts_keep_order_before_replacement() {
        let mut edits = SourceEdits::new();
        edits.replace(0, 1, "B");
        edits.insert(0, "1");
        edits.insert(0, "2");
        assert_eq!(edits.apply("x.ts", "b").unwrap(), "12B");
    }

    #[test]
    fn overlapping_replacements_fail() {
        let mut edits = SourceEdits::new();
        edits.replace(0, 4, "x");
        edits.replace(2, 6, "y");
        let err = edits.apply("src/a.ts", "abcdefgh").unwrap_err();
        assert!(matches!(err, Error::OverlappingEdits { offset: 2, .. }));
    }
}
