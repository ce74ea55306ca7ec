//! Canonical resolution keys.
//!
//! A key is the identity the runtime container uses to look up an
//! implementation. It must be usable both as a JavaScript identifier fragment
//! and as a path segment, and it must stay distinct when two contracts share a
//! name but live in different files:
//!
//! ```text
//! TodoServiceInterface                                          bare key
//! TodoServiceInterface__src_todo_interfaces_TodoInterfaces_ts_line_26
//! └── sanitized name ─┘  └────────── encoded path ──────────┘      └ line
//! ```
//!
//! Inside a location key every `_` of the name is written `_0`
//! (`Cache<User>` gives `Cache_0User_0__src_cache_ts_line_3`). The name
//! segment then never contains the separator or ends in `_`, so the first
//! `__` always starts the path.
//!
//! Every function here is pure: no registry lookups, no I/O.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between the sanitized contract name and the encoded origin.
const ORIGIN_SEPARATOR: &str = "__";
/// Marker between the encoded path and the line number.
const LINE_MARKER: &str = "_line_";
/// How `_` is written in the name segment of a location key.
const NAME_UNDERSCORE: &str = "_0";
/// Marker between a key and a request-site qualifier.
const QUALIFIER_MARKER: &str = "__qualifier_";

/// Canonical string identity of a contract.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolutionKey(String);

impl ResolutionKey {
    /// Wrap an already canonical key. Use [`sanitize`] or [`location_key`] to build one.
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_location_key(&self) -> bool {
        is_location_key(&self.0)
    }

    /// Key for a request that names a qualifier, e.g. `LoggerInterface__qualifier_verbose`.
    pub fn qualified(&self, qualifier: &str) -> ResolutionKey {
        ResolutionKey(format!("{}{QUALIFIER_MARKER}{}", self.0, sanitize(qualifier).0))
    }
}

impl fmt::Display for ResolutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResolutionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Origin recovered from a location key. Both fields are `None` for bare keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyLocation {
    /// The encoded path (`src_todo2_types_ts`), not the original path.
    pub file_path: Option<String>,
    pub line: Option<u32>,
}

impl KeyLocation {
    pub fn is_empty(&self) -> bool {
        self.file_path.is_none() && self.line.is_none()
    }
}

/// Make a contract name safe as an identifier and a path segment.
///
/// Whitespace is dropped and every other character outside `[A-Za-z0-9_]`
/// becomes `_`, which flattens generics: `Cache<string>` → `Cache_string_`.
pub fn sanitize(name: &str) -> ResolutionKey {
    let mut out = String::with_capacity(name.len() + 1);
    for ch in name.chars().filter(|c| !c.is_whitespace()) {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }

    if out.is_empty() {
        out.push('_');
    } else if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }

    ResolutionKey(out)
}

/// Key for a contract declared at `file_path:line`.
///
/// Falls back to [`sanitize`] when either part of the origin is missing.
/// `file_path` should already be relative to the project root; see
/// [`location_key_in`] to strip a root first.
pub fn location_key(name: &str, file_path: Option<&str>, line: Option<u32>) -> ResolutionKey {
    location_key_in(None, name, file_path, line)
}

/// [`location_key`] with an explicit project root stripped from `file_path`.
pub fn location_key_in(
    project_root: Option<&str>,
    name: &str,
    file_path: Option<&str>,
    line: Option<u32>,
) -> ResolutionKey {
    let base = sanitize(name);
    let (Some(path), Some(line)) = (file_path, line) else {
        return base;
    };

    let encoded = encode_path(path, project_root);
    if encoded.is_empty() {
        return base;
    }

    ResolutionKey(format!(
        "{}{ORIGIN_SEPARATOR}{encoded}{LINE_MARKER}{line}",
        base.0.replace('_', NAME_UNDERSCORE)
    ))
}

/// Undo the underscore escape of a name segment. `None` if the segment is not escaped text.
fn unescape_name(segment: &str) -> Option<Cow<'_, str>> {
    if !segment.contains('_') {
        return Some(Cow::Borrowed(segment));
    }
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c == '_' && chars.next() != Some('0') {
            return None;
        }
        out.push(c);
    }
    Some(Cow::Owned(out))
}

/// Encode a file path for embedding in a key.
///
/// The project root and any leading `./` or `/` are stripped, then every
/// non-alphanumeric character maps to one `_`. Runs are not collapsed.
pub fn encode_path(path: &str, project_root: Option<&str>) -> String {
    let normalized = path.replace('\\', "/");
    let mut rest = normalized.as_str();

    if let Some(root) = project_root {
        let root = root.replace('\\', "/");
        let root = root.trim_end_matches('/');
        if !root.is_empty() {
            if let Some(stripped) = rest.strip_prefix(root) {
                if stripped.is_empty() || stripped.starts_with('/') {
                    rest = stripped;
                }
            }
        }
    }

    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else {
            break;
        }
    }

    rest.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Split a key into (name, encoded path, line) when it has the location shape.
fn split_location_key(key: &str) -> Option<(Cow<'_, str>, &str, u32)> {
    let marker = key.rfind(LINE_MARKER)?;
    let line_text = &key[marker + LINE_MARKER.len()..];
    if line_text.is_empty() || !line_text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let line: u32 = line_text.parse().ok()?;
    let head = &key[..marker];

    let sep = head.find(ORIGIN_SEPARATOR)?;
    let segment = &head[..sep];
    let path = &head[sep + ORIGIN_SEPARATOR.len()..];
    if segment.is_empty() || path.is_empty() {
        return None;
    }
    Some((unescape_name(segment)?, path, line))
}

/// `true` if `key` was produced by [`location_key`] with a full origin.
pub fn is_location_key(key: &str) -> bool {
    split_location_key(key).is_some()
}

/// Recover the sanitized contract name. Bare or malformed keys are returned unchanged.
pub fn extract_interface_name(key: &str) -> Cow<'_, str> {
    match split_location_key(key) {
        Some((name, _, _)) => name,
        None => Cow::Borrowed(key),
    }
}

/// Recover the encoded origin. Bare or malformed keys yield an empty location.
pub fn extract_location(key: &str) -> KeyLocation {
    match split_location_key(key) {
        Some((_, path, line)) => KeyLocation {
            file_path: Some(path.to_string()),
            line: Some(line),
        },
        None => KeyLocation::default(),
    }
}
