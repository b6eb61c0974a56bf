//! Codec for the legacy `key:type:value` strings used by pre-version-3
//! documents. The separator is `:`; a literal `:` or `\` inside a segment is
//! escaped with a leading backslash.

const SEPARATOR: char = ':';

const ESCAPE: char = '\\';

/// Splits an escaped legacy string into its unescaped segments.
pub fn split_unescape(raw: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            ESCAPE => {
                // A trailing lone backslash is kept as-is.
                if let Some(next) = chars.next() {
                    current.push(next);
                } else {
                    current.push(ESCAPE);
                }
            }
            SEPARATOR => {
                segments.push(std::mem::take(&mut current));
            }
            other => current.push(other),
        }
    }
    segments.push(current);
    segments
}

/// Escapes a single segment for embedding into a legacy string.
pub fn escape_segment(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for c in segment.chars() {
        if c == SEPARATOR || c == ESCAPE {
            escaped.push(ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Joins segments into an escaped legacy string.
pub fn join_escaped<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    segments
        .into_iter()
        .map(escape_segment)
        .collect::<Vec<_>>()
        .join(":")
}
