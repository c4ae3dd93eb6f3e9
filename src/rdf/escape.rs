//! RDF literal escaping
//!
//! Dgraph's live loader accepts N-Quad literals with a fixed escape set:
//! backslash, double quote, newline, carriage return, and tab. Everything
//! else passes through verbatim (output is UTF-8).

/// Escape a raw string for use inside a double-quoted RDF literal.
///
/// Backslash is escaped first so already-escaped sequences in the source
/// data survive as literal two-character sequences.
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}
