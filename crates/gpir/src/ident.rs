//! Identifier validation and string quoting.

use std::sync::LazyLock;

use regex::Regex;

/// The identifier alphabet shared by every named IR entity.
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^[A-Za-z_][A-Za-z0-9_.]*$").expect("identifier regex is well-formed")
});

/// Whether a name satisfies the identifier regex.
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Quote a string for the module header, escaping `"`, `\`, and the
/// whitespace control characters.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Undo [`quote`] on the contents between the quotes.
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
