//! Text normalization for comparison purposes
//!
//! Two flavors:
//! - `normalize_line_endings`: CRLF / stray CR -> LF. Only this one may be used
//!   before offset math, since line splitting must stay 1:1 with it.
//! - `normalize_strict`: additionally strips trailing whitespace per line and
//!   trims the whole string. Coarse containment checks only.
//!
//! Stored content is never mutated here.

use std::borrow::Cow;

/// Content ID for change detection (xxh64 hash)
pub type ContentId = String;

/// Convert `"\r\n"` and lone `"\r"` to `"\n"`.
///
/// Borrows when the input has no carriage returns.
pub fn normalize_line_endings(s: &str) -> Cow<'_, str> {
    if !s.contains('\r') {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Line-ending normalization plus per-line trailing whitespace removal and a
/// whole-string trim.
pub fn normalize_strict(s: &str) -> String {
    normalize_line_endings(s)
        .split('\n')
        .map(|l| l.trim_end_matches([' ', '\t']))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Coarse containment: does `haystack` contain `needle` once both are
/// strictly normalized?
pub fn contains_loosely(haystack: &str, needle: &str) -> bool {
    let needle = normalize_strict(needle);
    !needle.is_empty() && normalize_strict(haystack).contains(&needle)
}

/// Newline of the first line ending in a text. Defaults to LF.
pub fn detect_newline(s: &str) -> &'static str {
    newline_at(s, 0)
}

/// Newline ending the line that holds byte `at`. Past the last line ending,
/// the closest earlier one decides. Defaults to LF.
pub fn newline_at(s: &str, at: usize) -> &'static str {
    let bytes = s.as_bytes();
    let at = at.min(bytes.len());
    let nl = memchr::memchr(b'\n', &bytes[at..])
        .map(|i| at + i)
        .or_else(|| memchr::memrchr(b'\n', &bytes[..at]));
    match nl {
        Some(pos) if pos > 0 && bytes[pos - 1] == b'\r' => "\r\n",
        _ => "\n",
    }
}

/// True when the text has a carriage return that is not part of a CRLF pair.
/// Line/column positions then differ between raw and normalized text.
pub fn has_lone_cr(s: &str) -> bool {
    s.matches('\r').count() != s.matches("\r\n").count()
}

/// Generate deterministic content ID using xxh64 with fixed seed.
///
/// Insensitive to newline style and trailing whitespace.
pub fn generate_cid(content: &str) -> ContentId {
    let normalized = normalize_strict(content);
    let h = xxhash_rust::xxh64::xxh64(normalized.as_bytes(), 0);
    format!("{:016x}", h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_endings_are_unified() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\n"), "a\nb\nc\n");
        assert!(matches!(normalize_line_endings("a\nb"), Cow::Borrowed(_)));
    }

    #[test]
    fn line_ending_normalization_keeps_whitespace() {
        assert_eq!(normalize_line_endings("  a  \r\n\tb "), "  a  \n\tb ");
    }

    #[test]
    fn strict_strips_trailing_whitespace_and_trims() {
        assert_eq!(normalize_strict("\n  fn a() {  \r\n    x; \t\r\n}\n\n"), "fn a() {\n    x;\n}");
    }

    #[test]
    fn loose_containment_ignores_trailing_whitespace() {
        let hay = "fn a() {   \n    x;\n}\n";
        assert!(contains_loosely(hay, "fn a() {\n    x;  \n"));
        assert!(!contains_loosely(hay, "   "));
        assert!(!contains_loosely(hay, "y;"));
    }

    #[test]
    fn newline_detection() {
        assert_eq!(detect_newline("a\r\nb"), "\r\n");
        assert_eq!(detect_newline("a\nb\r\n"), "\n");
        assert_eq!(detect_newline("single"), "\n");
    }

    #[test]
    fn newline_follows_the_line_at_an_offset() {
        let mixed = "a\r\nb\nc\r\n";
        assert_eq!(newline_at(mixed, 0), "\r\n");
        assert_eq!(newline_at(mixed, 3), "\n");
        assert_eq!(newline_at(mixed, 5), "\r\n");
        assert_eq!(newline_at("x\r\ntail", 6), "\r\n");
    }

    #[test]
    fn lone_cr_detection() {
        assert!(!has_lone_cr("a\r\nb\r\n"));
        assert!(has_lone_cr("a\rb"));
        assert!(!has_lone_cr("plain"));
    }

    #[test]
    fn cid_is_deterministic_and_style_insensitive() {
        let lf = "fn test() {\n    println!(\"hello\");\n}";
        let crlf = "fn test() {  \r\n    println!(\"hello\");\r\n}\r\n";
        assert_eq!(generate_cid(lf), generate_cid(crlf));
        assert_ne!(generate_cid(lf), generate_cid("fn test() {}"));
    }
}
