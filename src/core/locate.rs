//! Match locator: find a `search` block inside a target text
//!
//! Layered strategy, first success wins:
//! 1. Exact substring (lowest offset).
//! 2. Relaxed line match: slide a window of the search's line count over the
//!    source lines and compare each pair after trimming both ends. The first
//!    window (scanning forward from line 1) wins, and the reported range
//!    covers exactly those source lines, so indentation outside it is
//!    untouched.
//!
//! Both inputs must already have normalized line endings; offsets are
//! computed against them directly.

use std::ops::Range;

use serde::Serialize;

use crate::infra::line_index::NewlineIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    Exact,
    Relaxed,
}

/// A located occurrence. Absence of a match is `None` from [`locate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    /// Byte offset of the first matched byte
    pub start: usize,
    /// Byte length of the matched region
    pub len: usize,
    pub strategy: MatchStrategy,
}

impl MatchResult {
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LocateOptions {
    /// Allow the whitespace-insensitive line pass
    pub relaxed: bool,
}

impl Default for LocateOptions {
    fn default() -> Self {
        Self { relaxed: true }
    }
}

/// Locate `search` in `source`.
pub fn locate(source: &str, search: &str, opts: LocateOptions) -> Option<MatchResult> {
    if search.trim().is_empty() {
        return None;
    }

    if let Some(start) = source.find(search) {
        if tracing::enabled!(tracing::Level::DEBUG) {
            let occurrences = source.matches(search).count();
            if occurrences > 1 {
                tracing::debug!(occurrences, start, "search block is not unique; using first");
            }
        }
        return Some(MatchResult {
            start,
            len: search.len(),
            strategy: MatchStrategy::Exact,
        });
    }

    if opts.relaxed {
        return locate_relaxed(source, search);
    }
    None
}

/// Line-wise trimmed comparison
fn locate_relaxed(source: &str, search: &str) -> Option<MatchResult> {
    let needle: Vec<&str> = trim_blank_edges(search.split('\n').map(str::trim).collect());
    if needle.is_empty() {
        return None;
    }

    let hay: Vec<&str> = source.split('\n').collect();
    if hay.len() < needle.len() {
        return None;
    }

    let first = (0..=hay.len() - needle.len()).find(|&i| {
        hay[i..i + needle.len()]
            .iter()
            .zip(&needle)
            .all(|(h, n)| h.trim() == *n)
    })?;

    let index = NewlineIndex::build(source);
    let start = index.start_byte_of_line(first + 1)?;
    let end = index.end_byte_of_line(first + needle.len(), source)?;
    Some(MatchResult {
        start,
        len: end - start,
        strategy: MatchStrategy::Relaxed,
    })
}

/// Drop blank lines at either end of the search block
fn trim_blank_edges(mut lines: Vec<&str>) -> Vec<&str> {
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    let lead = lines.iter().take_while(|l| l.is_empty()).count();
    lines.drain(..lead);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(source: &str, search: &str) -> Option<MatchResult> {
        locate(source, search, LocateOptions::default())
    }

    #[test]
    fn exact_match_wins_first() {
        let src = "a\n  b\n  b\n";
        let m = find(src, "  b").unwrap();
        assert_eq!(m.strategy, MatchStrategy::Exact);
        assert_eq!(m.range(), 2..5);
    }

    #[test]
    fn relaxed_match_tolerates_indentation_drift() {
        let src = "fn main() {\n        let x = 1;   \n        run(x);\n}\n";
        let m = find(src, "let x = 1;\n    run(x);").unwrap();
        assert_eq!(m.strategy, MatchStrategy::Relaxed);
        assert_eq!(&src[m.range()], "        let x = 1;   \n        run(x);");
    }

    #[test]
    fn relaxed_match_takes_first_window() {
        let src = "x\n  y\nx\n    y\n";
        // exact fails: "x\ny" does not occur verbatim
        let m = find(src, "x\ny").unwrap();
        assert_eq!(m.strategy, MatchStrategy::Relaxed);
        assert_eq!(m.start, 0);
        assert_eq!(&src[m.range()], "x\n  y");
    }

    #[test]
    fn relaxed_match_ignores_blank_edges_of_search() {
        let src = "a\n\tb\nc";
        let m = find(src, "\n\nb   \n\n").unwrap();
        assert_eq!(&src[m.range()], "\tb");
    }

    #[test]
    fn relaxed_pass_can_be_disabled() {
        let src = "    let x = 1;   \n";
        assert!(locate(src, "let x = 1;\n", LocateOptions { relaxed: false }).is_none());
        assert!(find(src, "let x = 1;\n").is_some());
    }

    #[test]
    fn blank_or_missing_search_is_not_found() {
        assert!(find("abc", "").is_none());
        assert!(find("abc", " \n\t").is_none());
        assert!(find("abc", "abd").is_none());
        assert!(find("a", "a\nb").is_none());
    }

    #[test]
    fn relaxed_match_does_not_span_partial_lines() {
        // "b" must equal a whole trimmed line; "ab" does not
        assert!(find("ab \nc", "b\nc").is_none());
    }
}
