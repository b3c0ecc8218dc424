//! Live editor buffer interface
//!
//! An open editor holds text that may be ahead of the stored snapshot.
//! Edits to it go through ranged replacements so the editor keeps its
//! cursor, undo stack and markers.

use serde::Serialize;

use crate::infra::line_index::NewlineIndex;

/// 1-based line/column; columns count Unicode scalar values
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// End-exclusive range between two positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    /// Range covering `start..end` byte offsets of `text`
    pub fn from_offsets(text: &str, start: usize, end: usize) -> Option<Self> {
        let index = NewlineIndex::build(text);
        let (sl, sc) = index.position_of(start, text)?;
        let (el, ec) = index.position_of(end, text)?;
        Some(Self {
            start: Position::new(sl, sc),
            end: Position::new(el, ec),
        })
    }
}

/// Handle to an open document in an editor
pub trait EditorBuffer {
    /// Current full text
    fn full_text(&self) -> String;

    /// Replace `range` with `text`. Returns false if the range is invalid,
    /// in which case the buffer is unchanged.
    fn replace_range(&mut self, range: TextRange, text: &str) -> bool;
}

/// One undoable step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoStep {
    pub range: TextRange,
    pub removed: String,
    pub inserted: String,
}

/// Simple in-memory editor document with versioning and undo
#[derive(Debug, Clone, Default)]
pub struct TextDocument {
    text: String,
    version: u64,
    undo: Vec<UndoStep>,
}

impl TextDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            version: 0,
            undo: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Incremented on every successful edit
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn undo_stack(&self) -> &[UndoStep] {
        &self.undo
    }

    /// Revert the most recent edit
    pub fn undo(&mut self) -> bool {
        let Some(step) = self.undo.pop() else {
            return false;
        };
        let index = NewlineIndex::build(&self.text);
        let Some(start) =
            index.byte_of_position(step.range.start.line, step.range.start.column, &self.text)
        else {
            return false;
        };
        let end = start + step.inserted.len();
        self.text.replace_range(start..end, &step.removed);
        self.version += 1;
        true
    }
}

impl EditorBuffer for TextDocument {
    fn full_text(&self) -> String {
        self.text.clone()
    }

    fn replace_range(&mut self, range: TextRange, text: &str) -> bool {
        let index = NewlineIndex::build(&self.text);
        let start = index.byte_of_position(range.start.line, range.start.column, &self.text);
        let end = index.byte_of_position(range.end.line, range.end.column, &self.text);
        let (Some(start), Some(end)) = (start, end) else {
            return false;
        };
        if start > end {
            return false;
        }

        let removed = self.text[start..end].to_string();
        self.text.replace_range(start..end, text);
        self.version += 1;
        self.undo.push(UndoStep {
            range,
            removed,
            inserted: text.to_string(),
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranged_replace_and_undo() {
        let mut doc = TextDocument::new("alpha\nbeta\ngamma\n");
        let range = TextRange {
            start: Position::new(2, 1),
            end: Position::new(2, 5),
        };
        assert!(doc.replace_range(range, "BETA!"));
        assert_eq!(doc.text(), "alpha\nBETA!\ngamma\n");
        assert_eq!(doc.version(), 1);
        assert_eq!(doc.undo_stack()[0].removed, "beta");

        assert!(doc.undo());
        assert_eq!(doc.text(), "alpha\nbeta\ngamma\n");
        assert!(!doc.undo());
    }

    #[test]
    fn range_from_offsets_spans_lines() {
        let text = "one\ntwo\nthree";
        let range = TextRange::from_offsets(text, 4, 13).unwrap();
        assert_eq!(range.start, Position::new(2, 1));
        assert_eq!(range.end, Position::new(3, 6));
    }

    #[test]
    fn invalid_range_leaves_buffer_untouched() {
        let mut doc = TextDocument::new("short");
        let bad = TextRange {
            start: Position::new(3, 1),
            end: Position::new(3, 2),
        };
        assert!(!doc.replace_range(bad, "x"));
        assert_eq!(doc.text(), "short");
        assert_eq!(doc.version(), 0);
    }

    #[test]
    fn crlf_buffer_keeps_its_line_endings() {
        let mut doc = TextDocument::new("a\r\nold\r\nz\r\n");
        let range = TextRange {
            start: Position::new(2, 1),
            end: Position::new(2, 4),
        };
        assert!(doc.replace_range(range, "new"));
        assert_eq!(doc.text(), "a\r\nnew\r\nz\r\n");
    }
}
