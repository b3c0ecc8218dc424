//! Newline index for offset <-> (line, column) mapping.
//!
//! Editor buffers address ranges by 1-based line and column while the
//! matcher works in byte offsets; this bridges the two.
//!
//! Notes
//! - Lines are 1-based. An empty buffer has exactly one (empty) line,
//!   matching what an editor shows.
//! - Columns are 1-based and count Unicode scalar values, not bytes.
//! - A line's end excludes the '\n' and a trailing '\r' before it, so CRLF
//!   and LF buffers with the same text yield the same positions.

#[derive(Debug, Clone)]
pub struct NewlineIndex {
    /// Byte positions of every '\n' in the buffer.
    nl_positions: Vec<usize>,
    /// Total byte length of the buffer.
    len: usize,
}

impl NewlineIndex {
    /// Build an index recording positions of '\n'.
    pub fn build(text: &str) -> Self {
        let nl_positions = memchr::memchr_iter(b'\n', text.as_bytes()).collect();
        Self {
            nl_positions,
            len: text.len(),
        }
    }

    /// Number of lines (#'\n' + 1).
    pub fn line_count(&self) -> usize {
        self.nl_positions.len() + 1
    }

    /// Start byte (inclusive) of a 1-based line.
    pub fn start_byte_of_line(&self, line1: usize) -> Option<usize> {
        match line1 {
            0 => None,
            1 => Some(0),
            l => self.nl_positions.get(l - 2).map(|&prev_nl| prev_nl + 1),
        }
    }

    /// End byte (exclusive) of a 1-based line, without its terminator.
    pub fn end_byte_of_line(&self, line1: usize, text: &str) -> Option<usize> {
        if line1 == 0 || line1 > self.line_count() {
            return None;
        }
        let Some(&nl) = self.nl_positions.get(line1 - 1) else {
            // Last line ends at EOF.
            return Some(self.len);
        };
        if nl > 0 && text.as_bytes()[nl - 1] == b'\r' {
            Some(nl - 1)
        } else {
            Some(nl)
        }
    }

    /// 1-based line covering the byte offset. Offsets at '\n' belong to the
    /// line the newline terminates.
    pub fn line_of_byte(&self, byte: usize) -> usize {
        self.nl_positions.partition_point(|&nl| nl < byte) + 1
    }

    /// (line, column) of a byte offset, both 1-based.
    /// `None` when the offset is past the end or not on a char boundary.
    pub fn position_of(&self, byte: usize, text: &str) -> Option<(usize, usize)> {
        if byte > self.len || !text.is_char_boundary(byte) {
            return None;
        }
        let line = self.line_of_byte(byte);
        let start = self.start_byte_of_line(line)?;
        let column = text[start..byte].chars().count() + 1;
        Some((line, column))
    }

    /// Byte offset of a 1-based (line, column).
    /// A column one past the last character addresses the line end.
    pub fn byte_of_position(&self, line1: usize, column1: usize, text: &str) -> Option<usize> {
        if column1 == 0 {
            return None;
        }
        let start = self.start_byte_of_line(line1)?;
        let end = self.end_byte_of_line(line1, text)?;
        let line = &text[start..end];
        let wanted = column1 - 1;
        if wanted == line.chars().count() {
            return Some(end);
        }
        line.char_indices().nth(wanted).map(|(off, _)| start + off)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_lines_like_an_editor() {
        assert_eq!(NewlineIndex::build("").line_count(), 1);
        assert_eq!(NewlineIndex::build("a").line_count(), 1);
        assert_eq!(NewlineIndex::build("a\n").line_count(), 2);
        assert_eq!(NewlineIndex::build("a\nb\nc").line_count(), 3);
    }

    #[test]
    fn line_bounds_exclude_crlf() {
        let text = "ab\r\ncd\r\nef";
        let idx = NewlineIndex::build(text);
        assert_eq!(idx.start_byte_of_line(2), Some(4));
        assert_eq!(idx.end_byte_of_line(1, text), Some(2));
        assert_eq!(idx.end_byte_of_line(3, text), Some(text.len()));
        assert_eq!(idx.end_byte_of_line(4, text), None);
    }

    #[test]
    fn positions_round_trip_through_offsets() {
        let text = "fn main() {\n    let ü = 1;\n}\n";
        let idx = NewlineIndex::build(text);
        let off = text.find("= 1").unwrap();
        let (line, col) = idx.position_of(off, text).unwrap();
        assert_eq!((line, col), (2, 11));
        assert_eq!(idx.byte_of_position(line, col, text), Some(off));
    }

    #[test]
    fn newline_byte_belongs_to_its_line() {
        let text = "ab\ncd";
        let idx = NewlineIndex::build(text);
        assert_eq!(idx.position_of(2, text), Some((1, 3)));
        assert_eq!(idx.position_of(3, text), Some((2, 1)));
        assert_eq!(idx.position_of(text.len(), text), Some((2, 3)));
        assert_eq!(idx.position_of(99, text), None);
    }

    #[test]
    fn crlf_and_lf_agree_on_positions() {
        let lf = "one\ntwo\nthree";
        let crlf = "one\r\ntwo\r\nthree";
        let a = NewlineIndex::build(lf);
        let b = NewlineIndex::build(crlf);
        assert_eq!(a.byte_of_position(3, 2, lf).map(|o| &lf[o..]), Some("hree"));
        assert_eq!(b.byte_of_position(3, 2, crlf).map(|o| &crlf[o..]), Some("hree"));
        assert_eq!(b.byte_of_position(1, 4, crlf), Some(3));
    }
}
