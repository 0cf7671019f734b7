//! Document access: the read-only seam the engine consumes, and an in-memory
//! line buffer that turns char-precise edits into line-level edit events.

use crate::error::Error;
use crate::types::EditEvent;

/// Read access to a versioned document. Lines are 1-based.
pub trait DocumentAccessor {
    /// Number of lines; an empty document still has one (empty) line.
    fn line_count(&self) -> u32;

    /// Text of `line` without its line terminator, or `None` when out of range.
    fn line_text(&self, line: u32) -> Option<&str>;

    /// Full text with lines joined by `\n`.
    fn text(&self) -> String {
        let mut out = String::new();
        for line in 1..=self.line_count() {
            if line > 1 {
                out.push('\n');
            }
            out.push_str(self.line_text(line).unwrap_or(""));
        }
        return out;
    }

    /// Monotonically increasing version, bumped on every edit.
    fn version(&self) -> u64;
}

/// A position inside a document: 1-based line, 0-based column in chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    /// 1-based line.
    pub line: u32,
    /// 0-based column counted in chars; clamped to the line length.
    pub column: u32,
}

impl Position {
    /// Position at `line`, `column`.
    pub const fn new(line: u32, column: u32) -> Self {
        return Self { line, column };
    }
}

/// Replace the text between `start` and `end` with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    /// End of the replaced range (exclusive).
    pub end: Position,
    /// Start of the replaced range.
    pub start: Position,
    /// Replacement text; may span several lines.
    pub text: String,
}

impl TextEdit {
    /// Remove whole lines `first..=last`, including the terminator of `last`
    /// (or the one before `first` when `last` is the final line).
    pub fn delete_lines(document: &TextDocument, first: u32, last: u32) -> Self {
        let count = document.line_count();
        if last < count {
            return Self::replace(Position::new(first, 0), Position::new(last.saturating_add(1), 0), "");
        }
        let end = Position::new(last, u32::MAX);
        if first > 1 {
            return Self::replace(Position::new(first.saturating_sub(1), u32::MAX), end, "");
        }
        return Self::replace(Position::new(first, 0), end, "");
    }

    /// Insert `text` at `at`.
    pub fn insert(at: Position, text: impl Into<String>) -> Self {
        return Self { end: at, start: at, text: text.into() };
    }

    /// Insert whole lines before `line`; each entry becomes one line.
    pub fn insert_lines(line: u32, lines: &[&str]) -> Self {
        let text: String = lines.iter().map(|l| return format!("{l}\n")).collect();
        return Self::insert(Position::new(line, 0), text);
    }

    /// Replace `start..end` with `text`.
    pub fn replace(start: Position, end: Position, text: impl Into<String>) -> Self {
        return Self { end, start, text: text.into() };
    }
}

/// In-memory line buffer implementing [`DocumentAccessor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    /// Lines without terminators; never empty.
    lines: Vec<String>,
    /// Bumped on every applied edit.
    version: u64,
}

impl TextDocument {
    /// Apply a char-precise edit, bump the version, and describe the change
    /// as a line-level [`EditEvent`].
    ///
    /// # Errors
    ///
    /// Returns `Error::LineOutOfBounds` if either position names a line
    /// outside the document, or `Error::InvalidRange` if `end` precedes `start`.
    pub fn apply(&mut self, edit: &TextEdit) -> Result<EditEvent, Error> {
        let line_count = self.line_count();
        for line in [edit.start.line, edit.end.line] {
            if line < 1 || line > line_count {
                return Err(Error::LineOutOfBounds { line, line_count });
            }
        }

        let start = self.clamp(edit.start);
        let end = self.clamp(edit.end);
        if end < start {
            return Err(Error::InvalidRange {
                end_line: end.line,
                line_count,
                start_line: start.line,
            });
        }

        let text = edit.text.replace("\r\n", "\n");
        let prefix: String = self.line(start.line).chars().take(char_index(start.column)).collect();
        let suffix: String = self.line(end.line).chars().skip(char_index(end.column)).collect();
        let merged = format!("{prefix}{text}{suffix}");
        let replacement: Vec<String> = merged.split('\n').map(String::from).collect();

        let first = line_index(start.line);
        let last = line_index(end.line);
        self.lines.splice(first..=last, replacement);
        self.version = self.version.saturating_add(1);

        return Ok(EditEvent {
            end_line: end.line,
            replacement_text: text,
            start_line: start.line,
        });
    }

    /// Clamp a position's column to its line's length.
    fn clamp(&self, position: Position) -> Position {
        let len = u32::try_from(self.line(position.line).chars().count()).unwrap_or(u32::MAX);
        return Position::new(position.line, position.column.min(len));
    }

    /// Compute a single edit that turns this document into `new_text`, or
    /// `None` if the contents are identical. The edit spans the region
    /// between the common leading and trailing lines.
    pub fn diff_to(&self, new_text: &str) -> Option<TextEdit> {
        let new_lines = split_lines(new_text);
        let old_len = self.lines.len();
        let new_len = new_lines.len();

        let prefix = self.lines.iter().zip(&new_lines).take_while(|(a, b)| return a == b).count();
        if prefix == old_len && old_len == new_len {
            return None;
        }
        let max_suffix = old_len.min(new_len).saturating_sub(prefix);
        let suffix = self
            .lines
            .iter()
            .rev()
            .zip(new_lines.iter().rev())
            .take(max_suffix)
            .take_while(|(a, b)| return a == b)
            .count();

        let old_end = old_len.saturating_sub(suffix);
        let region = new_lines.get(prefix..new_len.saturating_sub(suffix)).unwrap_or(&[]);

        if prefix >= 1 {
            let start = self.end_of(prefix);
            let end = if old_end > prefix { self.end_of(old_end) } else { start };
            let text: String = region.iter().map(|l| return format!("\n{l}")).collect();
            return Some(TextEdit::replace(start, end, text));
        }

        let start = Position::new(1, 0);
        if suffix >= 1 {
            let end = Position::new(to_line(old_end).saturating_add(1), 0);
            let text: String = region.iter().map(|l| return format!("{l}\n")).collect();
            return Some(TextEdit::replace(start, end, text));
        }
        return Some(TextEdit::replace(start, self.end_of(old_len), region.join("\n")));
    }

    /// Position just past the last char of the 1-based line `line_number`.
    fn end_of(&self, line_number: usize) -> Position {
        let line = to_line(line_number);
        let len = u32::try_from(self.line(line).chars().count()).unwrap_or(u32::MAX);
        return Position::new(line, len);
    }

    /// Text of a line known to be in range; empty otherwise.
    fn line(&self, line: u32) -> &str {
        return self.lines.get(line_index(line)).map_or("", String::as_str);
    }

    /// Build a document at version 1. `\r\n` terminators are normalized.
    pub fn new(text: &str) -> Self {
        return Self { lines: split_lines(text), version: 1 };
    }
}

impl DocumentAccessor for TextDocument {
    fn line_count(&self) -> u32 {
        return u32::try_from(self.lines.len()).unwrap_or(u32::MAX);
    }

    fn line_text(&self, line: u32) -> Option<&str> {
        if line == 0 {
            return None;
        }
        return self.lines.get(line_index(line)).map(String::as_str);
    }

    fn version(&self) -> u64 {
        return self.version;
    }
}

/// Convert a char column to a `usize` index.
fn char_index(column: u32) -> usize {
    return usize::try_from(column).unwrap_or(usize::MAX);
}

/// Convert a 1-based line to a 0-based vector index.
fn line_index(line: u32) -> usize {
    return usize::try_from(line.saturating_sub(1)).unwrap_or(usize::MAX);
}

/// Split text into lines, stripping `\r` before each `\n`.
fn split_lines(text: &str) -> Vec<String> {
    return text
        .split('\n')
        .map(|l| return l.strip_suffix('\r').unwrap_or(l).to_string())
        .collect();
}

/// Convert a 1-based `usize` line number to `u32`.
fn to_line(line: usize) -> u32 {
    return u32::try_from(line).unwrap_or(u32::MAX);
}

#[cfg(test)]
mod tests {
    use super::{DocumentAccessor as _, Position, TextDocument, TextEdit};

    fn roundtrip(old: &str, new: &str) {
        let mut doc = TextDocument::new(old);
        let edit = doc.diff_to(new).unwrap();
        doc.apply(&edit).unwrap();
        assert_eq!(doc.text(), new, "diff from {old:?} did not reproduce {new:?}");
    }

    #[test]
    fn empty_text_has_one_line() {
        let doc = TextDocument::new("");
        assert_eq!(doc.line_count(), 1);
        assert_eq!(doc.line_text(1), Some(""));
        assert_eq!(doc.line_text(2), None);
        assert_eq!(doc.line_text(0), None);
    }

    #[test]
    fn crlf_is_normalized() {
        let doc = TextDocument::new("a\r\nb\r\n");
        assert_eq!(doc.line_text(1), Some("a"));
        assert_eq!(doc.line_count(), 3);
    }

    #[test]
    fn inserting_a_blank_line_reports_one_line_delta() {
        let mut doc = TextDocument::new("function a(){}\nfunction b(){}");
        let event = doc.apply(&TextEdit::insert(Position::new(1, 0), "\n")).unwrap();
        assert_eq!((event.start_line, event.end_line), (1, 1));
        assert_eq!(event.line_delta(), 1);
        assert_eq!(doc.line_text(3), Some("function b(){}"));
        assert_eq!(doc.version(), 2);
    }

    #[test]
    fn deleting_a_middle_line() {
        let mut doc = TextDocument::new("a\nb\nc");
        let edit = TextEdit::delete_lines(&doc, 2, 2);
        let event = doc.apply(&edit).unwrap();
        assert_eq!(event.line_delta(), -1);
        assert_eq!(doc.text(), "a\nc");
    }

    #[test]
    fn deleting_the_last_line() {
        let mut doc = TextDocument::new("a\nb\nc");
        let edit = TextEdit::delete_lines(&doc, 3, 3);
        doc.apply(&edit).unwrap();
        assert_eq!(doc.text(), "a\nb");
    }

    #[test]
    fn mid_line_replacement() {
        let mut doc = TextDocument::new("let x = 1;");
        let edit = TextEdit::replace(Position::new(1, 8), Position::new(1, 9), "42");
        let event = doc.apply(&edit).unwrap();
        assert_eq!(event.line_delta(), 0);
        assert_eq!(doc.text(), "let x = 42;");
    }

    #[test]
    fn out_of_bounds_edit_is_rejected() {
        let mut doc = TextDocument::new("a");
        assert!(doc.apply(&TextEdit::insert(Position::new(3, 0), "x")).is_err());
        assert_eq!(doc.version(), 1);
    }

    #[test]
    fn identical_text_has_no_diff() {
        assert!(TextDocument::new("a\nb").diff_to("a\nb").is_none());
    }

    #[test]
    fn diffs_reproduce_the_new_text() {
        roundtrip("a\nb", "a\nb\nc");
        roundtrip("a\nb\nc", "a\nb");
        roundtrip("a\nx\nc", "a\ny\nz\nc");
        roundtrip("x\nc", "y\nz\nc");
        roundtrip("c", "y\nc");
        roundtrip("x", "y\nz");
        roundtrip("a\nb\nc", "c");
        roundtrip("a\nb\n", "a\n\nb\n");
    }

    #[test]
    fn diff_edit_keeps_untouched_lines_outside_the_event() {
        let mut doc = TextDocument::new("one\ntwo\nthree\nfour");
        let edit = doc.diff_to("one\ntwo\ninserted\nthree\nfour").unwrap();
        let event = doc.apply(&edit).unwrap();
        assert_eq!(event.line_delta(), 1);
        assert!(event.end_line < 3, "line three must lie strictly after the edit");
    }
}
