//! Source files and locations.
//!
//! Every token and AST node carries a [`Location`]. Locations hold a
//! shared handle to the [`SourceFile`] they point into, so diagnostics can
//! be rendered long after the lexer and parser are gone.

use std::fmt;
use std::sync::Arc;

/// A named piece of source text fed into the pipeline.
#[derive(Debug, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Arc<Self> {
        Arc::new(SourceFile {
            name: name.into(),
            text: text.into(),
        })
    }

    /// Text of the 1-based `line`, without its terminator.
    pub fn line_text(&self, line: usize) -> &str {
        self.text
            .split('\n')
            .nth(line.saturating_sub(1))
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .unwrap_or("")
    }
}

/// A 1-based line/column pair. Columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const START: Position = Position { line: 1, column: 1 };

    /// Position reached after consuming `text` from `self`.
    pub fn advance(self, text: &str) -> Position {
        let mut pos = self;
        for ch in text.chars() {
            if ch == '\n' {
                pos.line += 1;
                pos.column = 1;
            } else {
                pos.column += 1;
            }
        }
        pos
    }
}

/// A span of source text.
///
/// `offset` and `length` are in bytes; `start` is the position of the
/// first character and `end` the position just past the last one.
#[derive(Clone)]
pub struct Location {
    pub source: Arc<SourceFile>,
    pub offset: usize,
    pub length: usize,
    pub start: Position,
    pub end: Position,
}

impl Location {
    pub fn new(source: Arc<SourceFile>, offset: usize, length: usize, start: Position) -> Self {
        let end = start.advance(&source.text[offset..offset + length]);
        Location {
            source,
            offset,
            length,
            start,
            end,
        }
    }

    /// Zero-length location at `offset`.
    pub fn point(source: Arc<SourceFile>, offset: usize, at: Position) -> Self {
        Location {
            source,
            offset,
            length: 0,
            start: at,
            end: at,
        }
    }

    pub fn end_offset(&self) -> usize {
        self.offset + self.length
    }

    pub fn line(&self) -> usize {
        self.start.line
    }

    pub fn column(&self) -> usize {
        self.start.column
    }

    /// The source text this location covers.
    pub fn text(&self) -> &str {
        &self.source.text[self.offset..self.end_offset()]
    }

    /// Smallest location covering both `self` and `other`.
    pub fn merge(&self, other: &Location) -> Location {
        let (start_offset, start) = if other.offset < self.offset {
            (other.offset, other.start)
        } else {
            (self.offset, self.start)
        };
        let (end_offset, end) = if other.end_offset() > self.end_offset() {
            (other.end_offset(), other.end)
        } else {
            (self.end_offset(), self.end)
        };
        Location {
            source: Arc::clone(&self.source),
            offset: start_offset,
            length: end_offset - start_offset,
            start,
            end,
        }
    }

    /// Merge every location yielded by `rest` into `first`.
    pub fn merge_all<'a>(first: &Location, rest: impl IntoIterator<Item = &'a Location>) -> Location {
        rest.into_iter().fold(first.clone(), |acc, loc| acc.merge(loc))
    }

    pub fn contains(&self, other: &Location) -> bool {
        self.offset <= other.offset && other.end_offset() <= self.end_offset()
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.source, &other.source)
            && self.offset == other.offset
            && self.length == other.length
    }
}

impl Eq for Location {}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}..{}:{}",
            self.source.name, self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source.name, self.start.line, self.start.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_tracks_lines_and_columns() {
        let pos = Position::START.advance("ab\ncd");
        assert_eq!(pos, Position { line: 2, column: 3 });
    }

    #[test]
    fn columns_count_characters() {
        let pos = Position::START.advance("héllo");
        assert_eq!(pos.column, 6);
    }

    #[test]
    fn merge_covers_both_spans() {
        let src = SourceFile::new("t", "abc def\nghi");
        let a = Location::new(Arc::clone(&src), 4, 3, Position { line: 1, column: 5 });
        let b = Location::new(Arc::clone(&src), 8, 3, Position { line: 2, column: 1 });
        let merged = b.merge(&a);
        assert_eq!(merged.offset, 4);
        assert_eq!(merged.length, 7);
        assert_eq!(merged.start, Position { line: 1, column: 5 });
        assert_eq!(merged.end, Position { line: 2, column: 4 });
        assert_eq!(merged.text(), "def\nghi");
        assert!(merged.contains(&a) && merged.contains(&b));
    }

    #[test]
    fn line_text_strips_carriage_returns() {
        let src = SourceFile::new("t", "one\r\ntwo\n");
        assert_eq!(src.line_text(1), "one");
        assert_eq!(src.line_text(2), "two");
        assert_eq!(src.line_text(9), "");
    }
}
