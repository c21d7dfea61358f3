//! Source-anchored error rendering.
//!
//! All user-facing errors share one three-line shape:
//!
//! ```text
//! unexpected token `)`
//! line 2: print(1, ))
//!                  ^
//! ```

use crate::span::Location;

/// Render `message` anchored at `location`.
///
/// The caret line underlines the part of the span that lies on its first
/// line, with at least one caret for zero-length spans.
pub fn render(message: &str, location: &Location) -> String {
    let line = location.line();
    let prefix = format!("line {line}: ");
    let source_line = location.source.line_text(line);

    let start_col = location.column().saturating_sub(1);
    let line_chars = source_line.chars().count();
    let end_col = if location.end.line == line {
        location.end.column.saturating_sub(1)
    } else {
        line_chars.max(start_col + 1)
    };
    let carets = end_col.saturating_sub(start_col).max(1);

    format!(
        "{message}\n{prefix}{source_line}\n{}{}",
        " ".repeat(prefix.chars().count() + start_col),
        "^".repeat(carets)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{Position, SourceFile};
    use std::sync::Arc;

    #[test]
    fn renders_three_lines_with_carets_under_span() {
        let src = SourceFile::new("t", "x = 1;\ny = foo(2);\n");
        let loc = Location::new(Arc::clone(&src), 11, 3, Position { line: 2, column: 5 });
        let out = render("boom", &loc);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines, vec!["boom", "line 2: y = foo(2);", "            ^^^"]);
    }

    #[test]
    fn zero_length_span_gets_one_caret() {
        let src = SourceFile::new("t", "abc");
        let loc = Location::point(Arc::clone(&src), 3, Position { line: 1, column: 4 });
        let out = render("eof", &loc);
        assert_eq!(out.lines().last(), Some("           ^"));
    }

    #[test]
    fn multi_line_span_underlines_to_end_of_first_line() {
        let src = SourceFile::new("t", "{ a;\n b; }");
        let loc = Location::new(Arc::clone(&src), 0, src.text.len(), Position::START);
        let out = render("block", &loc);
        assert_eq!(out.lines().nth(2), Some("        ^^^^"));
    }
}
