//! Lexer for ember.
//!
//! Every pattern in [`PATTERNS`] is tried at the cursor and the longest
//! match wins; on a tie the pattern declared first wins. That is what
//! makes `true` a boolean rather than an identifier, and `=>` a single
//! operator rather than `=` followed by `>`.

use std::sync::Arc;

use num_bigint::BigInt;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::LexError;
use crate::span::{Location, Position, SourceFile};

/// Literal payload carried by a [`TokenKind::Literal`] token.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    BigInt(BigInt),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Comment(String),
    Identifier(String),
    Literal(Literal),
    /// The exact operator lexeme, e.g. `"=>"` or `"("`.
    Operator(&'static str),
    /// End of input. Always the last token, zero-length.
    Eof,
}

/// A single token and the source it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
}

impl Token {
    pub fn is_operator(&self, op: &str) -> bool {
        matches!(self.kind, TokenKind::Operator(o) if o == op)
    }

    /// Short human-readable form used in parse errors.
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Eof => "end of input".to_string(),
            _ => format!("`{}`", self.location.text()),
        }
    }
}

/// Operators. They are joined into one alternation and the regex engine
/// takes the first alternative that matches, so a longer operator must
/// come before any operator that is its prefix (`=>` before `=`).
pub const OPERATORS: &[&str] = &[
    "=>", "==", "!=", "<=", ">=", "<", ">", "=", "+", "-", "*", "/", "(", ")", "{", "}", "[",
    "]", ",", ";",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Boolean,
    Float,
    Integer,
    Str,
    Comment,
    Identifier,
    Operator,
    Newline,
    Whitespace,
}

struct Pattern {
    class: Class,
    regex: Regex,
}

fn pattern(class: Class, source: &str) -> Pattern {
    let regex = Regex::new(&format!("^(?:{source})")).expect("token pattern compiles");
    Pattern { class, regex }
}

static PATTERNS: Lazy<Vec<Pattern>> = Lazy::new(|| {
    let operators = OPERATORS
        .iter()
        .map(|op| regex::escape(op))
        .collect::<Vec<_>>()
        .join("|");
    vec![
        pattern(Class::Boolean, r"true|false"),
        pattern(Class::Float, r"[0-9]*\.[0-9]+|[0-9]+\."),
        pattern(Class::Integer, r"[0-9]+"),
        pattern(Class::Str, r#"(?s)"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'"#),
        pattern(Class::Comment, r"(?s)//[^\n]*|/\*.*?\*/"),
        pattern(Class::Identifier, r"[\p{XID_Start}_$][\p{XID_Continue}$]*"),
        pattern(Class::Operator, &operators),
        pattern(Class::Newline, r"\r?\n"),
        pattern(Class::Whitespace, r"[ \t\r\f]+"),
    ]
});

/// Lex `source` into tokens terminated by a single [`TokenKind::Eof`].
pub fn tokenize(source: &Arc<SourceFile>) -> Result<Vec<Token>, LexError> {
    let text = source.text.as_str();
    let mut tokens = Vec::new();
    let mut offset = 0;
    let mut position = Position::START;

    while offset < text.len() {
        let rest = &text[offset..];
        let Some((class, len)) = longest_match(rest) else {
            let ch = rest.chars().next().map_or(1, char::len_utf8);
            return Err(LexError {
                message: format!("unexpected character `{}`", &rest[..ch]),
                location: Location::new(Arc::clone(source), offset, ch, position),
            });
        };

        let lexeme = &rest[..len];
        let location = Location::new(Arc::clone(source), offset, len, position);
        if let Some(kind) = classify(class, lexeme, &location)? {
            tokens.push(Token { kind, location });
        }
        position = position.advance(lexeme);
        offset += len;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        location: Location::point(Arc::clone(source), offset, position),
    });
    log::trace!("lexed {} tokens from {}", tokens.len(), source.name);
    Ok(tokens)
}

fn longest_match(rest: &str) -> Option<(Class, usize)> {
    let mut best: Option<(Class, usize)> = None;
    for pattern in PATTERNS.iter() {
        if let Some(m) = pattern.regex.find(rest) {
            let len = m.end();
            // Strictly longer only, so earlier patterns keep ties.
            if len > 0 && best.is_none_or(|(_, best_len)| len > best_len) {
                best = Some((pattern.class, len));
            }
        }
    }
    best
}

fn classify(class: Class, lexeme: &str, location: &Location) -> Result<Option<TokenKind>, LexError> {
    let kind = match class {
        Class::Newline | Class::Whitespace => return Ok(None),
        Class::Boolean => TokenKind::Literal(Literal::Bool(lexeme == "true")),
        Class::Float => match lexeme.parse::<f64>() {
            Ok(value) => TokenKind::Literal(Literal::Float(value)),
            Err(err) => return Err(invalid_literal(lexeme, &err, location)),
        },
        Class::Integer => TokenKind::Literal(parse_integer(lexeme, location)?),
        Class::Str => TokenKind::Literal(Literal::Str(unescape(&lexeme[1..lexeme.len() - 1]))),
        Class::Comment => TokenKind::Comment(lexeme.to_string()),
        Class::Identifier => TokenKind::Identifier(lexeme.to_string()),
        Class::Operator => match OPERATORS.iter().find(|op| **op == lexeme) {
            Some(&op) => TokenKind::Operator(op),
            None => return Err(invalid_literal(lexeme, &"unknown operator", location)),
        },
    };
    Ok(Some(kind))
}

/// Fixed-width when it fits, arbitrary precision otherwise.
fn parse_integer(lexeme: &str, location: &Location) -> Result<Literal, LexError> {
    if let Ok(value) = lexeme.parse::<i64>() {
        return Ok(Literal::Int(value));
    }
    lexeme
        .parse::<BigInt>()
        .map(Literal::BigInt)
        .map_err(|err| invalid_literal(lexeme, &err, location))
}

fn invalid_literal(lexeme: &str, err: &dyn std::fmt::Display, location: &Location) -> LexError {
    LexError {
        message: format!("invalid literal `{lexeme}`: {err}"),
        location: location.clone(),
    }
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(text: &str) -> Vec<TokenKind> {
        let src = SourceFile::new("test", text);
        tokenize(&src)
            .expect("lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn fat_arrow_is_one_token() {
        assert_eq!(lex("=>"), vec![TokenKind::Operator("=>"), TokenKind::Eof]);
        assert_eq!(
            lex("= >"),
            vec![TokenKind::Operator("="), TokenKind::Operator(">"), TokenKind::Eof]
        );
    }

    #[test]
    fn two_character_operators_beat_their_prefixes() {
        assert_eq!(
            lex("<= >= == != <"),
            vec![
                TokenKind::Operator("<="),
                TokenKind::Operator(">="),
                TokenKind::Operator("=="),
                TokenKind::Operator("!="),
                TokenKind::Operator("<"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_tie_break_to_booleans_but_longer_identifiers_win() {
        assert_eq!(lex("true")[0], TokenKind::Literal(Literal::Bool(true)));
        assert_eq!(lex("trueish")[0], TokenKind::Identifier("trueish".to_string()));
    }

    #[test]
    fn numeric_literal_forms() {
        assert_eq!(lex("42")[0], TokenKind::Literal(Literal::Int(42)));
        assert_eq!(lex(".5")[0], TokenKind::Literal(Literal::Float(0.5)));
        assert_eq!(lex("3.")[0], TokenKind::Literal(Literal::Float(3.0)));
        assert_eq!(lex("1.25")[0], TokenKind::Literal(Literal::Float(1.25)));
    }

    #[test]
    fn oversized_integers_become_bigints() {
        let big = "123456789012345678901234567890";
        let expected: BigInt = big.parse().expect("bigint");
        assert_eq!(lex(big)[0], TokenKind::Literal(Literal::BigInt(expected)));
        assert_eq!(
            lex("9223372036854775807")[0],
            TokenKind::Literal(Literal::Int(i64::MAX))
        );
    }

    #[test]
    fn strings_unescape_and_drop_delimiters() {
        assert_eq!(
            lex(r#""a\"b\n""#)[0],
            TokenKind::Literal(Literal::Str("a\"b\n".to_string()))
        );
        assert_eq!(
            lex(r"'it\'s'")[0],
            TokenKind::Literal(Literal::Str("it's".to_string()))
        );
    }

    #[test]
    fn unicode_identifiers() {
        assert_eq!(lex("$ü_1")[0], TokenKind::Identifier("$ü_1".to_string()));
        assert_eq!(lex("_x")[0], TokenKind::Identifier("_x".to_string()));
    }

    #[test]
    fn comments_are_emitted() {
        assert_eq!(
            lex("// note\nx"),
            vec![
                TokenKind::Comment("// note".to_string()),
                TokenKind::Identifier("x".to_string()),
                TokenKind::Eof
            ]
        );
        assert_eq!(lex("/* a\nb */")[0], TokenKind::Comment("/* a\nb */".to_string()));
    }

    #[test]
    fn tracks_lines_and_columns() {
        let src = SourceFile::new("test", "a = 1;\n  bb");
        let tokens = tokenize(&src).expect("lex");
        let bb = &tokens[4];
        assert_eq!(bb.kind, TokenKind::Identifier("bb".to_string()));
        assert_eq!((bb.location.line(), bb.location.column()), (2, 3));
        assert_eq!(bb.location.offset, 9);
        assert_eq!(bb.location.length, 2);
    }

    #[test]
    fn spans_reconstruct_non_whitespace_input() {
        let text = "f = (a, b) => { a + b; };\n// done\nprint(f(1, 2.5), \"s\");";
        let src = SourceFile::new("test", text);
        let tokens = tokenize(&src).expect("lex");
        let joined: String = tokens.iter().map(|t| t.location.text()).collect();
        let expected: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        assert_eq!(joined.replace(' ', ""), expected);
    }

    #[test]
    fn reports_unmatched_character() {
        let src = SourceFile::new("test", "x = 1;\ny = #;");
        let err = tokenize(&src).unwrap_err();
        assert_eq!(err.message, "unexpected character `#`");
        assert_eq!((err.location.line(), err.location.column()), (2, 5));
        assert_eq!(err.location.offset, 11);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let src = SourceFile::new("test", "\"abc");
        let err = tokenize(&src).unwrap_err();
        assert_eq!(err.location.offset, 0);
    }
}
