use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostic;
use crate::span::Location;

/// No token pattern matched at `location`.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct LexError {
    pub message: String,
    pub location: Location,
}

/// The token stream could not be consumed as a statement list.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub location: Location,
}

impl ParseError {
    pub fn new(message: impl Into<String>, location: Location) -> Self {
        ParseError {
            message: message.into(),
            location,
        }
    }
}

/// Evaluation failed at `location`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct EvalError {
    pub message: String,
    pub location: Location,
    #[source]
    pub cause: Option<Box<CoreError>>,
}

impl EvalError {
    pub fn new(message: impl Into<String>, location: Location) -> Self {
        EvalError {
            message: message.into(),
            location,
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: CoreError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("failed to read source {path}: {source}")]
    SourceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Invariant violations and resource limits; never recovered from.
    #[error("internal error: {message}")]
    Internal {
        message: String,
        location: Option<Location>,
    },
}

impl CoreError {
    pub fn location(&self) -> Option<&Location> {
        match self {
            CoreError::Lex(e) => Some(&e.location),
            CoreError::Parse(e) => Some(&e.location),
            CoreError::Eval(e) => Some(&e.location),
            CoreError::SourceIo { .. } => None,
            CoreError::Internal { location, .. } => location.as_ref(),
        }
    }

    /// The three-line diagnostic for this error, or the bare message when
    /// it is not anchored in source.
    pub fn render(&self) -> String {
        let message = self.to_string();
        match self.location() {
            Some(location) => diagnostic::render(&message, location),
            None => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{Position, SourceFile};
    use std::sync::Arc;

    #[test]
    fn renders_located_errors() {
        let src = SourceFile::new("t", "a $ b");
        let loc = Location::new(Arc::clone(&src), 2, 1, Position { line: 1, column: 3 });
        let err = CoreError::from(LexError {
            message: "unexpected character `$`".to_string(),
            location: loc,
        });
        assert_eq!(
            err.render(),
            "unexpected character `$`\nline 1: a $ b\n          ^"
        );
    }

    #[test]
    fn io_errors_render_without_location() {
        let err = CoreError::SourceIo {
            path: PathBuf::from("missing.em"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.location().is_none());
        assert_eq!(err.render(), "failed to read source missing.em: not found");
    }
}
