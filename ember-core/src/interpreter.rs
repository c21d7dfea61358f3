//! Pipeline orchestration: source text → tokens → AST → value.

use std::io::{self, Write};
use std::sync::Arc;

use crate::ast::Node;
use crate::environment::Environment;
use crate::error::CoreError;
use crate::lexer::tokenize;
use crate::loader::{FsLoader, SourceLoader};
use crate::parser::{DEFAULT_MAX_NESTING, parse_with_limit};
use crate::span::SourceFile;
use crate::value::Value;

/// Limits applied while parsing and evaluating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterOptions {
    /// Closure activations (and nested includes) allowed at once.
    pub max_call_depth: usize,
    /// Nested expressions and blocks allowed by the parser.
    pub max_nesting: usize,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        InterpreterOptions {
            max_call_depth: 256,
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }
}

pub struct Interpreter {
    pub(crate) options: InterpreterOptions,
    pub(crate) loader: Box<dyn SourceLoader>,
    output: Box<dyn Write>,
    pub(crate) depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Interpreter {
    /// An interpreter that loads includes relative to the working directory
    /// and prints to stdout.
    pub fn new() -> Self {
        Interpreter {
            options: InterpreterOptions::default(),
            loader: Box::new(FsLoader::new()),
            output: Box::new(io::stdout()),
            depth: 0,
        }
    }

    pub fn with_options(mut self, options: InterpreterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_loader(mut self, loader: impl SourceLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn with_output(mut self, output: impl Write + 'static) -> Self {
        self.output = Box::new(output);
        self
    }

    pub fn options(&self) -> &InterpreterOptions {
        &self.options
    }

    /// Sink for `print` and other host output.
    pub fn output(&mut self) -> &mut dyn Write {
        self.output.as_mut()
    }

    pub fn parse_source(&self, source: &Arc<SourceFile>) -> Result<Node, CoreError> {
        let tokens = tokenize(source)?;
        parse_with_limit(&tokens, self.options.max_nesting)
    }

    /// Lex, parse and evaluate `source` against `env`. Top-level
    /// assignments land directly in `env`.
    pub fn run(&mut self, source: Arc<SourceFile>, env: &Environment) -> Result<Value, CoreError> {
        let root = self.parse_source(&source)?;
        let value = self.evaluate(&root, env)?;
        Ok(value)
    }

    pub fn run_str(&mut self, name: &str, text: &str, env: &Environment) -> Result<Value, CoreError> {
        self.run(SourceFile::new(name, text), env)
    }
}

/// Run `text` with a default interpreter.
pub fn run(text: &str, env: &Environment) -> Result<Value, CoreError> {
    Interpreter::new().run_str("<input>", text, env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::standard_environment;

    #[test]
    fn runs_a_program_and_returns_last_value() {
        let env = standard_environment();
        let value = run("a = 2; b = a * 21; b;", &env).expect("run");
        assert!(value.equals(&Value::Int(42)));
        assert!(env.lookup("a").equals(&Value::Int(2)));
    }

    #[test]
    fn lex_errors_surface_as_core_errors() {
        let err = run("a = 1 @ 2;", &Environment::new()).unwrap_err();
        assert!(matches!(err, CoreError::Lex(_)));
        assert_eq!(err.render(), "unexpected character `@`\nline 1: a = 1 @ 2;\n              ^");
    }

    #[test]
    fn parse_errors_surface_as_core_errors() {
        let err = run("f(1, 2;", &Environment::new()).unwrap_err();
        assert!(matches!(err, CoreError::Parse(_)));
    }

    #[test]
    fn nesting_limit_comes_from_options() {
        let mut interpreter = Interpreter::new().with_options(InterpreterOptions {
            max_call_depth: 8,
            max_nesting: 8,
        });
        let text = format!("{}{};", "[".repeat(10), "]".repeat(10));
        let err = interpreter.run_str("deep", &text, &Environment::new()).unwrap_err();
        assert!(matches!(err, CoreError::Parse(_)));
        assert!(err.render().starts_with("input nests deeper than 8 levels\nline 1: "));
    }
}
