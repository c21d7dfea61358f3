//! Core of the Ember scripting language.
//!
//! The pipeline is roughly:
//!
//!   source text
//!     -> lexer       (tokens, longest match)
//!     -> parser      (located AST, ordered alternatives with backtracking)
//!     -> evaluator   (tree walking; closure calls commit or roll back)
//!
//! Embedders usually go through [`Interpreter`] and seed the global frame
//! with [`standard_environment`]. The CLI depends on this crate rather
//! than reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod span;
pub mod diagnostic;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod lexer;
pub mod parser;
pub mod ast;

// ---------------------------------------------------------------------
// Runtime: values, environments, evaluation
// ---------------------------------------------------------------------

pub mod value;
pub mod environment;
pub mod evaluator;

// ---------------------------------------------------------------------
// Builtins and include loading
// ---------------------------------------------------------------------

pub mod builtins;
pub mod loader;

// ---------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------

pub mod interpreter;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use builtins::standard_environment;
pub use environment::Environment;
pub use error::CoreError;
pub use evaluator::evaluate;
pub use interpreter::{Interpreter, InterpreterOptions, run};
pub use lexer::tokenize;
pub use loader::{FsLoader, SourceLoader};
pub use parser::parse;
pub use span::SourceFile;
pub use value::Value;
