// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Hand-written recursive descent parser for the lambda-job source subset.
//!
//! Produces a [`CompilationUnit`](lambdajob_ast::CompilationUnit) whose
//! statements and expressions carry stable node ids.

pub mod parser;

pub use parser::{
    ParseError, ParseErrorKind, parse_compilation_unit, parse_expr_with_spans, parse_source,
};

// Re-export lexer
pub use lambdajob_lexer::Token;
