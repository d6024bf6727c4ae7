// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Syntax tree types for the lambda-job compiler.
//!
//! This crate contains the syntax tree produced by `lambdajob-parser`, the
//! source-location types shared by every stage, and the generic traversal
//! helpers (`walk`, `fold`) and printer used by the code generator.

pub mod ast;
pub mod foundation;

pub use ast::*;
pub use foundation::{SourceFile, SourceMap, Span};
