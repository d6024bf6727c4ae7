// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Lambda-job generator.
//!
//! High-level entry points over the parser and the code generator:
//! [`compile_source`] for one file and [`generate_dir`] for a source tree.

pub mod compile;
pub mod config;

pub use compile::{
    GenerateError, GeneratedFile, GenerationResult, compile_source, format_errors, generate_dir,
    output_path,
};
pub use config::{ConfigError, GeneratorConfig};
pub use lambdajob_codegen::{CompileError, DiagnosticCode, Severity};
