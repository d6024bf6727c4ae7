// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Lambda-job code generation.
//!
//! Turns `Entities.ForEach(...)` and `Job.WithCode(...)` chains into job
//! structs plus per-job execute methods. The pass runs in stages:
//!
//! - [`scan`] finds candidate chains in a compilation unit
//! - [`describe`] builds a [`JobDescription`] per candidate
//! - [`rewrite`] moves the lambda body into job form
//! - [`verify`] checks the description against the job rules
//! - [`emit`] writes the generated partial types
//!
//! [`pipeline::generate_unit`] drives all of them for one unit.

pub mod describe;
pub mod emit;
pub mod error;
pub mod pipeline;
pub mod rewrite;
pub mod scan;
pub mod semantic;
pub mod verify;

pub use describe::{DescribeOptions, JobDescription};
pub use error::{CompileError, DiagnosticCode, DiagnosticFormatter, FatalShape, Severity};
pub use pipeline::{
    CallSiteReplacement, CodegenOptions, GeneratedType, UnitOutput, apply_replacements,
    generate_unit,
};
pub use semantic::TypeTable;
