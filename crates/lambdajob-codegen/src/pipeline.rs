//! Per-unit driver: scan, describe, rewrite, verify, emit.
//!
//! Each candidate is processed independently; a fatal shape or a failed
//! verification only drops that candidate. Generated sources are grouped by
//! containing type, and every successful candidate yields one call-site
//! replacement.

use crate::describe::{self, DescribeOptions, JobDescription};
use crate::emit::{self, EmitOptions, TypeKey, execute};
use crate::error::{CompileError, DiagnosticCode};
use crate::rewrite::{self, RewriteOptions};
use crate::scan::scan_unit;
use crate::semantic::{MethodScope, TypeTable};
use crate::verify::verify;
use indexmap::IndexMap;
use lambdajob_ast::{CompilationUnit, SourceMap, Span};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodegenOptions {
    /// Emit `#line` directives mapping the job body back to its source.
    pub emit_line_directives: bool,
    /// See [`EmitOptions::enabled_mask_edge_threshold`].
    pub enabled_mask_edge_threshold: u32,
    /// Burst state of jobs that do not say.
    pub default_burst: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            emit_line_directives: true,
            enabled_mask_edge_threshold: 4,
            default_burst: true,
        }
    }
}

/// Generated partial declaration of one containing type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedType {
    /// Fully qualified name, e.g. `Game.MoverSystem`.
    pub type_name: String,
    pub source: String,
}

/// Source text that replaces a lambda-job chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSiteReplacement {
    pub span: Span,
    pub text: String,
    pub job: String,
}

/// Everything produced for one compilation unit.
#[derive(Debug, Default)]
pub struct UnitOutput {
    pub types: Vec<GeneratedType>,
    /// In source order.
    pub replacements: Vec<CallSiteReplacement>,
    pub descriptions: Vec<JobDescription>,
    pub diagnostics: Vec<CompileError>,
}

impl UnitOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(CompileError::is_error)
    }
}

/// Run the whole pass over one compilation unit.
pub fn generate_unit(
    unit: &CompilationUnit,
    types: &TypeTable,
    sources: Option<&SourceMap>,
    options: &CodegenOptions,
) -> UnitOutput {
    let describe_options = DescribeOptions {
        default_burst: options.default_burst,
    };
    let rewrite_options = RewriteOptions {
        emit_line_directives: options.emit_line_directives,
    };
    let mut output = UnitOutput::default();
    let mut explicit_names: HashMap<(TypeKey, String), Span> = HashMap::new();

    let candidates = scan_unit(unit);
    debug!(file = unit.file_id, candidates = candidates.len(), "scanned unit");

    for candidate in &candidates {
        let mut description = match describe::build(candidate, types, &describe_options) {
            Ok(description) => description,
            Err(fatal) => {
                info!(
                    file = unit.file_id,
                    errors = fatal.errors.len(),
                    "lambda job cannot be generated"
                );
                output.diagnostics.extend(fatal.errors);
                continue;
            }
        };

        let scope = MethodScope::at(
            candidate.method,
            &candidate.containing_type().name,
            types,
            candidate.span(),
        );
        rewrite::rewrite(&mut description, &scope, sources, &rewrite_options);
        verify(&mut description);

        if description.has_explicit_name {
            let key = (TypeKey::of(&description), description.name.clone());
            if let Some(first) = explicit_names.get(&key) {
                description.diagnostics.push(
                    CompileError::new(
                        DiagnosticCode::DuplicateJobName,
                        description.name_span,
                        format!(
                            "job name `{}` is already used in type `{}`",
                            description.name, description.containing_type.name
                        ),
                    )
                    .with_label(*first, "first used here".to_string()),
                );
                description.settle();
            } else {
                explicit_names.insert(key, description.name_span);
            }
        }

        output.diagnostics.extend(description.diagnostics.iter().cloned());
        output.descriptions.push(description);
    }

    let emit_options = EmitOptions {
        enabled_mask_edge_threshold: options.enabled_mask_edge_threshold,
    };
    let mut by_type: IndexMap<TypeKey, Vec<&JobDescription>> = IndexMap::new();
    let mut replacements = Vec::new();
    for description in output.descriptions.iter().filter(|d| d.success) {
        by_type.entry(TypeKey::of(description)).or_default().push(description);
        replacements.push(CallSiteReplacement {
            span: description.call_span,
            text: execute::call_site(description),
            job: description.name.clone(),
        });
    }
    let generated: Vec<GeneratedType> = by_type
        .iter()
        .map(|(key, jobs)| GeneratedType {
            type_name: key.qualified_name(),
            source: emit::emit_type(key, jobs, &unit.usings, types, &emit_options),
        })
        .collect();
    output.types = generated;
    output.replacements = replacements;
    output.replacements.sort_by_key(|r| r.span.start);

    info!(
        file = unit.file_id,
        jobs = output.replacements.len(),
        types = output.types.len(),
        diagnostics = output.diagnostics.len(),
        "generated unit"
    );
    output
}

/// Apply call-site replacements to the original source text.
///
/// Replacements must come from the same file and must not overlap.
pub fn apply_replacements(source: &str, replacements: &[CallSiteReplacement]) -> String {
    let mut ordered: Vec<&CallSiteReplacement> = replacements.iter().collect();
    ordered.sort_by_key(|r| r.span.start);

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0usize;
    for replacement in ordered {
        let start = replacement.span.start as usize;
        let end = replacement.span.end as usize;
        if start < cursor || end > source.len() {
            continue;
        }
        out.push_str(&source[cursor..start]);
        out.push_str(&replacement.text);
        cursor = end;
    }
    out.push_str(&source[cursor..]);
    out
}
