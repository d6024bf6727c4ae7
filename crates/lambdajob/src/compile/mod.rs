use crate::config::GeneratorConfig;
use lambdajob_ast::{CompilationUnit, SourceMap};
use lambdajob_codegen::{
    CallSiteReplacement, CompileError, DiagnosticCode, DiagnosticFormatter, GeneratedType,
    Severity, TypeTable, apply_replacements, generate_unit,
};
use lambdajob_parser::{ParseError, parse_source};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Errors of directory generation.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("directory traversal error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("no .{extension} files found in {root}")]
    NoSources { root: PathBuf, extension: String },

    /// Generation reported errors (or warnings, with `fail_on_warnings`).
    #[error("{count} diagnostic(s) reported\n{report}")]
    Diagnostics {
        count: usize,
        report: String,
        errors: Vec<CompileError>,
    },
}

/// Result of generating one source file.
#[derive(Debug)]
pub struct GenerationResult {
    pub path: PathBuf,
    /// Generated partial declarations, one per containing type.
    pub types: Vec<GeneratedType>,
    pub replacements: Vec<CallSiteReplacement>,
    /// Original source with every successful chain replaced by its
    /// execute-method call.
    pub patched_source: String,
    pub diagnostics: Vec<CompileError>,
    pub sources: SourceMap,
}

impl GenerationResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(CompileError::is_error)
    }

    pub fn has_warnings(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Warning)
    }

    /// Whether the result counts as a failure under `config`.
    pub fn is_failure(&self, config: &GeneratorConfig) -> bool {
        self.has_errors() || (config.fail_on_warnings && self.has_warnings())
    }

    /// All generated types concatenated into one file body.
    pub fn generated_text(&self) -> String {
        self.types
            .iter()
            .map(|t| t.source.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn format_diagnostics(&self) -> String {
        format_errors(&self.diagnostics, &self.sources)
    }
}

/// A generated file ready to be written next to its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub contents: String,
    pub patched_source: String,
}

/// Generate jobs for a single source text.
///
/// Types are resolved against this file only; use [`generate_dir`] when
/// components are declared in other files.
pub fn compile_source(path: &Path, text: &str, config: &GeneratorConfig) -> GenerationResult {
    let mut sources = SourceMap::new();
    let file_id = sources.add_file(path.to_path_buf(), text.to_string());

    let unit = match parse_source(text, file_id) {
        Ok(unit) => unit,
        Err(errors) => {
            return GenerationResult {
                path: path.to_path_buf(),
                types: Vec::new(),
                replacements: Vec::new(),
                patched_source: text.to_string(),
                diagnostics: errors.into_iter().map(syntax_error).collect(),
                sources,
            };
        }
    };

    let types = TypeTable::from_units([&unit]);
    generate_file(path, text, &unit, &types, sources, config)
}

fn generate_file(
    path: &Path,
    text: &str,
    unit: &CompilationUnit,
    types: &TypeTable,
    sources: SourceMap,
    config: &GeneratorConfig,
) -> GenerationResult {
    let output = generate_unit(unit, types, Some(&sources), &config.codegen_options());
    let patched_source = apply_replacements(text, &output.replacements);
    GenerationResult {
        path: path.to_path_buf(),
        types: output.types,
        replacements: output.replacements,
        patched_source,
        diagnostics: output.diagnostics,
        sources,
    }
}

/// Generate jobs for every source file under `root`.
///
/// Files are discovered recursively and processed in path order. All files
/// share one type table, so components may live in any file. Files without
/// lambda jobs produce no output.
pub fn generate_dir(
    root: &Path,
    config: &GeneratorConfig,
) -> Result<Vec<GeneratedFile>, GenerateError> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        let is_source = entry
            .path()
            .extension()
            .is_some_and(|ext| ext == config.source_extension.as_str());
        let is_generated = entry
            .path()
            .to_string_lossy()
            .ends_with(config.output_suffix.as_str());
        if entry.file_type().is_file() && is_source && !is_generated {
            paths.push(entry.path().to_path_buf());
        }
    }
    paths.sort();

    if paths.is_empty() {
        return Err(GenerateError::NoSources {
            root: root.to_path_buf(),
            extension: config.source_extension.clone(),
        });
    }
    info!(root = %root.display(), files = paths.len(), "generating lambda jobs");

    let mut sources = SourceMap::new();
    let mut texts = Vec::new();
    for path in &paths {
        let text = std::fs::read_to_string(path).map_err(|source| GenerateError::Read {
            path: path.clone(),
            source,
        })?;
        let file_id = sources.add_file(path.clone(), text.clone());
        texts.push((path, file_id, text));
    }

    let mut diagnostics = Vec::new();
    let mut units = Vec::new();
    for (path, file_id, text) in &texts {
        match parse_source(text, *file_id) {
            Ok(unit) => units.push((*path, text.as_str(), unit)),
            Err(errors) => diagnostics.extend(errors.into_iter().map(syntax_error)),
        }
    }

    let types = TypeTable::from_units(units.iter().map(|(_, _, unit)| unit));
    let options = config.codegen_options();
    let mut files = Vec::new();
    for (path, text, unit) in &units {
        let output = generate_unit(unit, &types, Some(&sources), &options);
        diagnostics.extend(output.diagnostics.iter().cloned());
        if output.types.is_empty() {
            debug!(file = %path.display(), "no lambda jobs");
            continue;
        }
        let contents = output
            .types
            .iter()
            .map(|t| t.source.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        files.push(GeneratedFile {
            source_path: path.to_path_buf(),
            output_path: output_path(path, &config.output_suffix),
            contents,
            patched_source: apply_replacements(text, &output.replacements),
        });
    }

    let failed = diagnostics.iter().any(|d| {
        d.is_error() || (config.fail_on_warnings && d.severity == Severity::Warning)
    });
    if failed {
        let report = format_errors(&diagnostics, &sources);
        return Err(GenerateError::Diagnostics {
            count: diagnostics.len(),
            report,
            errors: diagnostics,
        });
    }
    if !diagnostics.is_empty() {
        warn!("{}", format_errors(&diagnostics, &sources).trim_end());
    }

    info!(generated = files.len(), "lambda job generation finished");
    Ok(files)
}

/// `Systems/Mover.cs` → `Systems/Mover.g.cs`
pub fn output_path(source: &Path, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    source.with_file_name(format!("{}{}", stem, suffix))
}

/// Formats compilation errors with source context.
pub fn format_errors(errors: &[CompileError], sources: &SourceMap) -> String {
    DiagnosticFormatter::new(sources).format_all(errors)
}

fn syntax_error(error: ParseError) -> CompileError {
    CompileError::new(DiagnosticCode::Syntax, error.span, error.message)
}
