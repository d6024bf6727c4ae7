//! Diagnostics reported by the lambda-job pass.
//!
//! Diagnostics are data: every stage pushes [`CompileError`]s into a list
//! instead of returning early, so a single run surfaces as many real
//! problems as possible. Only malformed lambda shapes abort a candidate,
//! through [`FatalShape`].
//!
//! # Design
//!
//! - `CompileError`: one diagnostic with a primary span and optional labels
//! - `DiagnosticCode`: stable short code (`DC0004`) keyed on by tooling
//! - `Severity`: error, warning or note
//! - `DiagnosticFormatter`: renders diagnostics with source snippets
//!
//! # Examples
//!
//! ```
//! # use lambdajob_codegen::error::*;
//! # use lambdajob_ast::Span;
//! let error = CompileError::new(
//!     DiagnosticCode::MissingTerminal,
//!     Span::new(0, 10, 20),
//!     "lambda job has no `Run`, `Schedule` or `ScheduleParallel` call".to_string(),
//! );
//! assert_eq!(error.code.as_str(), "DC0011");
//! ```

use lambdajob_ast::{SourceMap, Span};
use std::fmt;

/// Compilation diagnostic with source location and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Stable diagnostic code
    pub code: DiagnosticCode,
    /// Severity level
    pub severity: Severity,
    /// Primary source location
    pub span: Span,
    /// Primary message
    pub message: String,
    /// Additional labeled spans
    pub labels: Vec<Label>,
    /// Additional notes or hints
    pub notes: Vec<String>,
}

/// Stable diagnostic codes.
///
/// Codes never change meaning between versions; new failure categories get
/// new codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticCode {
    /// DC0001: member of the containing reference type used in a bursted or scheduled job
    ThisCaptureNotAllowed,
    /// DC0003: `WithName` value already used in this type
    DuplicateJobName,
    /// DC0004: captured reference type in a bursted or scheduled job
    ReferenceTypeCapture,
    /// DC0005: unsupported lambda parameter shape
    UnsupportedParameter,
    /// DC0008: fluent argument must be a literal or enum constant
    ArgumentNotConstant,
    /// DC0011: no terminal call
    MissingTerminal,
    /// DC0012: attribute fluent call argument is not a captured local
    AttributeTargetNotCaptured,
    /// DC0013: captured variable written inside and read after a scheduled job
    CaptureWrittenAndReadAfter,
    /// DC0014: unsupported `int` parameter name
    UnsupportedIntParameter,
    /// DC0020: shared component received by `ref`
    SharedComponentByRef,
    /// DC0021: parameter type is not a component, buffer or aspect
    ParameterNotComponent,
    /// DC0023: managed or shared component in a bursted or scheduled job
    ManagedComponentNotAllowed,
    /// DC0024: managed component received by `ref`
    ManagedComponentByRef,
    /// DC0027: structural change without `WithStructuralChanges().Run()`
    StructuralChangeNotAllowed,
    /// DC0029: nested lambda job
    NestedLambdaJob,
    /// DC0033: buffer element received directly
    BufferElementParameter,
    /// DC0034: `WithStoreEntityQueryInField` argument is not a field
    StoreQueryTargetNotField,
    /// DC0043: invalid `WithName` identifier
    InvalidJobName,
    /// DC0044: job body is not an inline lambda
    NotInlineLambda,
    /// DC0046: write-access data method on a type that is a lambda parameter
    WriteLookupAliasesParameter,
    /// DC0047: data method on a type that is a write-access lambda parameter
    LookupAliasesWrittenParameter,
    /// DC0050: generic lambda parameter type
    GenericParameterType,
    /// DC0053: lambda job in a generic type
    GenericContainingType,
    /// DC0054: lambda job in a generic method
    GenericContainingMethod,
    /// DC0055: component parameter received by value
    ComponentByValue,
    /// DC0056: mutually exclusive query filters
    ConflictingQueryFilters,
    /// DC0057: `WithStructuralChanges` on `Job.WithCode`
    StructuralChangesWithJob,
    /// DC0059: read-only flag of a lookup method is not a literal
    ReadOnlyFlagNotLiteral,
    /// DC0063: read-write data method under `ScheduleParallel`
    WriteLookupInParallel,
    /// DC0064: `WithStructuralChanges` without `Run`
    StructuralChangesWithoutRun,
    /// DC0070: duplicate component type among parameters
    DuplicateComponentParameter,
    /// DC0073: `WithScheduleGranularity` without `ScheduleParallel`
    GranularityWithoutParallel,
    /// DC0074: command buffer parameter without a playback instruction
    MissingPlayback,
    /// DC0075: `WithImmediatePlayback` without `Run`
    ImmediatePlaybackWithoutRun,
    /// DC0076: more than one command buffer parameter
    MultipleCommandBuffers,
    /// DC0077: `EntityCommandBuffer.ParallelWriter` parameter
    ParallelWriterParameter,
    /// DC0078: more than one playback instruction
    MultiplePlaybacks,
    /// DC0079: scope-guarded capture written inside the lambda
    UsingCaptureWritten,
    /// DC0080: `Job.WithCode` with query filters or `ScheduleParallel`
    JobWithQueryOrParallel,
    /// DC0081: local function inside the lambda body
    LocalFunctionInLambda,
    /// DC0082: anonymous function inside the lambda body
    AnonymousFunctionInLambda,
    /// LJ0001: lexer or parser error
    Syntax,
    /// LJ0002: type argument of a data-access call cannot be inferred
    UninferredTypeArgument,
}

impl DiagnosticCode {
    /// Short code as reported to users.
    pub fn as_str(self) -> &'static str {
        use DiagnosticCode::*;
        match self {
            ThisCaptureNotAllowed => "DC0001",
            DuplicateJobName => "DC0003",
            ReferenceTypeCapture => "DC0004",
            UnsupportedParameter => "DC0005",
            ArgumentNotConstant => "DC0008",
            MissingTerminal => "DC0011",
            AttributeTargetNotCaptured => "DC0012",
            CaptureWrittenAndReadAfter => "DC0013",
            UnsupportedIntParameter => "DC0014",
            SharedComponentByRef => "DC0020",
            ParameterNotComponent => "DC0021",
            ManagedComponentNotAllowed => "DC0023",
            ManagedComponentByRef => "DC0024",
            StructuralChangeNotAllowed => "DC0027",
            NestedLambdaJob => "DC0029",
            BufferElementParameter => "DC0033",
            StoreQueryTargetNotField => "DC0034",
            InvalidJobName => "DC0043",
            NotInlineLambda => "DC0044",
            WriteLookupAliasesParameter => "DC0046",
            LookupAliasesWrittenParameter => "DC0047",
            GenericParameterType => "DC0050",
            GenericContainingType => "DC0053",
            GenericContainingMethod => "DC0054",
            ComponentByValue => "DC0055",
            ConflictingQueryFilters => "DC0056",
            StructuralChangesWithJob => "DC0057",
            ReadOnlyFlagNotLiteral => "DC0059",
            WriteLookupInParallel => "DC0063",
            StructuralChangesWithoutRun => "DC0064",
            DuplicateComponentParameter => "DC0070",
            GranularityWithoutParallel => "DC0073",
            MissingPlayback => "DC0074",
            ImmediatePlaybackWithoutRun => "DC0075",
            MultipleCommandBuffers => "DC0076",
            ParallelWriterParameter => "DC0077",
            MultiplePlaybacks => "DC0078",
            UsingCaptureWritten => "DC0079",
            JobWithQueryOrParallel => "DC0080",
            LocalFunctionInLambda => "DC0081",
            AnonymousFunctionInLambda => "DC0082",
            Syntax => "LJ0001",
            UninferredTypeArgument => "LJ0002",
        }
    }

    /// Look a code up by its short form.
    pub fn parse(code: &str) -> Option<Self> {
        ALL_CODES.iter().copied().find(|c| c.as_str() == code)
    }
}

/// Every diagnostic code, in code order.
pub const ALL_CODES: &[DiagnosticCode] = &[
    DiagnosticCode::ThisCaptureNotAllowed,
    DiagnosticCode::DuplicateJobName,
    DiagnosticCode::ReferenceTypeCapture,
    DiagnosticCode::UnsupportedParameter,
    DiagnosticCode::ArgumentNotConstant,
    DiagnosticCode::MissingTerminal,
    DiagnosticCode::AttributeTargetNotCaptured,
    DiagnosticCode::CaptureWrittenAndReadAfter,
    DiagnosticCode::UnsupportedIntParameter,
    DiagnosticCode::SharedComponentByRef,
    DiagnosticCode::ParameterNotComponent,
    DiagnosticCode::ManagedComponentNotAllowed,
    DiagnosticCode::ManagedComponentByRef,
    DiagnosticCode::StructuralChangeNotAllowed,
    DiagnosticCode::NestedLambdaJob,
    DiagnosticCode::BufferElementParameter,
    DiagnosticCode::StoreQueryTargetNotField,
    DiagnosticCode::InvalidJobName,
    DiagnosticCode::NotInlineLambda,
    DiagnosticCode::WriteLookupAliasesParameter,
    DiagnosticCode::LookupAliasesWrittenParameter,
    DiagnosticCode::GenericParameterType,
    DiagnosticCode::GenericContainingType,
    DiagnosticCode::GenericContainingMethod,
    DiagnosticCode::ComponentByValue,
    DiagnosticCode::ConflictingQueryFilters,
    DiagnosticCode::StructuralChangesWithJob,
    DiagnosticCode::ReadOnlyFlagNotLiteral,
    DiagnosticCode::WriteLookupInParallel,
    DiagnosticCode::StructuralChangesWithoutRun,
    DiagnosticCode::DuplicateComponentParameter,
    DiagnosticCode::GranularityWithoutParallel,
    DiagnosticCode::MissingPlayback,
    DiagnosticCode::ImmediatePlaybackWithoutRun,
    DiagnosticCode::MultipleCommandBuffers,
    DiagnosticCode::ParallelWriterParameter,
    DiagnosticCode::MultiplePlaybacks,
    DiagnosticCode::UsingCaptureWritten,
    DiagnosticCode::JobWithQueryOrParallel,
    DiagnosticCode::LocalFunctionInLambda,
    DiagnosticCode::AnonymousFunctionInLambda,
    DiagnosticCode::Syntax,
    DiagnosticCode::UninferredTypeArgument,
];

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational note (not an error)
    Note,
    /// Warning (code is valid but suspicious)
    Warning,
    /// Error (no code is emitted for the candidate)
    Error,
}

/// Secondary labeled span in a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    /// Source location
    pub span: Span,
    /// Label text
    pub message: String,
}

impl CompileError {
    /// Creates a new error diagnostic.
    pub fn new(code: DiagnosticCode, span: Span, message: String) -> Self {
        Self::with_severity(code, Severity::Error, span, message)
    }

    /// Creates a new warning diagnostic.
    pub fn warning(code: DiagnosticCode, span: Span, message: String) -> Self {
        Self::with_severity(code, Severity::Warning, span, message)
    }

    fn with_severity(code: DiagnosticCode, severity: Severity, span: Span, message: String) -> Self {
        Self {
            code,
            severity,
            span,
            message,
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Adds a secondary labeled span.
    pub fn with_label(mut self, span: Span, message: String) -> Self {
        self.labels.push(Label { span, message });
        self
    }

    /// Adds a note or hint.
    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)
    }
}

impl std::error::Error for CompileError {}

/// Signal that a candidate's lambda shape is unusable.
///
/// Carries the diagnostics that explain why; no further checks run for the
/// candidate once this is raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalShape {
    pub errors: Vec<CompileError>,
}

impl From<CompileError> for FatalShape {
    fn from(error: CompileError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

/// Formats diagnostics with source code context.
///
/// Produces the file path with line and column, the source line, and a caret
/// underline below the primary span, followed by labels and notes.
pub struct DiagnosticFormatter<'a> {
    sources: &'a SourceMap,
}

impl<'a> DiagnosticFormatter<'a> {
    pub fn new(sources: &'a SourceMap) -> Self {
        Self { sources }
    }

    /// Formats a diagnostic as a string with source context.
    pub fn format(&self, error: &CompileError) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}[{}]: {}\n",
            error.severity, error.code, error.message
        ));

        let Some(file) = self.sources.get(error.span.file_id) else {
            for note in &error.notes {
                output.push_str(&format!("   = help: {}\n", note));
            }
            return output;
        };

        let (line, col) = file.line_col(error.span.start);
        output.push_str(&format!("  --> {}:{}:{}\n", file.path.display(), line, col));

        if let Some(source_line) = file.line_text(line) {
            output.push_str("   |\n");
            output.push_str(&format!("{:3} | {}\n", line, source_line));

            let start_col = col as usize;
            let span_len = error.span.end.saturating_sub(error.span.start) as usize;
            let end_col = (start_col + span_len).min(source_line.len() + 1);
            let underline = " ".repeat(start_col.saturating_sub(1))
                + &"^".repeat(end_col.saturating_sub(start_col).max(1));
            output.push_str(&format!("   | {}\n", underline));
        }

        for label in &error.labels {
            output.push_str(&format!("   = note: {}\n", label.message));
            if let Some(label_file) = self.sources.get(label.span.file_id) {
                let (label_line, label_col) = label_file.line_col(label.span.start);
                output.push_str(&format!(
                    "     at {}:{}:{}\n",
                    label_file.path.display(),
                    label_line,
                    label_col
                ));
            }
        }

        for note in &error.notes {
            output.push_str(&format!("   = help: {}\n", note));
        }

        output
    }

    /// Formats multiple diagnostics separated by blank lines.
    pub fn format_all(&self, errors: &[CompileError]) -> String {
        errors
            .iter()
            .map(|e| self.format(e))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_sources() -> SourceMap {
        let mut sources = SourceMap::new();
        sources.add_file(
            PathBuf::from("MoveSystem.cs"),
            "var a = foo;\nEntities.ForEach((ref Foo f) => {}).Run();".to_string(),
        );
        sources
    }

    #[test]
    fn test_error_creation() {
        let err = CompileError::new(
            DiagnosticCode::DuplicateJobName,
            Span::new(0, 0, 3),
            "duplicate job name `Move`".to_string(),
        );

        assert_eq!(err.severity, Severity::Error);
        assert!(err.is_error());
        assert!(err.labels.is_empty());
        assert!(err.notes.is_empty());
    }

    #[test]
    fn test_warning_is_not_error() {
        let warn = CompileError::warning(
            DiagnosticCode::ComponentByValue,
            Span::new(0, 0, 3),
            "component received by value".to_string(),
        );
        assert_eq!(warn.severity, Severity::Warning);
        assert!(!warn.is_error());
    }

    #[test]
    fn test_codes_are_unique_and_parse_back() {
        let mut seen = std::collections::HashSet::new();
        for code in ALL_CODES {
            assert!(seen.insert(code.as_str()), "duplicate code {}", code);
            assert_eq!(DiagnosticCode::parse(code.as_str()), Some(*code));
        }
        assert_eq!(DiagnosticCode::parse("DC9999"), None);
    }

    #[test]
    fn test_display_includes_code() {
        let err = CompileError::new(
            DiagnosticCode::CaptureWrittenAndReadAfter,
            Span::new(0, 0, 3),
            "`counter` is written in the job and read afterwards".to_string(),
        );
        assert_eq!(
            err.to_string(),
            "error[DC0013]: `counter` is written in the job and read afterwards"
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Note < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn test_formatter_basic() {
        let sources = test_sources();
        let error = CompileError::new(
            DiagnosticCode::ReferenceTypeCapture,
            Span::new(0, 8, 11),
            "captured `foo` has a reference type".to_string(),
        );

        let formatted = DiagnosticFormatter::new(&sources).format(&error);

        assert!(formatted.contains("error[DC0004]"));
        assert!(formatted.contains("MoveSystem.cs:1:9"));
        assert!(formatted.contains("var a = foo;"));
        assert!(formatted.contains("        ^^^"));
    }

    #[test]
    fn test_formatter_with_label_and_note() {
        let sources = test_sources();
        let error = CompileError::new(
            DiagnosticCode::DuplicateJobName,
            Span::new(0, 8, 11),
            "duplicate job name".to_string(),
        )
        .with_label(Span::new(0, 13, 21), "first used here".to_string())
        .with_note("rename one of the jobs".to_string());

        let formatted = DiagnosticFormatter::new(&sources).format(&error);

        assert!(formatted.contains("first used here"));
        assert!(formatted.contains("MoveSystem.cs:2:1"));
        assert!(formatted.contains("help: rename one of the jobs"));
    }

    #[test]
    fn test_formatter_multiple() {
        let sources = test_sources();
        let errors = vec![
            CompileError::new(DiagnosticCode::Syntax, Span::new(0, 0, 3), "one".to_string()),
            CompileError::warning(
                DiagnosticCode::ComponentByValue,
                Span::new(0, 13, 21),
                "two".to_string(),
            ),
        ];

        let formatted = DiagnosticFormatter::new(&sources).format_all(&errors);
        assert!(formatted.contains("error[LJ0001]: one"));
        assert!(formatted.contains("warning[DC0055]: two"));
    }
}
