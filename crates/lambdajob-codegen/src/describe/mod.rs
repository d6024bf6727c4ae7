//! Lambda-job descriptions.
//!
//! A [`JobDescription`] is built once per candidate and carries everything
//! later stages need: naming, scheduling, Burst settings, classified
//! parameters, captured variables, query filters and the lambda body. The
//! builder reports diagnostics on the description; a lambda whose shape
//! cannot be represented at all aborts with a [`FatalShape`].

pub mod captures;
pub mod fluent;
pub mod params;

pub use captures::{CaptureAttribute, CaptureSource, CapturedVariable};
pub use fluent::FluentSettings;
pub use params::{LambdaParameter, LambdaParameterKind, StructField};

use crate::error::{CompileError, DiagnosticCode, FatalShape};
use crate::rewrite::RewrittenBody;
use crate::scan::{Candidate, JobKind, flatten_chain};
use crate::semantic::{MethodScope, TypeTable};
use lambdajob_ast::{
    Block, Expr, ExprKind, Lambda, LambdaBody, RefKind, Span, Stmt, StmtKind, TypeDeclKind, TypeRef,
    walk_block, walk_block_stmts, walk_expr,
};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::debug;

/// Read or write access requested on a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn is_read_only(self) -> bool {
        self == AccessMode::ReadOnly
    }

    /// Combine two requests; write access wins.
    pub fn widen(self, other: AccessMode) -> AccessMode {
        self.max(other)
    }
}

/// How a job is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleMode {
    /// Synchronously on the calling thread.
    Run,
    /// On one worker thread.
    Schedule,
    /// Chunks spread over worker threads.
    ScheduleParallel,
}

impl ScheduleMode {
    pub fn from_method(name: &str) -> Option<Self> {
        match name {
            "Run" => Some(ScheduleMode::Run),
            "Schedule" => Some(ScheduleMode::Schedule),
            "ScheduleParallel" => Some(ScheduleMode::ScheduleParallel),
            _ => None,
        }
    }

    pub fn method_name(self) -> &'static str {
        match self {
            ScheduleMode::Run => "Run",
            ScheduleMode::Schedule => "Schedule",
            ScheduleMode::ScheduleParallel => "ScheduleParallel",
        }
    }
}

/// Terminal call of the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub mode: ScheduleMode,
    /// Explicit input dependency passed to `Schedule`/`ScheduleParallel`.
    pub dependency: Option<Expr>,
    pub span: Span,
}

/// Burst compilation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurstSettings {
    pub enabled: bool,
    /// `FloatMode` member name, e.g. `Fast`.
    pub float_mode: Option<String>,
    /// `FloatPrecision` member name, e.g. `Low`.
    pub float_precision: Option<String>,
    pub synchronous: bool,
    /// Location of the `WithoutBurst` call, if any.
    pub disabled_at: Option<Span>,
}

impl BurstSettings {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            float_mode: None,
            float_precision: None,
            synchronous: false,
            disabled_at: None,
        }
    }
}

/// Filter category of a query entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    All,
    Any,
    None,
    Disabled,
    Absent,
    ChangeFilter,
}

impl QueryKind {
    pub fn from_method(name: &str) -> Option<Self> {
        match name {
            "WithAll" => Some(QueryKind::All),
            "WithAny" => Some(QueryKind::Any),
            "WithNone" => Some(QueryKind::None),
            "WithDisabled" => Some(QueryKind::Disabled),
            "WithAbsent" => Some(QueryKind::Absent),
            "WithChangeFilter" => Some(QueryKind::ChangeFilter),
            _ => None,
        }
    }

    pub fn method_name(self) -> &'static str {
        match self {
            QueryKind::All => "WithAll",
            QueryKind::Any => "WithAny",
            QueryKind::None => "WithNone",
            QueryKind::Disabled => "WithDisabled",
            QueryKind::Absent => "WithAbsent",
            QueryKind::ChangeFilter => "WithChangeFilter",
        }
    }
}

/// One `(type, filter kind, access)` entry of the job's entity query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub ty: TypeRef,
    pub kind: QueryKind,
    pub access: AccessMode,
    pub span: Span,
}

/// Merged entity query of a job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityQueryDesc {
    pub all: Vec<(TypeRef, AccessMode)>,
    pub any: Vec<(TypeRef, AccessMode)>,
    pub none: Vec<TypeRef>,
    pub disabled: Vec<(TypeRef, AccessMode)>,
    pub absent: Vec<TypeRef>,
    pub change_filter: Vec<TypeRef>,
}

impl EntityQueryDesc {
    /// Every type named by the query, in first-seen order.
    pub fn types(&self) -> Vec<&TypeRef> {
        let mut out: Vec<&TypeRef> = Vec::new();
        let listed = self
            .all
            .iter()
            .map(|(ty, _)| ty)
            .chain(self.any.iter().map(|(ty, _)| ty))
            .chain(self.disabled.iter().map(|(ty, _)| ty))
            .chain(self.none.iter())
            .chain(self.absent.iter())
            .chain(self.change_filter.iter());
        for ty in listed {
            if !out.contains(&ty) {
                out.push(ty);
            }
        }
        out
    }
}

/// Command-buffer playback instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Playback {
    /// `WithImmediatePlayback()`: played back right after `Run`.
    Immediate,
    /// `WithDeferredPlaybackSystem<T>()`: handed to system `T`.
    Deferred(TypeRef),
}

/// Type that contains the job.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainingType {
    pub name: String,
    pub namespace: Option<String>,
    pub kind: TypeDeclKind,
    /// Enclosing types, outermost first, with their declaration kinds.
    pub outer: Vec<(String, TypeDeclKind)>,
}

impl ContainingType {
    pub fn is_reference_type(&self) -> bool {
        self.kind == TypeDeclKind::Class
    }
}

/// Everything known about one lambda job.
#[derive(Debug, Clone)]
pub struct JobDescription {
    pub kind: JobKind,
    pub name: String,
    pub has_explicit_name: bool,
    /// Location of the `WithName` argument, or the call site.
    pub name_span: Span,
    pub containing_type: ContainingType,
    /// Signature of the containing method.
    pub containing_method: String,
    pub ordinal: usize,
    /// Whole chain; the span replaced at the call site.
    pub call_span: Span,
    pub schedule: Schedule,
    pub burst: BurstSettings,
    pub params: Vec<LambdaParameter>,
    pub captures: Vec<CapturedVariable>,
    /// Filters from fluent calls, in source order.
    pub filters: Vec<Query>,
    pub shared_component_filters: Vec<Expr>,
    pub entity_query_options: Vec<String>,
    pub store_query_in_field: Option<String>,
    pub schedule_granularity: Option<String>,
    pub structural_changes: bool,
    pub structural_changes_span: Option<Span>,
    /// Every playback instruction found in the chain.
    pub playbacks: Vec<(Playback, Span)>,
    pub lambda_span: Span,
    /// Lambda body; expression bodies are wrapped in a block.
    pub body: Block,
    /// Body after rewriting, set by the rewrite stage.
    pub rewritten: Option<RewrittenBody>,
    pub diagnostics: Vec<CompileError>,
    pub success: bool,
}

impl JobDescription {
    /// Name of the generated job struct.
    pub fn struct_name(&self) -> String {
        format!("{}_Job", self.name)
    }

    /// Name of the generated per-job method invoked at the call site.
    pub fn execute_method_name(&self) -> String {
        format!("{}_Execute", self.name)
    }

    /// Name of the cached entity query field.
    pub fn query_field_name(&self) -> String {
        format!("__query_{}", self.name)
    }

    pub fn is_for_each(&self) -> bool {
        self.kind == JobKind::EntitiesForEach
    }

    pub fn command_buffer_param(&self) -> Option<&LambdaParameter> {
        self.params
            .iter()
            .find(|p| p.kind == LambdaParameterKind::EntityCommandBuffer)
    }

    pub fn playback(&self) -> Option<&Playback> {
        self.playbacks.first().map(|(playback, _)| playback)
    }

    /// Parameters and filters merged into one query. Write access wins when
    /// a type appears in both.
    pub fn entity_query(&self) -> EntityQueryDesc {
        let mut desc = EntityQueryDesc::default();
        let entries = self.params.iter().filter_map(LambdaParameter::query);
        for query in entries.chain(self.filters.iter().cloned()) {
            match query.kind {
                QueryKind::All => merge_access(&mut desc.all, query.ty, query.access),
                QueryKind::Any => merge_access(&mut desc.any, query.ty, query.access),
                QueryKind::Disabled => merge_access(&mut desc.disabled, query.ty, query.access),
                QueryKind::None => push_unique(&mut desc.none, query.ty),
                QueryKind::Absent => push_unique(&mut desc.absent, query.ty),
                QueryKind::ChangeFilter => {
                    push_unique(&mut desc.change_filter, query.ty.clone());
                    if !desc.any.iter().any(|(ty, _)| *ty == query.ty) {
                        merge_access(&mut desc.all, query.ty, AccessMode::ReadOnly);
                    }
                }
            }
        }
        desc
    }

    /// Captures that are written inside the body.
    pub fn written_captures(&self) -> impl Iterator<Item = &CapturedVariable> {
        self.captures.iter().filter(|c| c.written_inside)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(CompileError::is_error)
    }

    /// Recompute `success` from the collected diagnostics.
    pub fn settle(&mut self) {
        self.success = !self.has_errors();
    }
}

fn merge_access(list: &mut Vec<(TypeRef, AccessMode)>, ty: TypeRef, access: AccessMode) {
    match list.iter_mut().find(|(existing, _)| *existing == ty) {
        Some((_, current)) => *current = current.widen(access),
        None => list.push((ty, access)),
    }
}

fn push_unique(list: &mut Vec<TypeRef>, ty: TypeRef) {
    if !list.contains(&ty) {
        list.push(ty);
    }
}

/// Options that influence description building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescribeOptions {
    /// Burst state of jobs without `WithBurst`/`WithoutBurst`.
    pub default_burst: bool,
}

impl Default for DescribeOptions {
    fn default() -> Self {
        Self { default_burst: true }
    }
}

/// Build the description of one candidate.
pub fn build(
    candidate: &Candidate<'_>,
    types: &TypeTable,
    options: &DescribeOptions,
) -> Result<JobDescription, FatalShape> {
    let containing = candidate.containing_type();

    if let Some(generic) = candidate.type_path.iter().find(|t| t.is_generic()) {
        return Err(CompileError::new(
            DiagnosticCode::GenericContainingType,
            candidate.span(),
            format!(
                "lambda jobs cannot be declared inside generic type `{}`",
                generic.name
            ),
        )
        .into());
    }
    if candidate.method.is_generic() {
        return Err(CompileError::new(
            DiagnosticCode::GenericContainingMethod,
            candidate.span(),
            format!(
                "lambda jobs cannot be declared inside generic method `{}`",
                candidate.method.name
            ),
        )
        .into());
    }

    let lambda = inline_lambda(candidate)?;
    let body = normalized_body(lambda);
    check_body_shape(&body)?;

    let schedule = terminal(candidate)?;
    let classified = params::classify(&lambda.params, candidate.kind, types)?;

    let scope = MethodScope::at(candidate.method, &containing.name, types, candidate.span());
    let mut diagnostics = classified.diagnostics;
    let settings = fluent::interpret(&candidate.calls, &scope, options, &mut diagnostics);
    let mut captures = captures::discover(lambda, &body, &scope, candidate.method, candidate.span());

    for request in &settings.attribute_requests {
        match captures.iter_mut().find(|c| c.name == request.variable) {
            Some(capture) => {
                if !capture.attributes.contains(&request.attribute) {
                    capture.attributes.push(request.attribute);
                }
            }
            None => diagnostics.push(CompileError::new(
                DiagnosticCode::AttributeTargetNotCaptured,
                request.span,
                format!(
                    "`{}` names `{}`, which the lambda does not capture",
                    request.attribute.method_name(),
                    request.variable
                ),
            )),
        }
    }

    let (name, has_explicit_name, name_span) = match settings.name.clone() {
        Some((name, span)) => (name, true, span),
        None => (
            derived_name(&containing.name, &candidate.method.signature(), candidate.ordinal),
            false,
            candidate.span(),
        ),
    };

    let outer = candidate
        .type_path
        .iter()
        .skip(1)
        .rev()
        .map(|t| (t.name.clone(), t.kind))
        .collect();

    let mut description = JobDescription {
        kind: candidate.kind,
        name,
        has_explicit_name,
        name_span,
        containing_type: ContainingType {
            name: containing.name.clone(),
            namespace: containing.namespace.clone(),
            kind: containing.kind,
            outer,
        },
        containing_method: candidate.method.signature(),
        ordinal: candidate.ordinal,
        call_span: candidate.span(),
        schedule,
        burst: settings.burst,
        params: classified.params,
        captures,
        filters: settings.filters,
        shared_component_filters: settings.shared_component_filters,
        entity_query_options: settings.entity_query_options,
        store_query_in_field: settings.store_query_in_field,
        schedule_granularity: settings.schedule_granularity.map(|(value, _)| value),
        structural_changes: settings.structural_changes.is_some(),
        structural_changes_span: settings.structural_changes,
        playbacks: settings.playbacks,
        lambda_span: lambda_span(candidate),
        body,
        rewritten: None,
        diagnostics,
        success: false,
    };

    check_parameter_rules(&mut description);
    check_command_buffer_rules(&mut description);
    description.settle();

    debug!(
        job = %description.name,
        params = description.params.len(),
        captures = description.captures.len(),
        success = description.success,
        "built job description"
    );
    Ok(description)
}

/// `{ContainingType}_{hash}_LambdaJob_{ordinal}`, where `hash` is the first
/// eight hex digits of the SHA-256 of the containing method's signature.
pub fn derived_name(containing_type: &str, method_signature: &str, ordinal: usize) -> String {
    let digest = Sha256::digest(method_signature.as_bytes());
    let hash = hex::encode(digest);
    format!("{}_{}_LambdaJob_{}", containing_type, &hash[..8], ordinal)
}

/// Whether a `WithName` value can be used as an identifier.
pub fn is_valid_job_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains("__")
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

fn inline_lambda<'c>(candidate: &'c Candidate<'_>) -> Result<&'c Lambda, FatalShape> {
    let body_method = candidate.kind.body_method();
    let mut calls = candidate.calls_named(body_method);
    let lambda = match (calls.next(), calls.next()) {
        (Some(call), None) => match call.args.as_slice() {
            [arg] if arg.ref_kind == RefKind::None => match &arg.value.unparenthesized().kind {
                ExprKind::Lambda(lambda) => Some(lambda.as_ref()),
                _ => None,
            },
            _ => None,
        },
        _ => None,
    };

    lambda.ok_or_else(|| {
        CompileError::new(
            DiagnosticCode::NotInlineLambda,
            candidate.span(),
            format!("`{}` must be given an inline lambda", body_method),
        )
        .with_note("delegates stored in variables and method groups are not supported".to_string())
        .into()
    })
}

fn lambda_span(candidate: &Candidate<'_>) -> Span {
    candidate
        .calls_named(candidate.kind.body_method())
        .next()
        .and_then(|call| call.args.first())
        .map(|arg| arg.value.span)
        .unwrap_or_else(|| candidate.span())
}

fn normalized_body(lambda: &Lambda) -> Block {
    match &lambda.body {
        LambdaBody::Block(block) => block.clone(),
        LambdaBody::Expr(expr) => Block {
            stmts: vec![Stmt {
                id: expr.id,
                kind: StmtKind::Expr(expr.as_ref().clone()),
                span: expr.span,
            }],
            span: expr.span,
        },
    }
}

/// Nested jobs, local functions and anonymous functions cannot be moved
/// into a job struct.
fn check_body_shape(body: &Block) -> Result<(), FatalShape> {
    let mut errors = Vec::new();

    walk_block_stmts(body, &mut |stmt| {
        if let StmtKind::LocalFunction(function) = &stmt.kind {
            errors.push(CompileError::new(
                DiagnosticCode::LocalFunctionInLambda,
                stmt.span,
                format!(
                    "local function `{}` cannot be declared inside a lambda job",
                    function.name
                ),
            ));
        }
    });

    let mut nested: HashSet<_> = HashSet::new();
    walk_block(body, &mut |expr| {
        if nested.contains(&expr.id) {
            return;
        }
        if let Some((kind, _)) = flatten_chain(expr) {
            walk_expr(expr, &mut |inner| {
                nested.insert(inner.id);
            });
            errors.push(CompileError::new(
                DiagnosticCode::NestedLambdaJob,
                expr.span,
                format!(
                    "`{}.{}` cannot be used inside another lambda job",
                    kind.entry_name(),
                    kind.body_method()
                ),
            ));
            return;
        }
        if matches!(expr.kind, ExprKind::Lambda(_)) {
            errors.push(CompileError::new(
                DiagnosticCode::AnonymousFunctionInLambda,
                expr.span,
                "anonymous functions cannot be used inside a lambda job".to_string(),
            ));
        }
    });

    errors.sort_by_key(|e| e.span.start);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(FatalShape { errors })
    }
}

fn terminal(candidate: &Candidate<'_>) -> Result<Schedule, FatalShape> {
    let last = candidate.calls.last();
    let mode = last.and_then(|call| ScheduleMode::from_method(&call.name));
    match (last, mode) {
        (Some(call), Some(mode)) => Ok(Schedule {
            mode,
            dependency: match mode {
                ScheduleMode::Run => None,
                _ => call.args.first().map(|arg| arg.value.clone()),
            },
            span: call.span,
        }),
        _ => Err(CompileError::new(
            DiagnosticCode::MissingTerminal,
            candidate.span(),
            format!(
                "`{}` chain must end with `Run()`, `Schedule()` or `ScheduleParallel()`",
                candidate.kind.entry_name()
            ),
        )
        .into()),
    }
}

/// Shared and managed parameters need the main thread without Burst.
fn check_parameter_rules(description: &mut JobDescription) {
    let off_main_thread = description.schedule.mode != ScheduleMode::Run;
    let mut found = Vec::new();

    for param in &description.params {
        if !(param.is_managed() || param.is_shared()) {
            continue;
        }
        if description.burst.enabled || off_main_thread {
            found.push(
                CompileError::new(
                    DiagnosticCode::ManagedComponentNotAllowed,
                    param.span,
                    format!(
                        "shared or managed parameter `{}` requires `WithoutBurst()` and `Run()`",
                        param.name
                    ),
                )
                .with_note("these components are only accessed on the main thread".to_string()),
            );
        }
    }
    description.diagnostics.extend(found);
}

/// Command-buffer playback rules.
fn check_command_buffer_rules(description: &mut JobDescription) {
    let buffers: Vec<Span> = description
        .params
        .iter()
        .filter(|p| p.kind == LambdaParameterKind::EntityCommandBuffer)
        .map(|p| p.span)
        .collect();
    let mut found = Vec::new();

    if buffers.len() > 1 {
        found.push(CompileError::new(
            DiagnosticCode::MultipleCommandBuffers,
            buffers[1],
            "a lambda job can receive at most one `EntityCommandBuffer`".to_string(),
        ));
    }

    if description.playbacks.len() > 1 {
        let (_, span) = &description.playbacks[1];
        found.push(CompileError::new(
            DiagnosticCode::MultiplePlaybacks,
            *span,
            "only one playback instruction may be given".to_string(),
        ));
    }

    if let Some(&param_span) = buffers.first() {
        match description.playbacks.first() {
            None => found.push(
                CompileError::new(
                    DiagnosticCode::MissingPlayback,
                    param_span,
                    "an `EntityCommandBuffer` parameter needs a playback instruction".to_string(),
                )
                .with_note(
                    "add `WithImmediatePlayback()` or `WithDeferredPlaybackSystem<T>()`".to_string(),
                ),
            ),
            Some((Playback::Immediate, span))
                if description.schedule.mode != ScheduleMode::Run =>
            {
                found.push(CompileError::new(
                    DiagnosticCode::ImmediatePlaybackWithoutRun,
                    *span,
                    "`WithImmediatePlayback()` requires `Run()`".to_string(),
                ));
            }
            Some(_) => {}
        }
    }

    description.diagnostics.extend(found);
}

#[cfg(test)]
mod tests;
