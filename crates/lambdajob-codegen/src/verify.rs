//! Verification of built and rewritten job descriptions.
//!
//! Every check is a pure function from a description to the diagnostics it
//! finds. [`verify`] runs all of them, so one pass reports every problem of a
//! candidate instead of stopping at the first.

use crate::describe::{JobDescription, LambdaParameterKind, QueryKind, ScheduleMode};
use crate::error::{CompileError, DiagnosticCode};
use crate::scan::JobKind;
use lambdajob_ast::{RefKind, TypeRef};
use tracing::warn;

/// A single verification check.
pub type Check = fn(&JobDescription) -> Vec<CompileError>;

/// All checks, in reporting order.
pub const CHECKS: &[Check] = &[
    check_captures,
    check_written_captures,
    check_structural_changes,
    check_schedule_granularity,
    check_duplicate_components,
    check_by_value_components,
    check_query_filters,
    check_job_with_code,
];

/// Diagnostics of every check, without touching the description.
pub fn run_checks(description: &JobDescription) -> Vec<CompileError> {
    CHECKS.iter().flat_map(|check| check(description)).collect()
}

/// Run every check, append the findings to the description and settle its
/// success flag. Returns the number of errors found.
pub fn verify(description: &mut JobDescription) -> usize {
    let found = run_checks(description);
    let errors = found.iter().filter(|d| d.is_error()).count();

    for diagnostic in &found {
        warn!(
            job = %description.name,
            code = %diagnostic.code,
            "{}",
            diagnostic.message
        );
    }

    description.diagnostics.extend(found);
    description.settle();
    errors
}

/// Reference-type captures need the main thread without Burst.
pub fn check_captures(description: &JobDescription) -> Vec<CompileError> {
    if !needs_unmanaged(description) {
        return Vec::new();
    }
    let mut found = Vec::new();
    for capture in &description.captures {
        if capture.is_this() {
            if description.containing_type.is_reference_type() {
                found.push(
                    CompileError::new(
                        DiagnosticCode::ThisCaptureNotAllowed,
                        capture.span,
                        format!(
                            "lambda uses a member of `{}`, which is a class",
                            description.containing_type.name
                        ),
                    )
                    .with_note(
                        "copy the member into a local first, or use `WithoutBurst()` and `Run()`"
                            .to_string(),
                    ),
                );
            }
        } else if capture.is_reference_type {
            found.push(
                CompileError::new(
                    DiagnosticCode::ReferenceTypeCapture,
                    capture.span,
                    format!(
                        "captured variable `{}` has reference type `{}`",
                        capture.name,
                        capture.type_text(&description.containing_type.name)
                    ),
                )
                .with_note("reference types need `WithoutBurst()` and `Run()`".to_string()),
            );
        }
    }
    found
}

/// Captures written inside the lambda.
pub fn check_written_captures(description: &JobDescription) -> Vec<CompileError> {
    let mut found = Vec::new();
    for capture in description.written_captures() {
        if capture.is_using {
            found.push(CompileError::new(
                DiagnosticCode::UsingCaptureWritten,
                capture.span,
                format!(
                    "`{}` is bound by a `using` declaration and cannot be written",
                    capture.name
                ),
            ));
        }
        if capture.read_after && description.schedule.mode != ScheduleMode::Run {
            found.push(
                CompileError::new(
                    DiagnosticCode::CaptureWrittenAndReadAfter,
                    capture.span,
                    format!(
                        "`{}` is written inside the lambda and read after `{}()`",
                        capture.name,
                        description.schedule.mode.method_name()
                    ),
                )
                .with_note(
                    "only `Run()` writes captured values back; use a native container instead"
                        .to_string(),
                ),
            );
        }
    }
    found
}

pub fn check_structural_changes(description: &JobDescription) -> Vec<CompileError> {
    let Some(span) = description.structural_changes_span else {
        return Vec::new();
    };
    let mut found = Vec::new();
    if description.kind == JobKind::JobWithCode {
        found.push(CompileError::new(
            DiagnosticCode::StructuralChangesWithJob,
            span,
            "`WithStructuralChanges()` cannot be used with `Job.WithCode`".to_string(),
        ));
    }
    if description.schedule.mode != ScheduleMode::Run {
        found.push(CompileError::new(
            DiagnosticCode::StructuralChangesWithoutRun,
            span,
            "`WithStructuralChanges()` requires `Run()`".to_string(),
        ));
    }
    found
}

pub fn check_schedule_granularity(description: &JobDescription) -> Vec<CompileError> {
    match &description.schedule_granularity {
        Some(value) if description.schedule.mode != ScheduleMode::ScheduleParallel => {
            vec![CompileError::new(
                DiagnosticCode::GranularityWithoutParallel,
                description.schedule.span,
                format!(
                    "`WithScheduleGranularity(ScheduleGranularity.{})` requires `ScheduleParallel()`",
                    value
                ),
            )]
        }
        _ => Vec::new(),
    }
}

/// Two parameters may not share a component type.
pub fn check_duplicate_components(description: &JobDescription) -> Vec<CompileError> {
    let mut found = Vec::new();
    for (index, param) in description.params.iter().enumerate() {
        let Some(ty) = param.query_type() else {
            continue;
        };
        let first = description.params[..index]
            .iter()
            .find(|earlier| earlier.query_type() == Some(ty));
        if let Some(first) = first {
            found.push(
                CompileError::new(
                    DiagnosticCode::DuplicateComponentParameter,
                    param.span,
                    format!("component type `{}` is received by more than one parameter", ty),
                )
                .with_label(first.span, format!("`{}` first received here", ty)),
            );
        }
    }
    found
}

pub fn check_by_value_components(description: &JobDescription) -> Vec<CompileError> {
    description
        .params
        .iter()
        .filter(|param| {
            param.ref_kind == RefKind::None
                && matches!(param.kind, LambdaParameterKind::Component { .. })
        })
        .map(|param| {
            CompileError::warning(
                DiagnosticCode::ComponentByValue,
                param.span,
                format!(
                    "component `{}` is received by value; use `in` to read it or `ref` to write it",
                    param.declared
                ),
            )
        })
        .collect()
}

/// Filter kinds that can never match together for the same type.
const EXCLUSIVE_FILTERS: &[(QueryKind, QueryKind)] = &[
    (QueryKind::None, QueryKind::All),
    (QueryKind::None, QueryKind::Any),
    (QueryKind::None, QueryKind::Disabled),
    (QueryKind::None, QueryKind::ChangeFilter),
    (QueryKind::Any, QueryKind::All),
    (QueryKind::Absent, QueryKind::All),
    (QueryKind::Absent, QueryKind::Any),
    (QueryKind::Absent, QueryKind::Disabled),
    (QueryKind::Disabled, QueryKind::All),
];

/// A type may not appear under mutually exclusive filters. Lambda
/// parameters count as `WithAll`.
pub fn check_query_filters(description: &JobDescription) -> Vec<CompileError> {
    let mut entries: Vec<(&TypeRef, QueryKind, lambdajob_ast::Span)> = description
        .params
        .iter()
        .filter_map(|p| p.query_type().map(|ty| (ty, QueryKind::All, p.span)))
        .collect();
    entries.extend(description.filters.iter().map(|q| (&q.ty, q.kind, q.span)));

    let mut found = Vec::new();
    let mut reported: Vec<(&TypeRef, QueryKind, QueryKind)> = Vec::new();
    for &(ty, kind, span) in &entries {
        for &(left, right) in EXCLUSIVE_FILTERS {
            if kind != left || reported.contains(&(ty, left, right)) {
                continue;
            }
            let conflict = entries
                .iter()
                .find(|(other, other_kind, _)| *other == ty && *other_kind == right);
            if let Some((_, _, other_span)) = conflict {
                reported.push((ty, left, right));
                found.push(
                    CompileError::new(
                        DiagnosticCode::ConflictingQueryFilters,
                        span,
                        format!(
                            "`{}` cannot be used with both `{}` and `{}`",
                            ty,
                            left.method_name(),
                            right.method_name()
                        ),
                    )
                    .with_label(*other_span, "conflicting use here".to_string()),
                );
            }
        }
    }
    found
}

/// `Job.WithCode` runs once, not per entity.
pub fn check_job_with_code(description: &JobDescription) -> Vec<CompileError> {
    if description.kind != JobKind::JobWithCode {
        return Vec::new();
    }
    let mut found = Vec::new();
    let has_query = !description.filters.is_empty()
        || !description.shared_component_filters.is_empty()
        || !description.entity_query_options.is_empty()
        || description.store_query_in_field.is_some();
    if has_query {
        found.push(CompileError::new(
            DiagnosticCode::JobWithQueryOrParallel,
            description.call_span,
            "`Job.WithCode` cannot use entity query methods".to_string(),
        ));
    }
    if description.schedule.mode == ScheduleMode::ScheduleParallel {
        found.push(CompileError::new(
            DiagnosticCode::JobWithQueryOrParallel,
            description.schedule.span,
            "`Job.WithCode` cannot use `ScheduleParallel()`".to_string(),
        ));
    }
    found
}

/// Bursted or off-main-thread jobs can only touch unmanaged data.
fn needs_unmanaged(description: &JobDescription) -> bool {
    description.burst.enabled || description.schedule.mode != ScheduleMode::Run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::{DescribeOptions, build};
    use crate::scan::scan_unit;
    use crate::semantic::TypeTable;
    use lambdajob_parser::parse_source;

    const PRELUDE: &str = r#"
        struct Foo : IComponentData { public float Value; }
        struct Bar : IComponentData { public float Value; }
    "#;

    fn describe(system_body: &str) -> JobDescription {
        let source = format!("{}\npartial class S : SystemBase {{ {} }}", PRELUDE, system_body);
        let unit = parse_source(&source, 0).unwrap();
        let types = TypeTable::from_units([&unit]);
        let candidates = scan_unit(&unit);
        build(&candidates[0], &types, &DescribeOptions::default()).unwrap()
    }

    fn codes(found: &[CompileError]) -> Vec<DiagnosticCode> {
        found.iter().map(|d| d.code).collect()
    }

    #[test]
    fn test_reference_capture_allowed_only_on_main_thread() {
        let run = describe(
            r#"void OnUpdate() {
                string label = "x";
                Entities.WithoutBurst().ForEach((in Foo f) => { Debug.Log(label); }).Run();
            }"#,
        );
        assert!(check_captures(&run).is_empty());

        let parallel = describe(
            r#"void OnUpdate() {
                string label = "x";
                Entities.WithoutBurst().ForEach((in Foo f) => { Debug.Log(label); }).ScheduleParallel();
            }"#,
        );
        assert_eq!(
            codes(&check_captures(&parallel)),
            vec![DiagnosticCode::ReferenceTypeCapture]
        );
    }

    #[test]
    fn test_this_capture_under_burst() {
        let description = describe(
            r#"float speed;
            void OnUpdate() { Entities.ForEach((ref Foo f) => { f.Value = speed; }).Run(); }"#,
        );
        assert_eq!(
            codes(&check_captures(&description)),
            vec![DiagnosticCode::ThisCaptureNotAllowed]
        );
    }

    #[test]
    fn test_written_capture_read_after_schedule() {
        let description = describe(
            r#"void OnUpdate() {
                int counter = 0;
                Entities.ForEach((in Foo f) => { counter++; }).Schedule();
                Debug.Log(counter);
            }"#,
        );
        assert_eq!(
            codes(&check_written_captures(&description)),
            vec![DiagnosticCode::CaptureWrittenAndReadAfter]
        );
    }

    #[test]
    fn test_structural_changes_rules() {
        let description = describe(
            r#"void OnUpdate() {
                Entities.WithStructuralChanges().ForEach((Entity e) => { }).Schedule();
            }"#,
        );
        assert_eq!(
            codes(&check_structural_changes(&description)),
            vec![DiagnosticCode::StructuralChangesWithoutRun]
        );
    }

    #[test]
    fn test_granularity_requires_parallel() {
        let description = describe(
            r#"void OnUpdate() {
                Entities.WithScheduleGranularity(ScheduleGranularity.Entity).ForEach((in Foo f) => { }).Schedule();
            }"#,
        );
        assert_eq!(
            codes(&check_schedule_granularity(&description)),
            vec![DiagnosticCode::GranularityWithoutParallel]
        );
    }

    #[test]
    fn test_duplicate_component_parameters() {
        let description = describe(
            r#"void OnUpdate() {
                Entities.ForEach((ref Foo a, in Foo b, int entityInQueryIndex, int nativeThreadIndex) => { }).Run();
            }"#,
        );
        let found = check_duplicate_components(&description);
        assert_eq!(codes(&found), vec![DiagnosticCode::DuplicateComponentParameter]);
        assert_eq!(found[0].labels.len(), 1);
    }

    #[test]
    fn test_by_value_warning() {
        let description = describe(
            r#"void OnUpdate() { Entities.ForEach((Foo f, in Bar b) => { }).Run(); }"#,
        );
        let found = check_by_value_components(&description);
        assert_eq!(codes(&found), vec![DiagnosticCode::ComponentByValue]);
        assert!(!found[0].is_error());
    }

    #[test]
    fn test_conflicting_filters_is_idempotent() {
        let description = describe(
            r#"void OnUpdate() {
                Entities.WithNone<Foo>().WithAny<Bar>().WithAll<Bar>().ForEach((in Foo f) => { }).Run();
            }"#,
        );
        let first = check_query_filters(&description);
        let second = check_query_filters(&description);
        assert_eq!(first, second);
        assert_eq!(
            codes(&first),
            vec![
                DiagnosticCode::ConflictingQueryFilters,
                DiagnosticCode::ConflictingQueryFilters
            ]
        );
    }

    #[test]
    fn test_job_with_code_restrictions() {
        let description = describe(
            r#"void OnUpdate() { Job.WithAll<Foo>().WithCode(() => { }).ScheduleParallel(); }"#,
        );
        assert_eq!(
            codes(&check_job_with_code(&description)),
            vec![
                DiagnosticCode::JobWithQueryOrParallel,
                DiagnosticCode::JobWithQueryOrParallel
            ]
        );
    }

    #[test]
    fn test_verify_settles_success() {
        let mut description = describe(
            r#"void OnUpdate() {
                int counter = 0;
                Entities.ForEach((in Foo f) => { counter++; }).Schedule();
                Debug.Log(counter);
            }"#,
        );
        assert!(description.success);
        assert_eq!(verify(&mut description), 1);
        assert!(!description.success);
    }
}
