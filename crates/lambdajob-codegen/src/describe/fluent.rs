//! Interpretation of the fluent calls of a chain.

use super::captures::CaptureAttribute;
use super::{AccessMode, BurstSettings, DescribeOptions, Playback, Query, QueryKind, is_valid_job_name};
use crate::error::{CompileError, DiagnosticCode};
use crate::scan::FluentCall;
use crate::semantic::{MethodScope, SymbolKind};
use lambdajob_ast::{BinaryOp, Expr, ExprKind, LiteralKind, Span};

/// Request to tag a captured variable with a safety attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRequest {
    pub attribute: CaptureAttribute,
    pub variable: String,
    pub span: Span,
}

/// Settings collected from the fluent calls.
#[derive(Debug, Clone, PartialEq)]
pub struct FluentSettings {
    pub name: Option<(String, Span)>,
    pub burst: BurstSettings,
    /// Location of `WithStructuralChanges()`.
    pub structural_changes: Option<Span>,
    pub filters: Vec<Query>,
    pub shared_component_filters: Vec<Expr>,
    pub entity_query_options: Vec<String>,
    pub store_query_in_field: Option<String>,
    pub attribute_requests: Vec<AttributeRequest>,
    pub schedule_granularity: Option<(String, Span)>,
    pub playbacks: Vec<(Playback, Span)>,
}

/// Interpret every call of the chain. Problems with individual arguments
/// are pushed to `diagnostics`; the offending call is otherwise ignored.
pub fn interpret(
    calls: &[FluentCall],
    scope: &MethodScope<'_>,
    options: &DescribeOptions,
    diagnostics: &mut Vec<CompileError>,
) -> FluentSettings {
    let mut settings = FluentSettings {
        name: None,
        burst: BurstSettings::new(options.default_burst),
        structural_changes: None,
        filters: Vec::new(),
        shared_component_filters: Vec::new(),
        entity_query_options: Vec::new(),
        store_query_in_field: None,
        attribute_requests: Vec::new(),
        schedule_granularity: None,
        playbacks: Vec::new(),
    };

    for call in calls {
        if let Some(kind) = QueryKind::from_method(&call.name) {
            settings.filters.extend(call.type_args.iter().map(|ty| Query {
                ty: ty.clone(),
                kind,
                access: AccessMode::ReadOnly,
                span: call.span,
            }));
            continue;
        }
        if let Some(attribute) = CaptureAttribute::from_method(&call.name) {
            attribute_request(call, attribute, scope, &mut settings, diagnostics);
            continue;
        }

        match call.name.as_str() {
            "WithName" => with_name(call, &mut settings, diagnostics),
            "WithBurst" => with_burst(call, &mut settings.burst, diagnostics),
            "WithoutBurst" => {
                settings.burst.enabled = false;
                settings.burst.disabled_at = Some(call.span);
            }
            "WithStructuralChanges" => settings.structural_changes = Some(call.span),
            "WithSharedComponentFilter" => {
                settings
                    .shared_component_filters
                    .extend(call.args.iter().map(|arg| arg.value.clone()));
            }
            "WithEntityQueryOptions" => {
                for arg in &call.args {
                    match enum_flags(&arg.value, "EntityQueryOptions") {
                        Some(flags) => settings.entity_query_options.extend(flags),
                        None => diagnostics.push(not_constant(call, &arg.value)),
                    }
                }
            }
            "WithStoreEntityQueryInField" => {
                store_query_field(call, scope, &mut settings, diagnostics)
            }
            "WithScheduleGranularity" => match call.args.first() {
                Some(arg) => match enum_member(&arg.value, "ScheduleGranularity") {
                    Some(value) => settings.schedule_granularity = Some((value, call.span)),
                    None => diagnostics.push(not_constant(call, &arg.value)),
                },
                None => {}
            },
            "WithImmediatePlayback" => settings.playbacks.push((Playback::Immediate, call.span)),
            "WithDeferredPlaybackSystem" => {
                if let Some(system) = call.type_args.first() {
                    settings
                        .playbacks
                        .push((Playback::Deferred(system.clone()), call.span));
                }
            }
            _ => {}
        }
    }

    // Structural-change jobs run on the main thread without Burst.
    if let Some(span) = settings.structural_changes {
        settings.burst.enabled = false;
        settings.burst.disabled_at.get_or_insert(span);
    }

    settings
}

fn with_name(call: &FluentCall, settings: &mut FluentSettings, diagnostics: &mut Vec<CompileError>) {
    let Some(arg) = call.args.first() else {
        return;
    };
    let ExprKind::Literal(literal) = &arg.value.unparenthesized().kind else {
        diagnostics.push(not_constant(call, &arg.value));
        return;
    };
    let Some(name) = literal.string_value() else {
        diagnostics.push(not_constant(call, &arg.value));
        return;
    };
    if is_valid_job_name(&name) {
        settings.name = Some((name, arg.value.span));
    } else {
        diagnostics.push(
            CompileError::new(
                DiagnosticCode::InvalidJobName,
                arg.value.span,
                format!("`{}` is not a valid job name", name),
            )
            .with_note(
                "names may only contain letters, digits and single underscores".to_string(),
            ),
        );
    }
}

fn with_burst(call: &FluentCall, burst: &mut BurstSettings, diagnostics: &mut Vec<CompileError>) {
    burst.enabled = true;
    for arg in &call.args {
        let value = arg.value.unparenthesized();
        if let Some(mode) = enum_member(value, "FloatMode") {
            burst.float_mode = Some(mode);
        } else if let Some(precision) = enum_member(value, "FloatPrecision") {
            burst.float_precision = Some(precision);
        } else if let Some(flag) = bool_literal(value) {
            burst.synchronous = flag;
        } else {
            diagnostics.push(not_constant(call, &arg.value));
        }
    }
}

fn attribute_request(
    call: &FluentCall,
    attribute: CaptureAttribute,
    scope: &MethodScope<'_>,
    settings: &mut FluentSettings,
    diagnostics: &mut Vec<CompileError>,
) {
    for arg in &call.args {
        let variable = arg
            .value
            .unparenthesized()
            .as_name()
            .filter(|name| {
                scope
                    .resolve(name)
                    .is_some_and(|symbol| symbol.is_outer_variable() && !symbol.is_const())
            });
        match variable {
            Some(name) => settings.attribute_requests.push(AttributeRequest {
                attribute,
                variable: name.to_string(),
                span: arg.value.span,
            }),
            None => diagnostics.push(CompileError::new(
                DiagnosticCode::AttributeTargetNotCaptured,
                arg.value.span,
                format!(
                    "`{}` must name a local variable or parameter of the containing method",
                    attribute.method_name()
                ),
            )),
        }
    }
}

fn store_query_field(
    call: &FluentCall,
    scope: &MethodScope<'_>,
    settings: &mut FluentSettings,
    diagnostics: &mut Vec<CompileError>,
) {
    let Some(arg) = call.args.first() else {
        return;
    };
    let value = arg.value.unparenthesized();
    let name = match &value.kind {
        ExprKind::Name { name, type_args } if type_args.is_empty() => Some(name.as_str()),
        ExprKind::Member { target, name, .. } if matches!(target.kind, ExprKind::This) => {
            Some(name.as_str())
        }
        _ => None,
    };
    let is_field = name
        .and_then(|name| scope.resolve(name))
        .is_some_and(|symbol| symbol.kind == SymbolKind::Field);

    match name {
        Some(name) if is_field => settings.store_query_in_field = Some(name.to_string()),
        _ => diagnostics.push(CompileError::new(
            DiagnosticCode::StoreQueryTargetNotField,
            arg.value.span,
            "`WithStoreEntityQueryInField` must be given a field of the containing type"
                .to_string(),
        )),
    }
}

/// `Enum.Member` → `Member`.
fn enum_member(expr: &Expr, enum_name: &str) -> Option<String> {
    let dotted = expr.unparenthesized().as_dotted()?;
    let (owner, member) = dotted.rsplit_once('.')?;
    (owner == enum_name || owner.ends_with(&format!(".{}", enum_name)))
        .then(|| member.to_string())
}

/// `Enum.A | Enum.B` → `[A, B]`.
fn enum_flags(expr: &Expr, enum_name: &str) -> Option<Vec<String>> {
    match &expr.unparenthesized().kind {
        ExprKind::Binary {
            op: BinaryOp::BitOr,
            left,
            right,
        } => {
            let mut flags = enum_flags(left, enum_name)?;
            flags.extend(enum_flags(right, enum_name)?);
            Some(flags)
        }
        _ => enum_member(expr, enum_name).map(|member| vec![member]),
    }
}

fn bool_literal(expr: &Expr) -> Option<bool> {
    match &expr.kind {
        ExprKind::Literal(literal) if literal.kind == LiteralKind::Bool => {
            Some(literal.text == "true")
        }
        _ => None,
    }
}

fn not_constant(call: &FluentCall, value: &Expr) -> CompileError {
    CompileError::new(
        DiagnosticCode::ArgumentNotConstant,
        value.span,
        format!("arguments to `{}` must be compile-time constants", call.name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::scan_unit;
    use crate::semantic::TypeTable;
    use lambdajob_parser::parse_source;

    fn interpret_chain(body: &str) -> (FluentSettings, Vec<CompileError>) {
        let source = format!(
            r#"
            partial class S : SystemBase {{
                EntityQuery stored;
                void OnUpdate() {{
                    var data = new NativeArray<int>(4, Allocator.TempJob);
                    {}
                }}
            }}
            "#,
            body
        );
        let unit = parse_source(&source, 0).unwrap();
        let types = TypeTable::from_units([&unit]);
        let candidates = scan_unit(&unit);
        let candidate = &candidates[0];
        let scope = MethodScope::at(candidate.method, "S", &types, candidate.span());
        let mut diagnostics = Vec::new();
        let settings = interpret(
            &candidate.calls,
            &scope,
            &DescribeOptions::default(),
            &mut diagnostics,
        );
        (settings, diagnostics)
    }

    #[test]
    fn test_name_burst_and_filters() {
        let (settings, diagnostics) = interpret_chain(
            r#"Entities.WithName("Move").WithBurst(FloatMode.Fast, FloatPrecision.Low, true)
                .WithAll<Frozen>().WithNone<Dead>().ForEach((Entity e) => { }).Run();"#,
        );
        assert!(diagnostics.is_empty());
        assert_eq!(settings.name.unwrap().0, "Move");
        assert_eq!(settings.burst.float_mode.as_deref(), Some("Fast"));
        assert_eq!(settings.burst.float_precision.as_deref(), Some("Low"));
        assert!(settings.burst.synchronous);
        let kinds: Vec<_> = settings.filters.iter().map(|q| q.kind).collect();
        assert_eq!(kinds, vec![QueryKind::All, QueryKind::None]);
    }

    #[test]
    fn test_without_burst_and_structural_changes() {
        let (settings, _) = interpret_chain(
            "Entities.WithoutBurst().WithStructuralChanges().ForEach((Entity e) => { }).Run();",
        );
        assert!(!settings.burst.enabled);
        assert!(settings.structural_changes.is_some());
    }

    #[test]
    fn test_structural_changes_turn_burst_off() {
        let (settings, _) = interpret_chain(
            "Entities.WithBurst().WithStructuralChanges().ForEach((Entity e) => { }).Run();",
        );
        assert!(!settings.burst.enabled);
        assert_eq!(settings.burst.disabled_at, settings.structural_changes);
    }

    #[test]
    fn test_invalid_names() {
        for name in ["\"Bad Name\"", "\"a__b\"", "\"\""] {
            let chain = format!("Entities.WithName({}).ForEach((Entity e) => {{ }}).Run();", name);
            let (settings, diagnostics) = interpret_chain(&chain);
            assert!(settings.name.is_none());
            assert_eq!(diagnostics[0].code, DiagnosticCode::InvalidJobName, "{}", name);
        }
    }

    #[test]
    fn test_name_literal_forms() {
        let (settings, diagnostics) =
            interpret_chain(r#"Entities.WithName(@"Move").ForEach((Entity e) => { }).Run();"#);
        assert!(diagnostics.is_empty());
        assert_eq!(settings.name.unwrap().0, "Move");

        let (settings, diagnostics) =
            interpret_chain(r#"Entities.WithName("Mo\"ve\"").ForEach((Entity e) => { }).Run();"#);
        assert!(settings.name.is_none());
        assert_eq!(diagnostics[0].code, DiagnosticCode::InvalidJobName);
        assert!(diagnostics[0].message.contains("Mo\"ve\""), "{}", diagnostics[0].message);
    }

    #[test]
    fn test_non_constant_arguments() {
        let (_, diagnostics) = interpret_chain(
            r#"var mode = FloatMode.Fast;
               Entities.WithBurst(mode).WithName(name).ForEach((Entity e) => { }).Run();"#,
        );
        let codes: Vec<_> = diagnostics.iter().map(|d| d.code).collect();
        assert_eq!(
            codes,
            vec![
                DiagnosticCode::ArgumentNotConstant,
                DiagnosticCode::ArgumentNotConstant
            ]
        );
    }

    #[test]
    fn test_query_options_and_store_field() {
        let (settings, diagnostics) = interpret_chain(
            r#"Entities.WithEntityQueryOptions(EntityQueryOptions.IncludePrefab | EntityQueryOptions.IncludeDisabledEntities)
                .WithStoreEntityQueryInField(ref stored).ForEach((Entity e) => { }).Run();"#,
        );
        assert!(diagnostics.is_empty());
        assert_eq!(
            settings.entity_query_options,
            vec!["IncludePrefab", "IncludeDisabledEntities"]
        );
        assert_eq!(settings.store_query_in_field.as_deref(), Some("stored"));
    }

    #[test]
    fn test_store_into_local_is_rejected() {
        let (settings, diagnostics) = interpret_chain(
            "Entities.WithStoreEntityQueryInField(ref data).ForEach((Entity e) => { }).Run();",
        );
        assert!(settings.store_query_in_field.is_none());
        assert_eq!(diagnostics[0].code, DiagnosticCode::StoreQueryTargetNotField);
    }

    #[test]
    fn test_attribute_requests() {
        let (settings, diagnostics) = interpret_chain(
            "Entities.WithReadOnly(data).WithNativeDisableContainerSafetyRestriction(stored).ForEach((Entity e) => { }).Run();",
        );
        assert_eq!(settings.attribute_requests.len(), 1);
        assert_eq!(settings.attribute_requests[0].variable, "data");
        assert_eq!(
            diagnostics[0].code,
            DiagnosticCode::AttributeTargetNotCaptured
        );
    }

    #[test]
    fn test_playbacks_are_collected() {
        let (settings, _) = interpret_chain(
            "Entities.WithImmediatePlayback().WithDeferredPlaybackSystem<EndSimulationEntityCommandBufferSystem>().ForEach((EntityCommandBuffer ecb) => { }).Run();",
        );
        assert_eq!(settings.playbacks.len(), 2);
        assert_eq!(settings.playbacks[0].0, Playback::Immediate);
    }
}
