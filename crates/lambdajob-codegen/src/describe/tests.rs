use super::*;
use crate::scan::scan_unit;
use lambdajob_parser::parse_source;

const PRELUDE: &str = r#"
    struct Translation : IComponentData { public float3 Value; }
    struct Velocity : IComponentData { public float3 Value; }
    struct Group : ISharedComponentData { public int Id; }
    class Settings : IComponentData { public float Speed; }
"#;

fn build_all(system_body: &str) -> Vec<Result<JobDescription, FatalShape>> {
    let source = format!("{}\npartial class S : SystemBase {{ {} }}", PRELUDE, system_body);
    let unit = parse_source(&source, 0).unwrap();
    let types = TypeTable::from_units([&unit]);
    scan_unit(&unit)
        .iter()
        .map(|candidate| build(candidate, &types, &DescribeOptions::default()))
        .collect()
}

fn build_one(system_body: &str) -> Result<JobDescription, FatalShape> {
    build_all(system_body).remove(0)
}

fn codes(description: &JobDescription) -> Vec<DiagnosticCode> {
    description.diagnostics.iter().map(|d| d.code).collect()
}

fn fatal_codes(fatal: &FatalShape) -> Vec<DiagnosticCode> {
    fatal.errors.iter().map(|d| d.code).collect()
}

#[test]
fn test_scheduled_parallel_for_each() {
    let description = build_one(
        r#"void OnUpdate() {
            Entities.ForEach((ref Translation t, in Velocity v) => { t.Value += v.Value; }).ScheduleParallel();
        }"#,
    )
    .unwrap();

    assert!(description.success);
    assert!(description.captures.is_empty());
    assert!(codes(&description).is_empty());
    assert_eq!(description.schedule.mode, ScheduleMode::ScheduleParallel);
    assert!(description.params[0].is_write());
    assert!(!description.params[1].is_write());
    assert!(description.burst.enabled);
    assert!(description.name.starts_with("S_"));
    assert!(description.name.ends_with("_LambdaJob_0"));
}

#[test]
fn test_derived_names_are_distinct() {
    let descriptions = build_all(
        r#"void OnUpdate() {
            Entities.ForEach((ref Translation t) => { }).Schedule();
            Entities.ForEach((ref Velocity v) => { }).Schedule();
        }"#,
    );
    let first = descriptions[0].as_ref().unwrap();
    let second = descriptions[1].as_ref().unwrap();
    assert_ne!(first.name, second.name);
    assert!(!first.has_explicit_name);
    assert_eq!(first.name[..first.name.len() - 1], second.name[..second.name.len() - 1]);
}

#[test]
fn test_derived_name_hash() {
    let name = derived_name("Mover", "void OnUpdate()", 3);
    assert!(name.starts_with("Mover_"));
    assert!(name.ends_with("_LambdaJob_3"));
    let hash = &name["Mover_".len().."Mover_".len() + 8];
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(name, derived_name("Mover", "void OnUpdate()", 3));
    assert_ne!(name, derived_name("Mover", "void OnUpdate(float)", 3));
}

#[test]
fn test_explicit_name() {
    let description = build_one(
        r#"void OnUpdate() {
            Entities.WithName("Move").ForEach((ref Translation t) => { }).Run();
        }"#,
    )
    .unwrap();
    assert!(description.has_explicit_name);
    assert_eq!(description.struct_name(), "Move_Job");
    assert_eq!(description.execute_method_name(), "Move_Execute");
    assert_eq!(description.query_field_name(), "__query_Move");
}

#[test]
fn test_job_name_validation() {
    assert!(is_valid_job_name("Move_Things2"));
    assert!(!is_valid_job_name(""));
    assert!(!is_valid_job_name("2Move"));
    assert!(!is_valid_job_name("Move__Things"));
    assert!(!is_valid_job_name("Move Things"));
}

#[test]
fn test_delegate_variable_is_fatal() {
    let fatal = build_one(
        r#"void OnUpdate() {
            var body = (ref Translation t) => { };
            Entities.ForEach(body).Run();
        }"#,
    )
    .unwrap_err();
    assert_eq!(fatal_codes(&fatal), vec![DiagnosticCode::NotInlineLambda]);
}

#[test]
fn test_missing_terminal_is_fatal() {
    let fatal = build_one(
        r#"void OnUpdate() {
            Entities.ForEach((ref Translation t) => { });
        }"#,
    )
    .unwrap_err();
    assert_eq!(fatal_codes(&fatal), vec![DiagnosticCode::MissingTerminal]);
}

#[test]
fn test_body_shapes_are_fatal() {
    let fatal = build_one(
        r#"void OnUpdate() {
            Entities.ForEach((ref Translation t) => {
                int Twice(int x) { return x * 2; }
                Job.WithCode(() => { }).Run();
                var f = () => 1;
            }).Run();
        }"#,
    )
    .unwrap_err();
    assert_eq!(
        fatal_codes(&fatal),
        vec![
            DiagnosticCode::LocalFunctionInLambda,
            DiagnosticCode::NestedLambdaJob,
            DiagnosticCode::AnonymousFunctionInLambda,
        ]
    );
}

#[test]
fn test_generic_containers_are_fatal() {
    let source = format!(
        "{}\npartial class G<T> : SystemBase {{ void OnUpdate() {{ Entities.ForEach((ref Translation t) => {{ }}).Run(); }} }}\n\
         partial class H : SystemBase {{ void Tick<T>() {{ Entities.ForEach((ref Translation t) => {{ }}).Run(); }} }}",
        PRELUDE
    );
    let unit = parse_source(&source, 0).unwrap();
    let types = TypeTable::from_units([&unit]);
    let candidates = scan_unit(&unit);
    let first = build(&candidates[0], &types, &DescribeOptions::default()).unwrap_err();
    let second = build(&candidates[1], &types, &DescribeOptions::default()).unwrap_err();
    assert_eq!(fatal_codes(&first), vec![DiagnosticCode::GenericContainingType]);
    assert_eq!(fatal_codes(&second), vec![DiagnosticCode::GenericContainingMethod]);
}

#[test]
fn test_command_buffer_without_playback() {
    let description = build_one(
        r#"void OnUpdate() {
            Entities.ForEach((Entity e, EntityCommandBuffer ecb) => { ecb.DestroyEntity(e); }).Schedule();
        }"#,
    )
    .unwrap();
    assert_eq!(codes(&description), vec![DiagnosticCode::MissingPlayback]);
    assert!(!description.success);
}

#[test]
fn test_immediate_playback_requires_run() {
    let description = build_one(
        r#"void OnUpdate() {
            Entities.WithImmediatePlayback().ForEach((Entity e, EntityCommandBuffer ecb) => { }).Schedule();
        }"#,
    )
    .unwrap();
    assert_eq!(codes(&description), vec![DiagnosticCode::ImmediatePlaybackWithoutRun]);

    let description = build_one(
        r#"void OnUpdate() {
            Entities.WithImmediatePlayback().ForEach((Entity e, EntityCommandBuffer ecb) => { }).Run();
        }"#,
    )
    .unwrap();
    assert!(description.success);
    assert_eq!(description.playback(), Some(&Playback::Immediate));
}

#[test]
fn test_multiple_buffers_and_playbacks() {
    let description = build_one(
        r#"void OnUpdate() {
            Entities
                .WithImmediatePlayback()
                .WithDeferredPlaybackSystem<EndSimulationEntityCommandBufferSystem>()
                .ForEach((EntityCommandBuffer a, EntityCommandBuffer b) => { })
                .Run();
        }"#,
    )
    .unwrap();
    assert_eq!(
        codes(&description),
        vec![DiagnosticCode::MultipleCommandBuffers, DiagnosticCode::MultiplePlaybacks]
    );
}

#[test]
fn test_managed_and_shared_need_main_thread() {
    let description = build_one(
        r#"void OnUpdate() {
            Entities.ForEach((Settings s, in Group g) => { }).Run();
        }"#,
    )
    .unwrap();
    assert_eq!(
        codes(&description),
        vec![
            DiagnosticCode::ManagedComponentNotAllowed,
            DiagnosticCode::ManagedComponentNotAllowed
        ]
    );

    let description = build_one(
        r#"void OnUpdate() {
            Entities.WithoutBurst().ForEach((Settings s, in Group g) => { }).Run();
        }"#,
    )
    .unwrap();
    assert!(description.success, "{:?}", codes(&description));
}

#[test]
fn test_entity_query_merges_params_and_filters() {
    let description = build_one(
        r#"void OnUpdate() {
            Entities
                .WithAll<Translation>()
                .WithNone<Group>()
                .WithChangeFilter<Velocity>()
                .ForEach((ref Translation t) => { })
                .Schedule();
        }"#,
    )
    .unwrap();
    let query = description.entity_query();
    assert_eq!(query.all.len(), 2);
    assert_eq!(query.all[0].0.name, "Translation");
    assert_eq!(query.all[0].1, AccessMode::ReadWrite);
    assert_eq!(query.all[1].0.name, "Velocity");
    assert_eq!(query.all[1].1, AccessMode::ReadOnly);
    assert_eq!(query.none[0].name, "Group");
    assert_eq!(query.change_filter[0].name, "Velocity");
    assert_eq!(query.types().len(), 3);
}

#[test]
fn test_expression_bodied_lambda() {
    let description = build_one(
        r#"void OnUpdate() {
            Entities.ForEach((ref Translation t) => t.Value = default).Run();
        }"#,
    )
    .unwrap();
    assert_eq!(description.body.stmts.len(), 1);
    assert!(matches!(description.body.stmts[0].kind, StmtKind::Expr(_)));
}
