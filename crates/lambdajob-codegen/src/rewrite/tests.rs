use super::*;
use crate::describe::{DescribeOptions, build};
use crate::scan::scan_unit;
use crate::semantic::TypeTable;
use lambdajob_ast::print_block;
use lambdajob_parser::parse_source;

const PRELUDE: &str = r#"
    struct Foo : IComponentData { public float Value; }
    struct Bar : IComponentData { public float Value; }
    struct Waypoint : IBufferElementData { public float Value; }
"#;

fn rewritten(system_body: &str) -> JobDescription {
    let source = format!("{}\npartial class S : SystemBase {{ {} }}", PRELUDE, system_body);
    let unit = parse_source(&source, 0).unwrap();
    let types = TypeTable::from_units([&unit]);
    let candidates = scan_unit(&unit);
    let candidate = &candidates[0];
    let mut description = build(candidate, &types, &DescribeOptions::default()).unwrap();
    let scope = MethodScope::at(
        candidate.method,
        &candidate.containing_type().name,
        &types,
        candidate.span(),
    );
    rewrite(&mut description, &scope, None, &RewriteOptions::default());
    description
}

fn body_text(description: &JobDescription) -> String {
    print_block(&description.rewritten.as_ref().unwrap().body, 0)
}

fn codes(description: &JobDescription) -> Vec<DiagnosticCode> {
    description.diagnostics.iter().map(|d| d.code).collect()
}

#[test]
fn test_get_component_becomes_lookup_index() {
    let description = rewritten(
        r#"void OnUpdate() {
            Entities.ForEach((Entity e, ref Foo f) => {
                f.Value = GetComponent<Bar>(e).Value;
            }).ScheduleParallel();
        }"#,
    );
    let text = body_text(&description);
    assert!(text.contains("f.Value = __Bar_ComponentLookup[e].Value;"), "{}", text);

    let lookups = &description.rewritten.as_ref().unwrap().lookups;
    let field = lookups.get(LookupKind::Component, &TypeRef::simple("Bar", Span::zero(0)));
    assert_eq!(field.unwrap().access(), AccessMode::ReadOnly);
    assert!(description.diagnostics.is_empty());
}

#[test]
fn test_set_component_promotes_field() {
    let description = rewritten(
        r#"void OnUpdate() {
            Entities.ForEach((Entity e) => {
                var value = GetComponent<Bar>(e);
                SetComponent<Bar>(e, value);
                var again = SystemAPI.HasComponent<Bar>(e);
            }).Schedule();
        }"#,
    );
    let text = body_text(&description);
    assert!(text.contains("__Bar_ComponentLookup[e] = value;"), "{}", text);
    assert!(text.contains("__Bar_ComponentLookup.HasComponent(e)"), "{}", text);

    let lookups = &description.rewritten.as_ref().unwrap().lookups;
    assert_eq!(lookups.len(), 1);
    let field = lookups.iter().next().unwrap();
    assert_eq!(field.access(), AccessMode::ReadWrite);
}

#[test]
fn test_get_buffer_read_only_flag() {
    let description = rewritten(
        r#"void OnUpdate() {
            Entities.ForEach((Entity e) => {
                var path = GetBuffer<Waypoint>(e, true);
            }).Schedule();
        }"#,
    );
    let text = body_text(&description);
    assert!(text.contains("var path = __Waypoint_BufferLookup[e];"), "{}", text);
    let field = description.rewritten.as_ref().unwrap().lookups.iter().next().unwrap();
    assert_eq!(field.access(), AccessMode::ReadOnly);
}

#[test]
fn test_dynamic_read_only_flag_is_rejected() {
    let description = rewritten(
        r#"void OnUpdate() {
            bool readOnly = true;
            Entities.ForEach((Entity e) => {
                var lookup = GetComponentLookup<Bar>(readOnly);
            }).WithoutBurst().Run();
        }"#,
    );
    assert!(codes(&description).contains(&DiagnosticCode::ReadOnlyFlagNotLiteral));
}

#[test]
fn test_aliasing_permitted_under_run() {
    let description = rewritten(
        r#"void OnUpdate() {
            Entities.ForEach((Entity e, ref Foo f) => { var bar = GetComponent<Foo>(e); }).Run();
        }"#,
    );
    assert!(codes(&description).is_empty(), "{:?}", codes(&description));
}

#[test]
fn test_aliasing_rejected_under_schedule_parallel() {
    let description = rewritten(
        r#"void OnUpdate() {
            Entities.ForEach((Entity e, ref Foo f) => { var bar = GetComponent<Foo>(e); }).ScheduleParallel();
        }"#,
    );
    assert_eq!(codes(&description), vec![DiagnosticCode::LookupAliasesWrittenParameter]);
}

#[test]
fn test_write_lookup_on_parameter_type() {
    let description = rewritten(
        r#"void OnUpdate() {
            Entities.ForEach((Entity e, in Foo f) => { SetComponent(e, new Foo()); }).Schedule();
        }"#,
    );
    assert_eq!(codes(&description), vec![DiagnosticCode::WriteLookupAliasesParameter]);
}

#[test]
fn test_write_lookup_under_schedule_parallel() {
    let description = rewritten(
        r#"void OnUpdate() {
            Entities.ForEach((Entity e) => { SetComponent<Bar>(e, default); }).ScheduleParallel();
        }"#,
    );
    assert_eq!(codes(&description), vec![DiagnosticCode::WriteLookupInParallel]);
}

#[test]
fn test_this_members_and_constants() {
    let description = rewritten(
        r#"float speed;
        void Tick() { }
        void OnUpdate() {
            const float k = 2;
            Entities.ForEach((ref Foo f) => {
                f.Value *= speed * k;
                Tick();
                this.Tick();
            }).WithoutBurst().Run();
        }"#,
    );
    let text = body_text(&description);
    assert!(text.contains("f.Value *= __this.speed * 2f;"), "{}", text);
    assert_eq!(text.matches("__this.Tick();").count(), 2, "{}", text);
}

#[test]
fn test_structural_change_requires_opt_in() {
    let description = rewritten(
        r#"void OnUpdate() {
            Entities.ForEach((Entity e) => { EntityManager.DestroyEntity(e); }).WithoutBurst().Run();
        }"#,
    );
    assert_eq!(codes(&description), vec![DiagnosticCode::StructuralChangeNotAllowed]);

    let description = rewritten(
        r#"void OnUpdate() {
            Entities.WithStructuralChanges().ForEach((Entity e) => { EntityManager.DestroyEntity(e); }).WithoutBurst().Run();
        }"#,
    );
    assert!(codes(&description).is_empty());
    let rewritten_body = description.rewritten.as_ref().unwrap();
    assert!(rewritten_body.uses_entity_manager);
    assert!(body_text(&description).contains("__entityManager.DestroyEntity(e);"));
}

#[test]
fn test_user_method_named_like_patchable_is_kept() {
    let description = rewritten(
        r#"Foo GetComponent(Entity e) { return default; }
        void OnUpdate() {
            Entities.ForEach((Entity e) => { var foo = GetComponent(e); }).WithoutBurst().Run();
        }"#,
    );
    let rewritten_body = description.rewritten.as_ref().unwrap();
    assert!(rewritten_body.lookups.is_empty());
    assert!(body_text(&description).contains("__this.GetComponent(e)"));
}

#[test]
fn test_untyped_set_component_infers_from_lambda_parameter() {
    let description = rewritten(
        r#"void OnUpdate() {
            Entities.ForEach((Entity e, in Foo f) => { SetComponent(e, f); }).ScheduleParallel();
        }"#,
    );
    assert_eq!(
        codes(&description),
        vec![
            DiagnosticCode::WriteLookupInParallel,
            DiagnosticCode::WriteLookupAliasesParameter
        ]
    );
    let text = body_text(&description);
    assert!(text.contains("__Foo_ComponentLookup[e] = f;"), "{}", text);
    assert_eq!(description.rewritten.as_ref().unwrap().lookups.len(), 1);
}

#[test]
fn test_untyped_set_component_infers_from_body_local() {
    let description = rewritten(
        r#"void OnUpdate() {
            Entities.ForEach((Entity e) => {
                var v = new Bar();
                SetComponent(e, v);
            }).Schedule();
        }"#,
    );
    assert!(codes(&description).is_empty(), "{:?}", codes(&description));
    let text = body_text(&description);
    assert!(text.contains("__Bar_ComponentLookup[e] = v;"), "{}", text);
    let field = description.rewritten.as_ref().unwrap().lookups.iter().next().unwrap();
    assert_eq!(field.access(), AccessMode::ReadWrite);
}

#[test]
fn test_uninferable_set_component_is_reported() {
    let description = rewritten(
        r#"void OnUpdate() {
            Entities.ForEach((Entity e) => { SetComponent(e, default); }).Schedule();
        }"#,
    );
    assert_eq!(codes(&description), vec![DiagnosticCode::UninferredTypeArgument]);
}
