//! Lambda parameter classification.
//!
//! Each parameter becomes one [`LambdaParameterKind`] variant. The variant
//! decides what the generated job struct needs for it: a type-handle field,
//! how the value is read out of a chunk, how it is passed when the lambda
//! body is invoked, and how it is read and written back through the entity
//! manager when the job runs with structural changes.

use super::{AccessMode, Query, QueryKind};
use crate::error::{CompileError, DiagnosticCode, FatalShape};
use crate::scan::JobKind;
use crate::semantic::{
    ASPECT, BUFFER_ELEMENT_DATA, COMPONENT_DATA, SHARED_COMPONENT_DATA, TypeTable,
};
use lambdajob_ast::{Param, RefKind, Span, TypeRef};

/// Name of the `int` parameter receiving the entity's index in the query.
pub const ENTITY_IN_QUERY_INDEX: &str = "entityInQueryIndex";
/// Name of the `int` parameter receiving the worker thread index.
pub const NATIVE_THREAD_INDEX: &str = "nativeThreadIndex";

#[derive(Debug, Clone, PartialEq)]
pub enum LambdaParameterKind {
    /// Unmanaged component with data.
    Component { ty: TypeRef, access: AccessMode },
    /// Unmanaged component without fields.
    TagComponent { ty: TypeRef },
    /// Class component or host object.
    ManagedComponent { ty: TypeRef, access: AccessMode },
    SharedComponent { ty: TypeRef },
    /// Shared component holding references.
    SharedComponentManaged { ty: TypeRef },
    DynamicBuffer { element: TypeRef, access: AccessMode },
    Entity,
    Aspect { ty: TypeRef, access: AccessMode },
    EntityCommandBuffer,
    EntityInQueryIndex,
    NativeThreadIndex,
}

/// A classified lambda parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaParameter {
    pub name: String,
    pub ref_kind: RefKind,
    /// Type as written on the lambda.
    pub declared: TypeRef,
    pub kind: LambdaParameterKind,
    pub span: Span,
}

/// Field a parameter needs in the generated struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    pub attributes: Vec<&'static str>,
    pub ty: String,
    pub name: String,
    /// Expression assigning the field when the job is created, evaluated
    /// in the containing system.
    pub init: Option<String>,
}

impl LambdaParameter {
    /// Type this parameter adds to the entity query, if any.
    pub fn query_type(&self) -> Option<&TypeRef> {
        use LambdaParameterKind::*;
        match &self.kind {
            Component { ty, .. }
            | TagComponent { ty }
            | ManagedComponent { ty, .. }
            | SharedComponent { ty }
            | SharedComponentManaged { ty }
            | Aspect { ty, .. } => Some(ty),
            DynamicBuffer { element, .. } => Some(element),
            Entity | EntityCommandBuffer | EntityInQueryIndex | NativeThreadIndex => None,
        }
    }

    /// Access the parameter requests on its query type.
    pub fn access(&self) -> Option<AccessMode> {
        use LambdaParameterKind::*;
        match &self.kind {
            Component { access, .. }
            | ManagedComponent { access, .. }
            | DynamicBuffer { access, .. }
            | Aspect { access, .. } => Some(*access),
            TagComponent { .. } | SharedComponent { .. } | SharedComponentManaged { .. } => {
                Some(AccessMode::ReadOnly)
            }
            Entity | EntityCommandBuffer | EntityInQueryIndex | NativeThreadIndex => None,
        }
    }

    pub fn is_write(&self) -> bool {
        self.access() == Some(AccessMode::ReadWrite)
    }

    /// Query entry contributed by this parameter.
    pub fn query(&self) -> Option<Query> {
        Some(Query {
            ty: self.query_type()?.clone(),
            kind: QueryKind::All,
            access: self.access()?,
            span: self.span,
        })
    }

    pub fn is_managed(&self) -> bool {
        matches!(
            self.kind,
            LambdaParameterKind::ManagedComponent { .. }
                | LambdaParameterKind::SharedComponentManaged { .. }
        )
    }

    pub fn is_shared(&self) -> bool {
        matches!(
            self.kind,
            LambdaParameterKind::SharedComponent { .. }
                | LambdaParameterKind::SharedComponentManaged { .. }
        )
    }

    /// Whether reading this parameter needs the entity manager in the job.
    pub fn needs_entity_manager(&self) -> bool {
        self.is_managed()
    }

    /// Type-handle field in the generated struct.
    pub fn type_handle_field(&self) -> Option<StructField> {
        use LambdaParameterKind::*;
        let read_only = |access: AccessMode| {
            if access == AccessMode::ReadOnly {
                vec!["ReadOnly"]
            } else {
                Vec::new()
            }
        };
        let field = match &self.kind {
            Component { ty, access } | ManagedComponent { ty, access } => StructField {
                attributes: read_only(*access),
                ty: format!("ComponentTypeHandle<{}>", ty),
                name: format!("__{}_TypeHandle", ty.identifier()),
                init: Some(format!(
                    "GetComponentTypeHandle<{}>({})",
                    ty,
                    access.is_read_only()
                )),
            },
            SharedComponent { ty } | SharedComponentManaged { ty } => StructField {
                attributes: vec!["ReadOnly"],
                ty: format!("SharedComponentTypeHandle<{}>", ty),
                name: format!("__{}_SharedComponentTypeHandle", ty.identifier()),
                init: Some(format!("GetSharedComponentTypeHandle<{}>()", ty)),
            },
            DynamicBuffer { element, access } => StructField {
                attributes: read_only(*access),
                ty: format!("BufferTypeHandle<{}>", element),
                name: format!("__{}_BufferTypeHandle", element.identifier()),
                init: Some(format!(
                    "GetBufferTypeHandle<{}>({})",
                    element,
                    access.is_read_only()
                )),
            },
            Entity => StructField {
                attributes: vec!["ReadOnly"],
                ty: "EntityTypeHandle".to_string(),
                name: "__entityTypeHandle".to_string(),
                init: Some("GetEntityTypeHandle()".to_string()),
            },
            Aspect { ty, access } => StructField {
                attributes: Vec::new(),
                ty: format!("{}.TypeHandle", ty),
                name: format!("__{}_AspectTypeHandle", ty.identifier()),
                init: Some(format!(
                    "new {}.TypeHandle(ref CheckedStateRef, {})",
                    ty,
                    access.is_read_only()
                )),
            },
            EntityCommandBuffer => StructField {
                attributes: Vec::new(),
                ty: "EntityCommandBuffer".to_string(),
                name: "__entityCommandBuffer".to_string(),
                init: None,
            },
            EntityInQueryIndex => StructField {
                attributes: vec!["ReadOnly", "DeallocateOnJobCompletion"],
                ty: "NativeArray<int>".to_string(),
                name: "__chunkBaseEntityIndices".to_string(),
                init: None,
            },
            NativeThreadIndex => StructField {
                attributes: vec!["NativeSetThreadIndex"],
                ty: "int".to_string(),
                name: "__nativeThreadIndex".to_string(),
                init: None,
            },
            TagComponent { .. } => return None,
        };
        Some(field)
    }

    /// Statement run once per chunk before entities are visited.
    pub fn chunk_read(&self) -> Option<String> {
        use LambdaParameterKind::*;
        let local = self.local_name();
        let line = match &self.kind {
            Component { ty, access } => {
                let handle = format!("__{}_TypeHandle", ty.identifier());
                let ptr = match access {
                    AccessMode::ReadOnly => "GetUnsafeReadOnlyPtr",
                    AccessMode::ReadWrite => "GetUnsafePtr",
                };
                format!(
                    "var {local} = ({ty}*)chunk.GetNativeArray(ref {handle}).{ptr}();"
                )
            }
            TagComponent { ty } => format!("var {local} = default({ty});"),
            ManagedComponent { ty, .. } => format!(
                "var {local} = chunk.GetManagedComponentAccessor(ref __{}_TypeHandle, __entityManager);",
                ty.identifier()
            ),
            SharedComponent { ty } => format!(
                "var {local} = chunk.GetSharedComponent(__{}_SharedComponentTypeHandle);",
                ty.identifier()
            ),
            SharedComponentManaged { ty } => format!(
                "var {local} = chunk.GetSharedComponentManaged(__{}_SharedComponentTypeHandle, __entityManager);",
                ty.identifier()
            ),
            DynamicBuffer { element, .. } => format!(
                "var {local} = chunk.GetBufferAccessor(ref __{}_BufferTypeHandle);",
                element.identifier()
            ),
            Entity => format!(
                "var {local} = (Entity*)chunk.GetNativeArray(__entityTypeHandle).GetUnsafeReadOnlyPtr();"
            ),
            Aspect { ty, .. } => format!(
                "var {local} = __{}_AspectTypeHandle.Resolve(chunk);",
                ty.identifier()
            ),
            EntityInQueryIndex => {
                format!("var {local} = __chunkBaseEntityIndices[chunkIndex];")
            }
            EntityCommandBuffer | NativeThreadIndex => return None,
        };
        Some(line)
    }

    /// Statement run per entity before the lambda body is invoked.
    pub fn entity_read(&self) -> Option<String> {
        use LambdaParameterKind::*;
        let local = self.local_name();
        match &self.kind {
            ManagedComponent { .. } | DynamicBuffer { .. } | Aspect { .. } => Some(format!(
                "var {local}_Item = {local}[entityIndex];"
            )),
            _ => None,
        }
    }

    /// Argument text passed to the lambda body during chunk iteration.
    pub fn invocation_arg(&self) -> String {
        use LambdaParameterKind::*;
        let local = self.local_name();
        match &self.kind {
            Component { .. } | Entity => {
                format!("{}{local}[entityIndex]", self.ref_kind.prefix())
            }
            TagComponent { .. } | SharedComponent { .. } | SharedComponentManaged { .. } => {
                format!("{}{local}", self.ref_kind.prefix())
            }
            ManagedComponent { .. } | DynamicBuffer { .. } | Aspect { .. } => {
                format!("{}{local}_Item", self.ref_kind.prefix())
            }
            EntityInQueryIndex => format!("{local}++"),
            EntityCommandBuffer => "__entityCommandBuffer".to_string(),
            NativeThreadIndex => "__nativeThreadIndex".to_string(),
        }
    }

    /// Read through the entity manager when running with structural changes.
    pub fn structural_read(&self) -> Option<String> {
        use LambdaParameterKind::*;
        let local = self.local_name();
        let line = match &self.kind {
            Component { ty, .. } => {
                format!("var {local} = __entityManager.GetComponentData<{ty}>(__entity);")
            }
            TagComponent { ty } => format!("var {local} = default({ty});"),
            ManagedComponent { ty, .. } => {
                format!("var {local} = __entityManager.GetComponentObject<{ty}>(__entity);")
            }
            SharedComponent { ty } | SharedComponentManaged { ty } => format!(
                "var {local} = __entityManager.GetSharedComponentManaged<{ty}>(__entity);"
            ),
            DynamicBuffer { element, .. } => {
                format!("var {local} = __entityManager.GetBuffer<{element}>(__entity);")
            }
            Aspect { ty, .. } => {
                format!("var {local} = __entityManager.GetAspect<{ty}>(__entity);")
            }
            Entity | EntityCommandBuffer | EntityInQueryIndex | NativeThreadIndex => return None,
        };
        Some(line)
    }

    /// Write-back through the entity manager after the body ran.
    pub fn structural_write(&self) -> Option<String> {
        match &self.kind {
            LambdaParameterKind::Component {
                access: AccessMode::ReadWrite,
                ..
            } => Some(format!(
                "__entityManager.SetComponentData(__entity, {});",
                self.local_name()
            )),
            _ => None,
        }
    }

    /// Argument text passed to the lambda body when running with structural
    /// changes.
    pub fn structural_arg(&self) -> String {
        use LambdaParameterKind::*;
        match &self.kind {
            Entity => format!("{}__entity", self.ref_kind.prefix()),
            EntityInQueryIndex => "__entityIndex".to_string(),
            NativeThreadIndex => "0".to_string(),
            EntityCommandBuffer => "__entityCommandBuffer".to_string(),
            _ => format!("{}{}", self.ref_kind.prefix(), self.local_name()),
        }
    }

    /// Parameter as declared on the generated body method.
    pub fn method_param(&self) -> String {
        format!("{}{} {}", self.ref_kind.prefix(), self.declared, self.name)
    }

    fn local_name(&self) -> String {
        match self.kind {
            LambdaParameterKind::EntityInQueryIndex => "__entityInQueryIndex".to_string(),
            _ => format!("__{}", self.name),
        }
    }
}

/// Parameters of one lambda plus the non-fatal diagnostics found while
/// classifying them.
#[derive(Debug, Default)]
pub struct Classified {
    pub params: Vec<LambdaParameter>,
    pub diagnostics: Vec<CompileError>,
}

/// Classify every lambda parameter.
///
/// Shapes the job model cannot represent at all abort the description; the
/// errors of every such parameter are reported together.
pub fn classify(
    params: &[Param],
    kind: JobKind,
    types: &TypeTable,
) -> Result<Classified, FatalShape> {
    let mut classified = Classified::default();
    let mut fatal = Vec::new();

    if kind == JobKind::JobWithCode && !params.is_empty() {
        return Err(CompileError::new(
            DiagnosticCode::UnsupportedParameter,
            params[0].span,
            "`Job.WithCode` lambdas cannot take parameters".to_string(),
        )
        .into());
    }

    for param in params {
        match classify_one(param, types, &mut classified.diagnostics) {
            Ok(parameter) => classified.params.push(parameter),
            Err(error) => fatal.push(error),
        }
    }

    if fatal.is_empty() {
        Ok(classified)
    } else {
        Err(FatalShape { errors: fatal })
    }
}

fn classify_one(
    param: &Param,
    types: &TypeTable,
    diagnostics: &mut Vec<CompileError>,
) -> Result<LambdaParameter, CompileError> {
    use LambdaParameterKind::*;

    let Some(ty) = &param.ty else {
        return Err(CompileError::new(
            DiagnosticCode::UnsupportedParameter,
            param.span,
            format!("lambda parameter `{}` must declare its type", param.name),
        ));
    };
    if param.ref_kind == RefKind::Out || ty.array_rank > 0 || ty.nullable {
        return Err(CompileError::new(
            DiagnosticCode::UnsupportedParameter,
            param.span,
            format!("lambda parameter `{}` has an unsupported shape `{}`", param.name, param),
        ));
    }

    let make = |kind| LambdaParameter {
        name: param.name.clone(),
        ref_kind: param.ref_kind,
        declared: ty.clone(),
        kind,
        span: param.span,
    };
    let access = match param.ref_kind {
        RefKind::Ref => AccessMode::ReadWrite,
        _ => AccessMode::ReadOnly,
    };

    if ty.name == "EntityCommandBuffer.ParallelWriter" {
        return Err(CompileError::new(
            DiagnosticCode::ParallelWriterParameter,
            param.span,
            "`EntityCommandBuffer.ParallelWriter` cannot be a lambda parameter".to_string(),
        )
        .with_note(
            "take an `EntityCommandBuffer` and choose a playback system with `WithDeferredPlaybackSystem<T>()`"
                .to_string(),
        ));
    }

    if types.implements(ty, SHARED_COMPONENT_DATA) {
        if param.ref_kind == RefKind::Ref {
            diagnostics.push(CompileError::new(
                DiagnosticCode::SharedComponentByRef,
                param.span,
                format!(
                    "shared component `{}` cannot be received by `ref`; use `in` or by value",
                    ty
                ),
            ));
        }
        let managed = types.is_reference_type(ty) || types.has_managed_fields(ty);
        return Ok(make(if managed {
            SharedComponentManaged { ty: ty.clone() }
        } else {
            SharedComponent { ty: ty.clone() }
        }));
    }

    if ty.short_name() == "DynamicBuffer" {
        let element = match ty.args.as_slice() {
            [element] if element.args.is_empty() => element.clone(),
            _ => {
                return Err(CompileError::new(
                    DiagnosticCode::GenericParameterType,
                    param.span,
                    format!("buffer parameter `{}` must name a non-generic element type", param.name),
                ));
            }
        };
        let access = if param.ref_kind == RefKind::In {
            AccessMode::ReadOnly
        } else {
            AccessMode::ReadWrite
        };
        return Ok(make(DynamicBuffer { element, access }));
    }

    if ty.name == "Entity" {
        return Ok(make(Entity));
    }

    if ty.name == "int" {
        return match param.name.as_str() {
            ENTITY_IN_QUERY_INDEX => Ok(make(EntityInQueryIndex)),
            NATIVE_THREAD_INDEX => Ok(make(NativeThreadIndex)),
            other => Err(CompileError::new(
                DiagnosticCode::UnsupportedIntParameter,
                param.span,
                format!(
                    "`int` parameter `{}` is not supported; only `{}` and `{}` are",
                    other, ENTITY_IN_QUERY_INDEX, NATIVE_THREAD_INDEX
                ),
            )),
        };
    }

    if !ty.args.is_empty() {
        return Err(CompileError::new(
            DiagnosticCode::GenericParameterType,
            param.span,
            format!("generic type `{}` cannot be a lambda parameter", ty),
        ));
    }

    if types.is_value_type(ty) {
        if ty.name == "EntityCommandBuffer" {
            return Ok(make(EntityCommandBuffer));
        }
        if types.implements(ty, COMPONENT_DATA) {
            if types.is_tag(ty) {
                return Ok(make(TagComponent { ty: ty.clone() }));
            }
            return Ok(make(Component {
                ty: ty.clone(),
                access,
            }));
        }
        if types.implements(ty, ASPECT) {
            let access = if param.ref_kind == RefKind::In {
                AccessMode::ReadOnly
            } else {
                AccessMode::ReadWrite
            };
            return Ok(make(Aspect {
                ty: ty.clone(),
                access,
            }));
        }
        if types.implements(ty, BUFFER_ELEMENT_DATA) {
            return Err(CompileError::new(
                DiagnosticCode::BufferElementParameter,
                param.span,
                format!(
                    "buffer element `{}` cannot be received directly; use `DynamicBuffer<{}>`",
                    ty, ty
                ),
            ));
        }
        return Err(not_a_component(param, ty));
    }

    if types.implements(ty, COMPONENT_DATA) || types.is_host_object(ty) {
        if param.ref_kind == RefKind::Ref {
            diagnostics.push(CompileError::new(
                DiagnosticCode::ManagedComponentByRef,
                param.span,
                format!("managed component `{}` cannot be received by `ref`", ty),
            ));
        }
        let access = if param.ref_kind == RefKind::In {
            AccessMode::ReadOnly
        } else {
            AccessMode::ReadWrite
        };
        return Ok(make(ManagedComponent {
            ty: ty.clone(),
            access,
        }));
    }

    Err(not_a_component(param, ty))
}

fn not_a_component(param: &Param, ty: &TypeRef) -> CompileError {
    CompileError::new(
        DiagnosticCode::ParameterNotComponent,
        param.span,
        format!(
            "parameter `{}` of type `{}` is not a component, buffer or aspect",
            param.name, ty
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambdajob_ast::{ExprKind, StmtKind, walk_block};
    use lambdajob_parser::parse_source;

    const TYPES: &str = r#"
        struct Translation : IComponentData { public float3 Value; }
        struct Velocity : IComponentData { public float3 Value; }
        struct Frozen : IComponentData { }
        struct Group : ISharedComponentData { public int Id; }
        struct Label : ISharedComponentData { public string Text; }
        struct Waypoint : IBufferElementData { public float3 Value; }
        struct MoveAspect : IAspect { }
        class Settings : IComponentData { public float Speed; }
    "#;

    /// Classify the parameters of `lambda` as written in a ForEach.
    fn classify_lambda(lambda: &str) -> Result<Classified, FatalShape> {
        let source = format!(
            "{} partial class S : SystemBase {{ void OnUpdate() {{ Entities.ForEach({}).Run(); }} }}",
            TYPES, lambda
        );
        let unit = parse_source(&source, 0).unwrap();
        let types = TypeTable::from_units([&unit]);
        let method = unit.types.last().unwrap().methods().next().unwrap();

        let mut params = None;
        walk_block(method.body.as_ref().unwrap(), &mut |expr| {
            if let ExprKind::Lambda(lambda) = &expr.kind {
                params = Some(lambda.params.clone());
            }
        });
        assert!(matches!(
            method.body.as_ref().unwrap().stmts[0].kind,
            StmtKind::Expr(_)
        ));
        classify(&params.unwrap(), JobKind::EntitiesForEach, &types)
    }

    fn kinds(result: &Classified) -> Vec<&LambdaParameterKind> {
        result.params.iter().map(|p| &p.kind).collect()
    }

    #[test]
    fn test_component_access_follows_modifier() {
        let result = classify_lambda("(ref Translation t, in Velocity v) => { }").unwrap();
        assert!(result.diagnostics.is_empty());
        assert!(result.params[0].is_write());
        assert!(!result.params[1].is_write());
        assert_eq!(result.params[0].query().unwrap().kind, QueryKind::All);
    }

    #[test]
    fn test_by_value_component_reads() {
        let result = classify_lambda("(Velocity v) => { }").unwrap();
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.params[0].access(), Some(AccessMode::ReadOnly));
        assert_eq!(result.params[0].invocation_arg(), "__v[entityIndex]");
    }

    #[test]
    fn test_framework_kinds() {
        let result = classify_lambda(
            "(Entity e, int entityInQueryIndex, int nativeThreadIndex, EntityCommandBuffer ecb, DynamicBuffer<Waypoint> path) => { }",
        )
        .unwrap();
        let kinds = kinds(&result);
        assert_eq!(kinds[0], &LambdaParameterKind::Entity);
        assert_eq!(kinds[1], &LambdaParameterKind::EntityInQueryIndex);
        assert_eq!(kinds[2], &LambdaParameterKind::NativeThreadIndex);
        assert_eq!(kinds[3], &LambdaParameterKind::EntityCommandBuffer);
        assert!(matches!(
            kinds[4],
            LambdaParameterKind::DynamicBuffer {
                access: AccessMode::ReadWrite,
                ..
            }
        ));
    }

    #[test]
    fn test_tag_shared_aspect_and_managed() {
        let result = classify_lambda(
            "(in Frozen f, in Group g, Label l, MoveAspect a, Settings s) => { }",
        )
        .unwrap();
        let kinds = kinds(&result);
        assert!(matches!(kinds[0], LambdaParameterKind::TagComponent { .. }));
        assert!(matches!(kinds[1], LambdaParameterKind::SharedComponent { .. }));
        assert!(matches!(kinds[2], LambdaParameterKind::SharedComponentManaged { .. }));
        assert!(matches!(kinds[3], LambdaParameterKind::Aspect { .. }));
        assert!(matches!(kinds[4], LambdaParameterKind::ManagedComponent { .. }));
    }

    #[test]
    fn test_ref_shared_and_ref_managed_are_errors() {
        let result = classify_lambda("(ref Group g, ref Settings s) => { }").unwrap();
        let codes: Vec<_> = result.diagnostics.iter().map(|d| d.code).collect();
        assert_eq!(
            codes,
            vec![
                DiagnosticCode::SharedComponentByRef,
                DiagnosticCode::ManagedComponentByRef
            ]
        );
    }

    #[test]
    fn test_unsupported_shapes_are_fatal() {
        let fatal = classify_lambda("(int index, ref Waypoint w, float speed) => { }").unwrap_err();
        let codes: Vec<_> = fatal.errors.iter().map(|d| d.code).collect();
        assert_eq!(
            codes,
            vec![
                DiagnosticCode::UnsupportedIntParameter,
                DiagnosticCode::BufferElementParameter,
                DiagnosticCode::ParameterNotComponent,
            ]
        );
    }

    #[test]
    fn test_parallel_writer_and_generic_are_fatal() {
        let fatal = classify_lambda("(EntityCommandBuffer.ParallelWriter w) => { }").unwrap_err();
        assert_eq!(fatal.errors[0].code, DiagnosticCode::ParallelWriterParameter);

        let fatal = classify_lambda("(ref NativeArray<int> values) => { }").unwrap_err();
        assert_eq!(fatal.errors[0].code, DiagnosticCode::GenericParameterType);
    }

    #[test]
    fn test_emission_fragments() {
        let result = classify_lambda("(ref Translation t, in Velocity v, Entity e) => { }").unwrap();
        let translation = &result.params[0];
        let field = translation.type_handle_field().unwrap();
        assert_eq!(field.name, "__Translation_TypeHandle");
        assert!(field.attributes.is_empty());
        assert_eq!(
            field.init.as_deref(),
            Some("GetComponentTypeHandle<Translation>(false)")
        );
        assert_eq!(translation.invocation_arg(), "ref __t[entityIndex]");
        assert_eq!(
            translation.structural_write().as_deref(),
            Some("__entityManager.SetComponentData(__entity, __t);")
        );

        let velocity = &result.params[1];
        assert_eq!(velocity.type_handle_field().unwrap().attributes, vec!["ReadOnly"]);
        assert!(velocity.chunk_read().unwrap().contains("GetUnsafeReadOnlyPtr"));
        assert!(velocity.structural_write().is_none());

        assert_eq!(result.params[2].structural_arg(), "__entity");
    }
}
