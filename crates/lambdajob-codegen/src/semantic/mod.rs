//! Minimal semantic model over parsed compilation units.
//!
//! The pass only needs two questions answered: "what does this identifier
//! resolve to" ([`scope`]) and "what kind of type is this" ([`TypeTable`]).
//! The table holds every user-declared type plus the framework types lambda
//! jobs are written against.

pub mod scope;

pub use scope::{MethodScope, Symbol, SymbolKind};

use indexmap::IndexMap;
use lambdajob_ast::{CompilationUnit, TypeDecl, TypeDeclKind, TypeRef};

/// Marker interface of unmanaged and managed components.
pub const COMPONENT_DATA: &str = "IComponentData";
/// Marker interface of shared components.
pub const SHARED_COMPONENT_DATA: &str = "ISharedComponentData";
/// Marker interface of dynamic buffer elements.
pub const BUFFER_ELEMENT_DATA: &str = "IBufferElementData";
/// Marker interface of aspects.
pub const ASPECT: &str = "IAspect";
/// Marker interface of components with an enabled bit.
pub const ENABLEABLE_COMPONENT: &str = "IEnableableComponent";

/// Whether a type is copied by value or referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Value,
    Reference,
    Interface,
}

/// What the table knows about one type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    /// Short name (`Translation`).
    pub name: String,
    pub category: TypeCategory,
    /// Base class and interfaces, by short name.
    pub bases: Vec<String>,
    pub type_params: usize,
    /// Instance field names and types.
    pub fields: Vec<(String, TypeRef)>,
    /// Names of static fields and constants.
    pub static_fields: Vec<String>,
    /// Instance method names.
    pub methods: Vec<String>,
    /// Static method names.
    pub static_methods: Vec<String>,
    /// Declared by the user rather than the framework.
    pub user_declared: bool,
}

impl TypeInfo {
    fn builtin(name: &str, category: TypeCategory, bases: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            category,
            bases: bases.iter().map(|b| b.to_string()).collect(),
            type_params: 0,
            fields: Vec::new(),
            static_fields: Vec::new(),
            methods: Vec::new(),
            static_methods: Vec::new(),
            user_declared: false,
        }
    }

    fn generic(mut self, type_params: usize) -> Self {
        self.type_params = type_params;
        self
    }

    fn from_decl(decl: &TypeDecl) -> Self {
        let category = match decl.kind {
            TypeDeclKind::Struct => TypeCategory::Value,
            TypeDeclKind::Class => TypeCategory::Reference,
            TypeDeclKind::Interface => TypeCategory::Interface,
        };

        let mut info = Self {
            name: decl.name.clone(),
            category,
            bases: decl.bases.iter().map(|b| b.short_name().to_string()).collect(),
            type_params: decl.type_params.len(),
            fields: Vec::new(),
            static_fields: Vec::new(),
            methods: Vec::new(),
            static_methods: Vec::new(),
            user_declared: true,
        };

        for field in decl.fields() {
            for declarator in &field.declarators {
                if field.is_static() {
                    info.static_fields.push(declarator.name.clone());
                } else {
                    info.fields.push((declarator.name.clone(), field.ty.clone()));
                }
            }
        }
        for method in decl.methods() {
            if method.is_static() {
                info.static_methods.push(method.name.clone());
            } else {
                info.methods.push(method.name.clone());
            }
        }
        info
    }

    /// Instance field type by name.
    pub fn field_type(&self, name: &str) -> Option<&TypeRef> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, ty)| ty)
    }

    pub fn has_instance_member(&self, name: &str) -> bool {
        self.fields.iter().any(|(field, _)| field == name) || self.methods.iter().any(|m| m == name)
    }

    pub fn has_static_member(&self, name: &str) -> bool {
        self.static_fields.iter().any(|f| f == name) || self.static_methods.iter().any(|m| m == name)
    }
}

/// Every type the pass can reason about, keyed by short name.
#[derive(Debug, Clone)]
pub struct TypeTable {
    types: IndexMap<String, TypeInfo>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    /// Table with the framework types only.
    pub fn new() -> Self {
        let mut types = IndexMap::new();
        for info in builtin_types() {
            types.insert(info.name.clone(), info);
        }
        Self { types }
    }

    /// Table with the framework types and every type declared in `units`.
    pub fn from_units<'a>(units: impl IntoIterator<Item = &'a CompilationUnit>) -> Self {
        let mut table = Self::new();
        for unit in units {
            for decl in &unit.types {
                table.declare(decl);
            }
        }
        table
    }

    /// Add a user type and its nested types. A user declaration replaces a
    /// framework type of the same name.
    pub fn declare(&mut self, decl: &TypeDecl) {
        self.types.insert(decl.name.clone(), TypeInfo::from_decl(decl));
        for nested in &decl.nested {
            self.declare(nested);
        }
    }

    pub fn get(&self, name: &str) -> Option<&TypeInfo> {
        self.types.get(name)
    }

    /// Lookup through a type reference, ignoring namespace qualification.
    pub fn lookup(&self, ty: &TypeRef) -> Option<&TypeInfo> {
        self.types.get(ty.short_name())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Value or reference category. Arrays and `string` are references;
    /// unresolved types are treated as value types.
    pub fn category(&self, ty: &TypeRef) -> TypeCategory {
        if ty.array_rank > 0 {
            return TypeCategory::Reference;
        }
        self.lookup(ty)
            .map(|info| info.category)
            .unwrap_or(TypeCategory::Value)
    }

    pub fn is_value_type(&self, ty: &TypeRef) -> bool {
        self.category(ty) == TypeCategory::Value
    }

    /// Whether a reference type (class, interface or array).
    pub fn is_reference_type(&self, ty: &TypeRef) -> bool {
        !self.is_value_type(ty)
    }

    /// Whether `ty` derives from or implements `base`, directly or through
    /// its bases.
    pub fn implements(&self, ty: &TypeRef, base: &str) -> bool {
        let mut pending = vec![ty.short_name().to_string()];
        let mut visited = Vec::new();
        while let Some(name) = pending.pop() {
            if name == base {
                return true;
            }
            if visited.contains(&name) {
                continue;
            }
            if let Some(info) = self.types.get(&name) {
                pending.extend(info.bases.iter().cloned());
            }
            visited.push(name);
        }
        false
    }

    /// Component without instance fields.
    pub fn is_tag(&self, ty: &TypeRef) -> bool {
        self.lookup(ty).is_some_and(|info| info.fields.is_empty())
    }

    /// Whether any instance field of a value type holds a reference.
    pub fn has_managed_fields(&self, ty: &TypeRef) -> bool {
        self.lookup(ty).is_some_and(|info| {
            info.fields
                .iter()
                .any(|(_, field_ty)| self.is_reference_type(field_ty))
        })
    }

    /// Unity objects (`UnityEngine.Object` and everything deriving from it).
    pub fn is_host_object(&self, ty: &TypeRef) -> bool {
        self.implements(ty, "Object") && self.is_reference_type(ty)
    }

    /// Find the type declaring member `name`, searching `type_name` and then
    /// its bases.
    pub fn member_owner(&self, type_name: &str, name: &str) -> Option<&TypeInfo> {
        let mut pending = vec![type_name.to_string()];
        let mut visited = Vec::new();
        while let Some(current) = pending.pop() {
            if visited.contains(&current) {
                continue;
            }
            if let Some(info) = self.types.get(&current) {
                if info.has_instance_member(name) || info.has_static_member(name) {
                    return Some(info);
                }
                pending.extend(info.bases.iter().cloned());
            }
            visited.push(current);
        }
        None
    }

    /// Type of an instance field reached from `ty`.
    pub fn field_type(&self, ty: &TypeRef, field: &str) -> Option<&TypeRef> {
        self.lookup(ty).and_then(|info| info.field_type(field))
    }
}

fn builtin_types() -> Vec<TypeInfo> {
    use TypeCategory::*;

    let mut types = Vec::new();

    for name in [
        "bool", "byte", "sbyte", "short", "ushort", "int", "uint", "long", "ulong", "char",
        "float", "double", "decimal",
    ] {
        types.push(TypeInfo::builtin(name, Value, &[]));
    }
    for prefix in ["float", "int", "uint", "double", "bool", "half"] {
        for n in 2..=4 {
            types.push(TypeInfo::builtin(&format!("{prefix}{n}"), Value, &[]));
            types.push(TypeInfo::builtin(&format!("{prefix}{n}x{n}"), Value, &[]));
        }
    }
    for name in [
        "quaternion",
        "Entity",
        "EntityQuery",
        "EntityManager",
        "EntityCommandBuffer",
        "ParallelWriter",
        "JobHandle",
        "Random",
        "TimeData",
        "FixedString32Bytes",
        "FixedString64Bytes",
        "FixedString128Bytes",
        "EntityStorageInfoLookup",
        "v128",
    ] {
        types.push(TypeInfo::builtin(name, Value, &[]));
    }
    for (name, params) in [
        ("DynamicBuffer", 1),
        ("NativeArray", 1),
        ("NativeList", 1),
        ("NativeQueue", 1),
        ("NativeHashMap", 2),
        ("NativeParallelHashMap", 2),
        ("NativeReference", 1),
        ("ComponentLookup", 1),
        ("BufferLookup", 1),
        ("RefRO", 1),
        ("RefRW", 1),
        ("Nullable", 1),
    ] {
        types.push(TypeInfo::builtin(name, Value, &[]).generic(params));
    }

    for name in [
        COMPONENT_DATA,
        SHARED_COMPONENT_DATA,
        BUFFER_ELEMENT_DATA,
        ASPECT,
        ENABLEABLE_COMPONENT,
        "IQueryTypeParameter",
        "IDisposable",
    ] {
        types.push(TypeInfo::builtin(name, Interface, &[]));
    }

    types.push(TypeInfo::builtin("object", Reference, &[]));
    types.push(TypeInfo::builtin("string", Reference, &[]));
    types.push(TypeInfo::builtin("Object", Reference, &[]));
    types.push(TypeInfo::builtin("Component", Reference, &["Object"]));
    types.push(TypeInfo::builtin("Behaviour", Reference, &["Component"]));
    types.push(TypeInfo::builtin("MonoBehaviour", Reference, &["Behaviour"]));
    types.push(TypeInfo::builtin("Transform", Reference, &["Component"]));
    types.push(TypeInfo::builtin("GameObject", Reference, &["Object"]));
    types.push(TypeInfo::builtin("ComponentSystemBase", Reference, &[]));
    let mut system_base = TypeInfo::builtin("SystemBase", Reference, &["ComponentSystemBase"]);
    for (field, field_ty) in [
        ("EntityManager", "EntityManager"),
        ("Dependency", "JobHandle"),
        ("Time", "TimeData"),
        ("World", "World"),
        ("Enabled", "bool"),
    ] {
        system_base.fields.push((
            field.to_string(),
            TypeRef::simple(field_ty, lambdajob_ast::Span::zero(0)),
        ));
    }
    system_base.methods.extend(
        ["GetEntityQuery", "RequireForUpdate", "CompleteDependency"]
            .iter()
            .map(|m| m.to_string()),
    );
    types.push(system_base);
    types.push(TypeInfo::builtin("World", Reference, &[]));
    types.push(TypeInfo::builtin(
        "EntityCommandBufferSystem",
        Reference,
        &["SystemBase"],
    ));
    types.push(TypeInfo::builtin(
        "EndSimulationEntityCommandBufferSystem",
        Reference,
        &["EntityCommandBufferSystem"],
    ));
    types.push(TypeInfo::builtin(
        "BeginSimulationEntityCommandBufferSystem",
        Reference,
        &["EntityCommandBufferSystem"],
    ));

    types
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambdajob_ast::Span;
    use lambdajob_parser::parse_source;

    fn ty(name: &str) -> TypeRef {
        TypeRef::simple(name, Span::zero(0))
    }

    fn table(source: &str) -> TypeTable {
        let unit = parse_source(source, 0).unwrap();
        TypeTable::from_units([&unit])
    }

    #[test]
    fn test_user_types_are_classified() {
        let table = table(
            r#"
            struct Speed : IComponentData { public float Value; }
            struct Marker : IComponentData { }
            class Config : IComponentData { public string Name; }
            struct Element : IBufferElementData { public int Value; }
            "#,
        );

        assert!(table.is_value_type(&ty("Speed")));
        assert!(table.implements(&ty("Speed"), COMPONENT_DATA));
        assert!(!table.is_tag(&ty("Speed")));
        assert!(table.is_tag(&ty("Marker")));
        assert!(table.is_reference_type(&ty("Config")));
        assert!(table.implements(&ty("Element"), BUFFER_ELEMENT_DATA));
    }

    #[test]
    fn test_transitive_bases() {
        let table = table("class Ship : MonoBehaviour { }");
        assert!(table.is_host_object(&ty("Ship")));
        assert!(table.implements(&ty("Ship"), "Component"));
        assert!(!table.is_host_object(&ty("float3")));
    }

    #[test]
    fn test_unknown_types_are_values() {
        let table = TypeTable::new();
        assert!(table.is_value_type(&ty("SomethingElse")));

        let mut array = ty("int");
        array.array_rank = 1;
        assert!(table.is_reference_type(&array));
        assert!(table.is_reference_type(&ty("string")));
    }

    #[test]
    fn test_managed_fields() {
        let table = table(
            r#"
            struct Shared : ISharedComponentData { public string Label; }
            struct Plain : ISharedComponentData { public int Group; }
            "#,
        );
        assert!(table.has_managed_fields(&ty("Shared")));
        assert!(!table.has_managed_fields(&ty("Plain")));
    }

    #[test]
    fn test_members_are_split_by_staticness() {
        let table = table(
            r#"
            partial class S : SystemBase {
                const float K = 1f;
                float speed;
                static int count;
                void Tick() { }
                static void Reset() { }
            }
            "#,
        );
        let info = table.get("S").unwrap();
        assert!(info.has_instance_member("speed"));
        assert!(info.has_instance_member("Tick"));
        assert!(info.has_static_member("K"));
        assert!(info.has_static_member("count"));
        assert!(info.has_static_member("Reset"));
        assert_eq!(info.field_type("speed").unwrap().name, "float");
    }
}
