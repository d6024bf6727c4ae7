//! Lookup fields and patchable data-access methods.
//!
//! Data-access calls in a lambda body (`GetComponent<T>(e)`,
//! `GetBuffer<T>(e)`, ...) cannot run inside a job; they are replaced by
//! indexing into a per-type lookup field on the job struct. The access mode
//! of a field only ever widens while a body is rewritten.

use crate::describe::AccessMode;
use indexmap::IndexMap;
use lambdajob_ast::TypeRef;

/// Accessor a lookup field provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LookupKind {
    Component,
    Buffer,
    Aspect,
    EntityStorageInfo,
}

/// One lookup field of a job struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupField {
    pub kind: LookupKind,
    /// Accessed type; `None` for the entity-storage-info lookup.
    pub ty: Option<TypeRef>,
    access: AccessMode,
}

impl LookupField {
    pub fn access(&self) -> AccessMode {
        self.access
    }

    /// `__{TypeIdentifier}_ComponentLookup` and friends.
    pub fn field_name(&self) -> String {
        let ident = self.ty.as_ref().map(TypeRef::identifier).unwrap_or_default();
        match self.kind {
            LookupKind::Component => format!("__{}_ComponentLookup", ident),
            LookupKind::Buffer => format!("__{}_BufferLookup", ident),
            LookupKind::Aspect => format!("__{}_AspectLookup", ident),
            LookupKind::EntityStorageInfo => "__EntityStorageInfoLookup".to_string(),
        }
    }

    pub fn field_type(&self) -> String {
        let ty = self.ty.as_ref().map(TypeRef::to_string).unwrap_or_default();
        match self.kind {
            LookupKind::Component => format!("ComponentLookup<{}>", ty),
            LookupKind::Buffer => format!("BufferLookup<{}>", ty),
            LookupKind::Aspect => format!("{}.Lookup", ty),
            LookupKind::EntityStorageInfo => "EntityStorageInfoLookup".to_string(),
        }
    }

    /// Expression evaluated in the system to initialize the field.
    pub fn init(&self) -> String {
        let ty = self.ty.as_ref().map(TypeRef::to_string).unwrap_or_default();
        let read_only = self.access.is_read_only();
        match self.kind {
            LookupKind::Component => format!("GetComponentLookup<{}>({})", ty, read_only),
            LookupKind::Buffer => format!("GetBufferLookup<{}>({})", ty, read_only),
            LookupKind::Aspect => format!("new {}.Lookup(ref CheckedStateRef)", ty),
            LookupKind::EntityStorageInfo => "GetEntityStorageInfoLookup()".to_string(),
        }
    }
}

/// Lookup fields of one job, keyed by `(type, kind)` in first-use order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupFields {
    fields: IndexMap<(String, LookupKind), LookupField>,
}

impl LookupFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field for `(ty, kind)`, created on first use. A write request
    /// promotes an existing read-only field; a read request never demotes.
    pub fn require(&mut self, kind: LookupKind, ty: Option<&TypeRef>, access: AccessMode) -> &LookupField {
        let key = (ty.map(TypeRef::to_string).unwrap_or_default(), kind);
        let field = self.fields.entry(key).or_insert_with(|| LookupField {
            kind,
            ty: ty.cloned(),
            access,
        });
        field.access = field.access.widen(access);
        field
    }

    pub fn get(&self, kind: LookupKind, ty: &TypeRef) -> Option<&LookupField> {
        self.fields.get(&(ty.to_string(), kind))
    }

    pub fn iter(&self) -> impl Iterator<Item = &LookupField> {
        self.fields.values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// How a patchable method decides the access it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    Fixed(AccessMode),
    /// Read-only when the `isReadOnly` argument at `index` is `true`;
    /// read-write when it is `false` or omitted.
    FromLiteralArg { index: usize },
}

/// Replacement shape of a patched call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallShape {
    /// `field[e]`
    Index,
    /// `field[e] = value`
    IndexAssign,
    /// `field.Method(args)`
    Forward(&'static str),
    /// `field`
    Field,
}

/// A framework data-access method that is rewritten to a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchableMethod {
    pub name: &'static str,
    pub kind: LookupKind,
    pub access: AccessPolicy,
    pub shape: CallShape,
}

const fn method(
    name: &'static str,
    kind: LookupKind,
    access: AccessPolicy,
    shape: CallShape,
) -> PatchableMethod {
    PatchableMethod {
        name,
        kind,
        access,
        shape,
    }
}

const RO: AccessPolicy = AccessPolicy::Fixed(AccessMode::ReadOnly);
const RW: AccessPolicy = AccessPolicy::Fixed(AccessMode::ReadWrite);

pub const PATCHABLE_METHODS: &[PatchableMethod] = &[
    method("GetComponent", LookupKind::Component, RO, CallShape::Index),
    method("SetComponent", LookupKind::Component, RW, CallShape::IndexAssign),
    method("HasComponent", LookupKind::Component, RO, CallShape::Forward("HasComponent")),
    method("GetComponentRO", LookupKind::Component, RO, CallShape::Forward("GetRefRO")),
    method("GetComponentRW", LookupKind::Component, RW, CallShape::Forward("GetRefRW")),
    method(
        "GetComponentLookup",
        LookupKind::Component,
        AccessPolicy::FromLiteralArg { index: 0 },
        CallShape::Field,
    ),
    method(
        "GetBuffer",
        LookupKind::Buffer,
        AccessPolicy::FromLiteralArg { index: 1 },
        CallShape::Index,
    ),
    method("HasBuffer", LookupKind::Buffer, RO, CallShape::Forward("HasBuffer")),
    method(
        "GetBufferLookup",
        LookupKind::Buffer,
        AccessPolicy::FromLiteralArg { index: 0 },
        CallShape::Field,
    ),
    method("GetAspect", LookupKind::Aspect, RW, CallShape::Index),
    method("Exists", LookupKind::EntityStorageInfo, RO, CallShape::Forward("Exists")),
    method(
        "GetEntityStorageInfoLookup",
        LookupKind::EntityStorageInfo,
        RO,
        CallShape::Field,
    ),
];

pub fn patchable_method(name: &str) -> Option<&'static PatchableMethod> {
    PATCHABLE_METHODS.iter().find(|m| m.name == name)
}

pub fn is_patchable_method(name: &str) -> bool {
    patchable_method(name).is_some()
}

impl PatchableMethod {
    /// Whether the method takes the accessed type as a type argument.
    pub fn is_generic(&self) -> bool {
        self.kind != LookupKind::EntityStorageInfo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambdajob_ast::Span;

    fn ty(name: &str) -> TypeRef {
        TypeRef::simple(name, Span::zero(0))
    }

    #[test]
    fn test_promotion_is_monotonic() {
        let mut fields = LookupFields::new();
        let foo = ty("Foo");

        fields.require(LookupKind::Component, Some(&foo), AccessMode::ReadOnly);
        assert_eq!(
            fields.get(LookupKind::Component, &foo).unwrap().access(),
            AccessMode::ReadOnly
        );

        fields.require(LookupKind::Component, Some(&foo), AccessMode::ReadWrite);
        for _ in 0..3 {
            let field = fields.require(LookupKind::Component, Some(&foo), AccessMode::ReadOnly);
            assert_eq!(field.access(), AccessMode::ReadWrite);
        }
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn test_kinds_are_separate_fields() {
        let mut fields = LookupFields::new();
        let foo = ty("Foo");
        fields.require(LookupKind::Component, Some(&foo), AccessMode::ReadOnly);
        fields.require(LookupKind::Buffer, Some(&foo), AccessMode::ReadOnly);
        fields.require(LookupKind::EntityStorageInfo, None, AccessMode::ReadOnly);

        let names: Vec<_> = fields.iter().map(LookupField::field_name).collect();
        assert_eq!(
            names,
            vec![
                "__Foo_ComponentLookup",
                "__Foo_BufferLookup",
                "__EntityStorageInfoLookup"
            ]
        );
    }

    #[test]
    fn test_field_text() {
        let mut fields = LookupFields::new();
        let field = fields.require(LookupKind::Buffer, Some(&ty("Waypoint")), AccessMode::ReadWrite);
        assert_eq!(field.field_type(), "BufferLookup<Waypoint>");
        assert_eq!(field.init(), "GetBufferLookup<Waypoint>(false)");
    }

    #[test]
    fn test_method_table() {
        assert!(is_patchable_method("GetComponent"));
        assert!(!is_patchable_method("GetComponentData"));
        let get_buffer = patchable_method("GetBuffer").unwrap();
        assert_eq!(get_buffer.access, AccessPolicy::FromLiteralArg { index: 1 });
        assert!(!patchable_method("Exists").unwrap().is_generic());
    }
}
