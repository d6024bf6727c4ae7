//! Emission of generated partial types.
//!
//! One partial declaration is written per containing type. It holds, for
//! every successful job of that type, the job struct, the execute method the
//! call site is redirected to, and the cached entity query.

pub mod execute;
pub mod job_struct;

use crate::describe::{AccessMode, EntityQueryDesc, JobDescription};
use crate::semantic::{ENABLEABLE_COMPONENT, TypeTable};
use lambdajob_ast::{TypeDeclKind, TypeRef};

const INDENT: &str = "    ";

/// Namespaces every generated file imports.
pub const DEFAULT_USINGS: &[&str] = &[
    "System.Runtime.CompilerServices",
    "Unity.Burst",
    "Unity.Collections",
    "Unity.Collections.LowLevel.Unsafe",
    "Unity.Entities",
    "Unity.Jobs",
    "Unity.Mathematics",
];

/// Options for the emitters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitOptions {
    /// Enabled-bit edges up to which chunks are walked as ranges rather
    /// than by scanning the mask bit by bit.
    pub enabled_mask_edge_threshold: u32,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            enabled_mask_edge_threshold: 4,
        }
    }
}

/// Indentation-aware text builder.
#[derive(Debug, Default)]
pub struct SourceWriter {
    out: String,
    level: usize,
}

impl SourceWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Write one indented line.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.level {
                self.out.push_str(INDENT);
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    /// Write a line at column zero (preprocessor directives).
    pub fn directive(&mut self, text: impl AsRef<str>) {
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Append pre-rendered, already indented text.
    pub fn raw(&mut self, text: &str) {
        self.out.push_str(text);
        if !text.ends_with('\n') {
            self.out.push('\n');
        }
    }

    /// Write `header` and open a brace block.
    pub fn open(&mut self, header: impl AsRef<str>) {
        self.line(header);
        self.line("{");
        self.level += 1;
    }

    pub fn close(&mut self) {
        self.close_with("");
    }

    /// Close a brace block, appending `suffix` after the brace.
    pub fn close_with(&mut self, suffix: &str) {
        self.level = self.level.saturating_sub(1);
        self.line(format!("}}{}", suffix));
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Identity of a containing type: namespace, enclosing types and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeKey {
    pub namespace: Option<String>,
    pub path: Vec<(String, TypeDeclKind)>,
}

impl TypeKey {
    pub fn of(description: &JobDescription) -> Self {
        let containing = &description.containing_type;
        let mut path = containing.outer.clone();
        path.push((containing.name.clone(), containing.kind));
        Self {
            namespace: containing.namespace.clone(),
            path,
        }
    }

    /// `Ns.Outer.Name`
    pub fn qualified_name(&self) -> String {
        let names = self.path.iter().map(|(name, _)| name.as_str());
        match &self.namespace {
            Some(ns) => std::iter::once(ns.as_str()).chain(names).collect::<Vec<_>>().join("."),
            None => names.collect::<Vec<_>>().join("."),
        }
    }

    pub fn name(&self) -> &str {
        self.path.last().map(|(name, _)| name.as_str()).unwrap_or_default()
    }
}

/// Write the partial declaration holding every job of one containing type.
pub fn emit_type(
    key: &TypeKey,
    jobs: &[&JobDescription],
    usings: &[String],
    types: &TypeTable,
    options: &EmitOptions,
) -> String {
    let mut w = SourceWriter::new();
    w.line("// <auto-generated/>");
    w.directive("#pragma warning disable 0219");
    let mut all_usings: Vec<&str> = DEFAULT_USINGS.to_vec();
    for using in usings {
        if !all_usings.contains(&using.as_str()) {
            all_usings.push(using);
        }
    }
    for using in all_usings {
        w.line(format!("using {};", using));
    }
    w.blank();

    if let Some(ns) = &key.namespace {
        w.open(format!("namespace {}", ns));
    }
    for (name, kind) in &key.path {
        w.open(format!("partial {} {}", type_keyword(*kind), name));
    }

    for (index, job) in jobs.iter().enumerate() {
        if index > 0 {
            w.blank();
        }
        job_struct::write_job_struct(&mut w, job, types, options);
        w.blank();
        execute::write_execute_method(&mut w, job);
    }

    let for_each: Vec<&&JobDescription> = jobs.iter().filter(|job| job.is_for_each()).collect();
    if !for_each.is_empty() {
        w.blank();
        for job in &for_each {
            w.line(format!("EntityQuery {};", job.query_field_name()));
        }
        w.blank();
        w.open("protected override void OnCreateForCompiler()");
        w.line("base.OnCreateForCompiler();");
        for job in &for_each {
            write_query_creation(&mut w, job);
        }
        w.close();
    }

    for _ in &key.path {
        w.close();
    }
    if key.namespace.is_some() {
        w.close();
    }
    w.finish()
}

fn type_keyword(kind: TypeDeclKind) -> &'static str {
    match kind {
        TypeDeclKind::Struct => "struct",
        TypeDeclKind::Class => "class",
        TypeDeclKind::Interface => "interface",
    }
}

fn write_query_creation(w: &mut SourceWriter, job: &JobDescription) {
    let query = job.entity_query();
    let field = job.query_field_name();

    let mut members = Vec::new();
    for (name, entries) in [
        ("All", with_access(&query.all)),
        ("Any", with_access(&query.any)),
        ("None", read_only(&query.none)),
        ("Disabled", with_access(&query.disabled)),
        ("Absent", read_only(&query.absent)),
    ] {
        if !entries.is_empty() {
            members.push(format!(
                "{} = new ComponentType[] {{ {} }}",
                name,
                entries.join(", ")
            ));
        }
    }
    if !job.entity_query_options.is_empty() {
        let options = job
            .entity_query_options
            .iter()
            .map(|option| format!("EntityQueryOptions.{}", option))
            .collect::<Vec<_>>()
            .join(" | ");
        members.push(format!("Options = {}", options));
    }

    w.open(format!("{} = GetEntityQuery(new EntityQueryDesc", field));
    let count = members.len();
    for (index, member) in members.into_iter().enumerate() {
        let comma = if index + 1 < count { "," } else { "" };
        w.line(format!("{}{}", member, comma));
    }
    w.close_with(");");

    if let Some(filter) = change_filter(&query) {
        w.line(format!("{}.SetChangedVersionFilter({});", field, filter));
    }
    if let Some(target) = &job.store_query_in_field {
        w.line(format!("{} = {};", target, field));
    }
}

/// `new ComponentType[] { ... }` for the change-filtered types.
pub(crate) fn change_filter(query: &EntityQueryDesc) -> Option<String> {
    if query.change_filter.is_empty() {
        return None;
    }
    let types = query
        .change_filter
        .iter()
        .map(|ty| component_type(ty, AccessMode::ReadOnly))
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!("new ComponentType[] {{ {} }}", types))
}

fn with_access(list: &[(TypeRef, AccessMode)]) -> Vec<String> {
    list.iter()
        .map(|(ty, access)| component_type(ty, *access))
        .collect()
}

fn read_only(list: &[TypeRef]) -> Vec<String> {
    list.iter()
        .map(|ty| component_type(ty, AccessMode::ReadOnly))
        .collect()
}

fn component_type(ty: &TypeRef, access: AccessMode) -> String {
    match access {
        AccessMode::ReadOnly => format!("ComponentType.ReadOnly<{}>()", ty),
        AccessMode::ReadWrite => format!("ComponentType.ReadWrite<{}>()", ty),
    }
}

/// Whether any queried type can be toggled per entity.
pub(crate) fn has_enableable_types(job: &JobDescription, types: &TypeTable) -> bool {
    job.entity_query()
        .types()
        .into_iter()
        .any(|ty| types.implements(ty, ENABLEABLE_COMPONENT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_indents_blocks() {
        let mut w = SourceWriter::new();
        w.open("struct A");
        w.line("int x;");
        w.directive("#line hidden");
        w.close();
        assert_eq!(w.finish(), "struct A\n{\n    int x;\n#line hidden\n}\n");
    }

    #[test]
    fn test_type_key_names() {
        let key = TypeKey {
            namespace: Some("Game.Systems".to_string()),
            path: vec![
                ("Outer".to_string(), TypeDeclKind::Class),
                ("Mover".to_string(), TypeDeclKind::Class),
            ],
        };
        assert_eq!(key.qualified_name(), "Game.Systems.Outer.Mover");
        assert_eq!(key.name(), "Mover");
    }
}
