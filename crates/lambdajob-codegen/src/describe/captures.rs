//! Captured-variable discovery.
//!
//! A capture is an identifier used in the lambda body that refers to a local
//! or parameter of the containing method, or to an instance member of the
//! containing type (which captures `this`). Names declared inside the body,
//! lambda parameters, `const` locals and names inside `nameof` are not
//! captures.

use crate::rewrite::lookup::is_patchable_method;
use crate::semantic::{MethodScope, SymbolKind};
use lambdajob_ast::{
    AssignOp, Block, Expr, ExprKind, Lambda, MethodDecl, NodeId, RefKind, Span, StmtKind, TypeRef,
    walk_block, walk_block_stmts, walk_expr,
};
use std::collections::HashSet;

/// Field name used for a captured `this`.
pub const THIS_FIELD: &str = "__this";

const ENTITY_MANAGER: &str = "EntityManager";

/// Safety attribute requested on a captured variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureAttribute {
    ReadOnly,
    DisableParallelForRestriction,
    NativeDisableContainerSafetyRestriction,
    NativeDisableUnsafePtrRestriction,
}

impl CaptureAttribute {
    pub fn from_method(name: &str) -> Option<Self> {
        match name {
            "WithReadOnly" => Some(CaptureAttribute::ReadOnly),
            "WithDisableParallelForRestriction" => {
                Some(CaptureAttribute::DisableParallelForRestriction)
            }
            "WithNativeDisableContainerSafetyRestriction" => {
                Some(CaptureAttribute::NativeDisableContainerSafetyRestriction)
            }
            "WithNativeDisableUnsafePtrRestriction" => {
                Some(CaptureAttribute::NativeDisableUnsafePtrRestriction)
            }
            _ => None,
        }
    }

    pub fn method_name(self) -> &'static str {
        match self {
            CaptureAttribute::ReadOnly => "WithReadOnly",
            CaptureAttribute::DisableParallelForRestriction => "WithDisableParallelForRestriction",
            CaptureAttribute::NativeDisableContainerSafetyRestriction => {
                "WithNativeDisableContainerSafetyRestriction"
            }
            CaptureAttribute::NativeDisableUnsafePtrRestriction => {
                "WithNativeDisableUnsafePtrRestriction"
            }
        }
    }

    /// Attribute text placed on the job field.
    pub fn attribute_text(self) -> &'static str {
        match self {
            CaptureAttribute::ReadOnly => "ReadOnly",
            CaptureAttribute::DisableParallelForRestriction => "NativeDisableParallelForRestriction",
            CaptureAttribute::NativeDisableContainerSafetyRestriction => {
                "NativeDisableContainerSafetyRestriction"
            }
            CaptureAttribute::NativeDisableUnsafePtrRestriction => {
                "NativeDisableUnsafePtrRestriction"
            }
        }
    }
}

/// Where a captured variable comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureSource {
    Local,
    Parameter,
    This,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapturedVariable {
    /// Name as used in the body; `this` for a captured `this`.
    pub name: String,
    /// Field name in the generated job struct.
    pub field_name: String,
    pub source: CaptureSource,
    pub ty: Option<TypeRef>,
    pub is_reference_type: bool,
    /// Bound through a `using` declaration.
    pub is_using: bool,
    pub written_inside: bool,
    /// Read in the containing method after the job call.
    pub read_after: bool,
    pub attributes: Vec<CaptureAttribute>,
    /// First use inside the lambda.
    pub span: Span,
}

impl CapturedVariable {
    pub fn is_this(&self) -> bool {
        self.source == CaptureSource::This
    }

    /// Type text for the job field and the execute-method parameter.
    pub fn type_text(&self, containing_type: &str) -> String {
        match (&self.ty, self.source) {
            (_, CaptureSource::This) => containing_type.to_string(),
            (Some(ty), _) if !ty.is_var() => ty.to_string(),
            _ => "object".to_string(),
        }
    }
}

/// Lambda parameters plus every name declared inside the body.
pub fn bound_names<'p>(params: impl Iterator<Item = &'p str>, body: &Block) -> HashSet<String> {
    let mut bound: HashSet<String> = params.map(str::to_string).collect();
    walk_block_stmts(body, &mut |stmt| match &stmt.kind {
        StmtKind::Local(decl) => {
            bound.extend(decl.declarators.iter().map(|d| d.name.clone()));
        }
        StmtKind::Foreach { name, .. } => {
            bound.insert(name.clone());
        }
        _ => {}
    });
    bound
}

/// Find the variables `lambda` captures from its containing method.
pub fn discover(
    lambda: &Lambda,
    body: &Block,
    scope: &MethodScope<'_>,
    method: &MethodDecl,
    call_span: Span,
) -> Vec<CapturedVariable> {
    let bound = bound_names(lambda.params.iter().map(|p| p.name.as_str()), body);

    let skipped = skipped_names(body, scope);
    let mut uses_this = false;
    let mut free = false;
    walk_block(body, &mut |expr| match &expr.kind {
        ExprKind::This => uses_this = true,
        ExprKind::Name { name, .. } if !skipped.contains(&expr.id) && !bound.contains(name) => {
            free = true
        }
        _ => {}
    });
    if !free && !uses_this {
        return Vec::new();
    }

    let written = written_roots(body);
    let mut captures: Vec<CapturedVariable> = Vec::new();
    let mut this_span = None;

    walk_block(body, &mut |expr| {
        let name = match &expr.kind {
            ExprKind::This => {
                this_span.get_or_insert(expr.span);
                return;
            }
            ExprKind::Name { name, .. } => name,
            _ => return,
        };
        if skipped.contains(&expr.id) || bound.contains(name) {
            return;
        }
        if captures.iter().any(|c| c.name == *name) {
            return;
        }
        let Some(symbol) = scope.resolve(name) else {
            return;
        };

        if symbol.is_outer_variable() && !symbol.is_const() {
            let is_reference_type = symbol
                .ty
                .as_ref()
                .filter(|ty| !ty.is_var())
                .is_some_and(|ty| scope.types().is_reference_type(ty));
            captures.push(CapturedVariable {
                name: name.clone(),
                field_name: name.clone(),
                source: if symbol.kind == SymbolKind::Parameter {
                    CaptureSource::Parameter
                } else {
                    CaptureSource::Local
                },
                ty: symbol.ty.clone(),
                is_reference_type,
                is_using: symbol.is_using,
                written_inside: written.contains(name.as_str()),
                read_after: false,
                attributes: Vec::new(),
                span: expr.span,
            });
        } else if symbol.is_instance_member() {
            this_span.get_or_insert(expr.span);
        }
    });

    if let Some(span) = this_span {
        let containing = scope.containing_type();
        captures.push(CapturedVariable {
            name: "this".to_string(),
            field_name: THIS_FIELD.to_string(),
            source: CaptureSource::This,
            ty: Some(TypeRef::simple(containing, span)),
            is_reference_type: scope
                .types()
                .get(containing)
                .is_some_and(|info| info.category == crate::semantic::TypeCategory::Reference),
            is_using: false,
            written_inside: false,
            read_after: false,
            attributes: Vec::new(),
            span,
        });
    }

    if let Some(method_body) = &method.body {
        let mut read_after: HashSet<&str> = HashSet::new();
        let mut overwritten: HashSet<NodeId> = HashSet::new();
        walk_block(method_body, &mut |expr| {
            if expr.span.start < call_span.end {
                return;
            }
            if let ExprKind::Assign {
                op: AssignOp::Assign,
                target,
                ..
            } = &expr.kind
            {
                if let Some(root) = assigned_root_expr(target) {
                    overwritten.insert(root.id);
                }
            }
            if overwritten.contains(&expr.id) {
                return;
            }
            if let Some(name) = expr.as_name() {
                read_after.insert(name);
            }
        });
        for capture in &mut captures {
            capture.read_after = read_after.contains(capture.name.as_str());
        }
    }

    captures
}

/// Names that never produce a capture: everything inside `nameof`, the
/// callee of a patchable framework call and the framework `EntityManager`
/// member, unless the containing type declares the name itself.
fn skipped_names(body: &Block, scope: &MethodScope<'_>) -> HashSet<NodeId> {
    let mut skipped = HashSet::new();
    walk_block(body, &mut |expr| match &expr.kind {
        ExprKind::Nameof(inner) => walk_expr(inner, &mut |node| {
            skipped.insert(node.id);
        }),
        ExprKind::Invoke { callee, .. } => {
            if let ExprKind::Name { name, .. } = &callee.kind {
                if is_patchable_method(name) && !declared_by_user(scope, name) {
                    skipped.insert(callee.id);
                }
            }
        }
        ExprKind::Name { name, .. } if name == ENTITY_MANAGER && !declared_by_user(scope, name) => {
            skipped.insert(expr.id);
        }
        _ => {}
    });
    skipped
}

fn declared_by_user(scope: &MethodScope<'_>, name: &str) -> bool {
    scope
        .types()
        .get(scope.containing_type())
        .is_some_and(|info| info.user_declared && info.has_instance_member(name))
}

/// Root names of every location the body stores into.
fn written_roots(body: &Block) -> HashSet<String> {
    let mut written = HashSet::new();
    walk_block(body, &mut |expr| match &expr.kind {
        ExprKind::Assign { target, .. } => {
            if let Some(root) = assigned_root(target) {
                written.insert(root.to_string());
            }
        }
        ExprKind::Unary { op, operand } if op.is_mutating() => {
            if let Some(root) = assigned_root(operand) {
                written.insert(root.to_string());
            }
        }
        ExprKind::Invoke { args, .. } | ExprKind::New { args, .. } => {
            for arg in args {
                if matches!(arg.ref_kind, RefKind::Ref | RefKind::Out) {
                    if let Some(root) = assigned_root(&arg.value) {
                        written.insert(root.to_string());
                    }
                }
            }
        }
        _ => {}
    });
    written
}

/// `a`, `a.b.c` and `(a).b` store into `a`. Indexers store into the
/// container's storage, not the variable.
fn assigned_root(expr: &Expr) -> Option<&str> {
    assigned_root_expr(expr).and_then(Expr::as_name)
}

/// The name node [`assigned_root`] resolves to.
fn assigned_root_expr(expr: &Expr) -> Option<&Expr> {
    match &expr.kind {
        ExprKind::Name { .. } => Some(expr),
        ExprKind::Member { target, .. } => assigned_root_expr(target),
        ExprKind::Paren(inner) => assigned_root_expr(inner),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::scan_unit;
    use crate::semantic::TypeTable;
    use lambdajob_ast::LambdaBody;
    use lambdajob_parser::parse_source;

    fn captures_of(members: &str, body: &str) -> Vec<CapturedVariable> {
        let source = format!(
            "partial class S : SystemBase {{ {} void OnUpdate(float dt) {{ {} }} }}",
            members, body
        );
        let unit = parse_source(&source, 0).unwrap();
        let types = TypeTable::from_units([&unit]);
        let candidates = scan_unit(&unit);
        let candidate = &candidates[0];
        let scope = MethodScope::at(candidate.method, "S", &types, candidate.span());

        let call = candidate.calls_named(candidate.kind.body_method()).next().unwrap();
        let ExprKind::Lambda(lambda) = &call.args[0].value.kind else {
            panic!("expected lambda");
        };
        let block = match &lambda.body {
            LambdaBody::Block(block) => block.clone(),
            LambdaBody::Expr(_) => panic!("expected block body"),
        };
        discover(lambda, &block, &scope, candidate.method, candidate.span())
    }

    fn names(captures: &[CapturedVariable]) -> Vec<&str> {
        captures.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_locals_and_parameters_are_captured() {
        let captures = captures_of(
            "",
            r#"
            float speed = 2f;
            Entities.ForEach((ref Translation t) => {
                var local = speed * dt;
                t.Value += local;
            }).Run();
            "#,
        );
        assert_eq!(names(&captures), vec!["speed", "dt"]);
        assert_eq!(captures[0].source, CaptureSource::Local);
        assert_eq!(captures[1].source, CaptureSource::Parameter);
        assert!(!captures[0].written_inside);
    }

    #[test]
    fn test_no_captures_fast_path() {
        let captures = captures_of(
            "",
            "Entities.ForEach((ref Translation t) => { t.Value = t.Value * 2f; }).Run();",
        );
        assert!(captures.is_empty());
    }

    #[test]
    fn test_const_locals_and_nameof_are_not_captured() {
        let captures = captures_of(
            "",
            r#"
            const float k = 3f;
            int counter = 0;
            Entities.ForEach((ref Translation t) => {
                t.Value *= k;
                Debug.Log(nameof(counter));
            }).WithoutBurst().Run();
            "#,
        );
        assert!(captures.is_empty(), "{:?}", names(&captures));
    }

    #[test]
    fn test_instance_member_captures_this() {
        let captures = captures_of(
            "float speed;",
            "Entities.ForEach((ref Translation t) => { t.Value *= speed; }).WithoutBurst().Run();",
        );
        assert_eq!(names(&captures), vec!["this"]);
        assert_eq!(captures[0].field_name, THIS_FIELD);
        assert!(captures[0].is_reference_type);
    }

    #[test]
    fn test_written_and_read_after() {
        let captures = captures_of(
            "",
            r#"
            int count = 0;
            var total = new NativeArray<int>(1, Allocator.TempJob);
            Entities.ForEach((in Translation t) => {
                count++;
                total[0] = count;
            }).Run();
            Debug.Log(count);
            "#,
        );
        let count = captures.iter().find(|c| c.name == "count").unwrap();
        assert!(count.written_inside);
        assert!(count.read_after);
        let total = captures.iter().find(|c| c.name == "total").unwrap();
        assert!(!total.written_inside);
        assert!(!total.read_after);
    }

    #[test]
    fn test_reassignment_after_call_is_not_a_read() {
        let captures = captures_of(
            "",
            r#"
            int counter = 0;
            int total = 0;
            Entities.ForEach((in Translation t) => {
                counter++;
                total += 1;
            }).Schedule();
            counter = 5;
            total += 2;
            "#,
        );
        let counter = captures.iter().find(|c| c.name == "counter").unwrap();
        assert!(counter.written_inside);
        assert!(!counter.read_after);
        let total = captures.iter().find(|c| c.name == "total").unwrap();
        assert!(total.read_after);
    }

    #[test]
    fn test_patchable_calls_are_not_captures() {
        let captures = captures_of(
            "",
            r#"
            Entities.ForEach((Entity e, ref Translation t) => {
                if (HasComponent<Velocity>(e)) { t.Value = GetComponent<Velocity>(e).Value; }
            }).Run();
            "#,
        );
        assert!(captures.is_empty(), "{:?}", names(&captures));
    }

    #[test]
    fn test_reference_type_capture_is_flagged() {
        let captures = captures_of(
            "",
            r#"
            string label = "x";
            Entities.ForEach((Entity e) => { Debug.Log(label); }).WithoutBurst().Run();
            "#,
        );
        assert!(captures[0].is_reference_type);
    }
}
