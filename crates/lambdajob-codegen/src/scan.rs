//! Candidate discovery.
//!
//! Walks every method body of a compilation unit looking for fluent call
//! chains rooted at `Entities` (ended by `ForEach`) or `Job` (ended by
//! `WithCode`). Chains nested inside another candidate's lambda are not
//! candidates of their own; the description builder reports them.

use lambdajob_ast::{
    Argument, CompilationUnit, Expr, ExprKind, MethodDecl, NodeId, Span, TypeDecl, TypeRef,
    walk_block, walk_expr,
};
use std::collections::HashSet;
use tracing::debug;

/// Which entry point a chain starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// `Entities.…ForEach(lambda)…`
    EntitiesForEach,
    /// `Job.…WithCode(lambda)…`
    JobWithCode,
}

impl JobKind {
    pub fn entry_name(self) -> &'static str {
        match self {
            JobKind::EntitiesForEach => "Entities",
            JobKind::JobWithCode => "Job",
        }
    }

    /// Name of the call that receives the job lambda.
    pub fn body_method(self) -> &'static str {
        match self {
            JobKind::EntitiesForEach => "ForEach",
            JobKind::JobWithCode => "WithCode",
        }
    }
}

/// Fluent methods that may appear in a chain besides the body method.
pub const CHAIN_METHODS: &[&str] = &[
    "WithName",
    "WithBurst",
    "WithoutBurst",
    "WithStructuralChanges",
    "WithAll",
    "WithAny",
    "WithNone",
    "WithDisabled",
    "WithAbsent",
    "WithChangeFilter",
    "WithSharedComponentFilter",
    "WithEntityQueryOptions",
    "WithStoreEntityQueryInField",
    "WithReadOnly",
    "WithDisableParallelForRestriction",
    "WithNativeDisableContainerSafetyRestriction",
    "WithNativeDisableUnsafePtrRestriction",
    "WithScheduleGranularity",
    "WithDeferredPlaybackSystem",
    "WithImmediatePlayback",
    "Run",
    "Schedule",
    "ScheduleParallel",
];

/// One `.Method<T>(args)` link of a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FluentCall {
    pub name: String,
    pub type_args: Vec<TypeRef>,
    pub args: Vec<Argument>,
    /// Span of the whole invocation up to and including this link.
    pub span: Span,
}

/// A lambda-job call chain found in a method body.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub kind: JobKind,
    /// Links in source order, entry point excluded.
    pub calls: Vec<FluentCall>,
    /// Outermost invocation; its span is the call site that gets replaced.
    pub expr: &'a Expr,
    /// Containing type followed by its enclosing types, innermost first.
    pub type_path: Vec<&'a TypeDecl>,
    pub method: &'a MethodDecl,
    /// Position among the candidates of the same containing method.
    pub ordinal: usize,
}

impl<'a> Candidate<'a> {
    pub fn containing_type(&self) -> &'a TypeDecl {
        self.type_path[0]
    }

    pub fn span(&self) -> Span {
        self.expr.span
    }

    pub fn id(&self) -> NodeId {
        self.expr.id
    }

    /// Calls with the given method name.
    pub fn calls_named<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s FluentCall> {
        self.calls.iter().filter(move |call| call.name == name)
    }
}

/// Candidates of one compilation unit, grouped by containing type in
/// declaration order.
pub fn scan_unit(unit: &CompilationUnit) -> Vec<Candidate<'_>> {
    let mut candidates = Vec::new();
    for decl in &unit.types {
        scan_type(decl, &mut Vec::new(), &mut candidates);
    }
    debug!(count = candidates.len(), "scanned lambda-job candidates");
    candidates
}

fn scan_type<'a>(
    decl: &'a TypeDecl,
    enclosing: &mut Vec<&'a TypeDecl>,
    out: &mut Vec<Candidate<'a>>,
) {
    let mut type_path = vec![decl];
    type_path.extend(enclosing.iter().rev());

    for method in decl.methods() {
        let Some(body) = &method.body else {
            continue;
        };

        let mut claimed: HashSet<NodeId> = HashSet::new();
        let mut ordinal = 0;
        walk_block(body, &mut |expr| {
            if claimed.contains(&expr.id) {
                return;
            }
            let Some((kind, calls)) = flatten_chain(expr) else {
                return;
            };
            walk_expr(expr, &mut |inner| {
                claimed.insert(inner.id);
            });
            out.push(Candidate {
                kind,
                calls,
                expr,
                type_path: type_path.clone(),
                method,
                ordinal,
            });
            ordinal += 1;
        });
    }

    enclosing.push(decl);
    for nested in &decl.nested {
        scan_type(nested, enclosing, out);
    }
    enclosing.pop();
}

/// Unwind `Entry.A(..).B(..)` into its links when every link is a
/// recognised chain method and the body method is present.
pub fn flatten_chain(expr: &Expr) -> Option<(JobKind, Vec<FluentCall>)> {
    let mut calls = Vec::new();
    let mut current = expr;

    let kind = loop {
        let ExprKind::Invoke { callee, args } = &current.kind else {
            return None;
        };
        let ExprKind::Member {
            target,
            name,
            type_args,
        } = &callee.kind
        else {
            return None;
        };
        calls.push(FluentCall {
            name: name.clone(),
            type_args: type_args.clone(),
            args: args.clone(),
            span: current.span,
        });

        if let Some(kind) = entry_point(target) {
            break kind;
        }
        current = target;
    };

    calls.reverse();

    let body_method = kind.body_method();
    let recognised = calls
        .iter()
        .all(|call| call.name == body_method || CHAIN_METHODS.contains(&call.name.as_str()));
    let has_body = calls.iter().any(|call| call.name == body_method);

    (recognised && has_body).then_some((kind, calls))
}

/// `Entities`, `Job`, `this.Entities` or `this.Job`.
fn entry_point(expr: &Expr) -> Option<JobKind> {
    let name = match &expr.kind {
        ExprKind::Name { name, type_args } if type_args.is_empty() => name,
        ExprKind::Member { target, name, .. } if matches!(target.kind, ExprKind::This) => name,
        _ => return None,
    };
    match name.as_str() {
        "Entities" => Some(JobKind::EntitiesForEach),
        "Job" => Some(JobKind::JobWithCode),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambdajob_parser::parse_source;

    fn scan(source: &str) -> (CompilationUnit, usize) {
        let unit = parse_source(source, 0).unwrap();
        let count = scan_unit(&unit).len();
        (unit, count)
    }

    #[test]
    fn test_finds_entities_chain() {
        let unit = parse_source(
            r#"
            partial class S : SystemBase {
                void OnUpdate() {
                    Entities.WithName("Move").WithAll<Tag>().ForEach((ref Foo f) => { }).ScheduleParallel();
                }
            }
            "#,
            0,
        )
        .unwrap();
        let candidates = scan_unit(&unit);

        assert_eq!(candidates.len(), 1);
        let candidate = &candidates[0];
        assert_eq!(candidate.kind, JobKind::EntitiesForEach);
        let names: Vec<_> = candidate.calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["WithName", "WithAll", "ForEach", "ScheduleParallel"]);
        assert_eq!(candidate.calls[1].type_args[0].name, "Tag");
        assert_eq!(candidate.containing_type().name, "S");
        assert_eq!(candidate.method.name, "OnUpdate");
    }

    #[test]
    fn test_job_with_code_and_this_prefix() {
        let (_, count) = scan(
            r#"
            partial class S : SystemBase {
                void OnUpdate() {
                    Job.WithCode(() => { }).Schedule();
                    this.Entities.ForEach((Entity e) => { }).Run();
                }
            }
            "#,
        );
        assert_eq!(count, 2);
    }

    #[test]
    fn test_ordinals_count_per_method() {
        let unit = parse_source(
            r#"
            partial class S : SystemBase {
                void A() {
                    Entities.ForEach((Entity e) => { }).Run();
                    Entities.ForEach((Entity e) => { }).Run();
                }
                void B() {
                    Entities.ForEach((Entity e) => { }).Run();
                }
            }
            "#,
            0,
        )
        .unwrap();
        let ordinals: Vec<_> = scan_unit(&unit).iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 0]);
    }

    #[test]
    fn test_nested_chain_is_not_a_candidate() {
        let (_, count) = scan(
            r#"
            partial class S : SystemBase {
                void OnUpdate() {
                    Entities.ForEach((Entity e) => {
                        Job.WithCode(() => { }).Run();
                    }).Run();
                }
            }
            "#,
        );
        assert_eq!(count, 1);
    }

    #[test]
    fn test_unrelated_calls_are_ignored() {
        let (_, count) = scan(
            r#"
            partial class S : SystemBase {
                void OnUpdate() {
                    Entities.WithAll<Foo>().ToQuery();
                    list.ForEach(x => x.Reset());
                    Dependency.Complete();
                }
            }
            "#,
        );
        assert_eq!(count, 0);
    }

    #[test]
    fn test_nested_types_are_scanned() {
        let unit = parse_source(
            r#"
            partial class Outer {
                partial class Inner : SystemBase {
                    void OnUpdate() { Entities.ForEach((Entity e) => { }).Run(); }
                }
            }
            "#,
            0,
        )
        .unwrap();
        let candidates = scan_unit(&unit);
        assert_eq!(candidates.len(), 1);
        let path: Vec<_> = candidates[0]
            .type_path
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(path, vec!["Inner", "Outer"]);
    }
}
