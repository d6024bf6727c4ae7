//! Lambda body rewriting.
//!
//! Rewriting runs in two passes over the body. The planning pass walks the
//! original tree, resolves identifiers and data-access calls, and records a
//! [`Replacement`] per node id. The apply pass folds the tree and swaps in
//! the replacements; since fold is post-order, a replaced call already sees
//! its rewritten arguments.

pub mod constants;
pub mod lookup;

pub use lookup::{AccessPolicy, CallShape, LookupField, LookupFields, LookupKind, PatchableMethod};

use crate::describe::captures::{THIS_FIELD, bound_names};
use crate::describe::{AccessMode, JobDescription, ScheduleMode};
use crate::error::{CompileError, DiagnosticCode};
use crate::semantic::{MethodScope, SymbolKind};
use lambdajob_ast::{
    Argument, Block, Expr, ExprKind, LiteralKind, NodeId, SourceMap, Span, TypeRef, fold_block,
    print_expr, walk_block, walk_expr,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Name of the entity-manager field used by rewritten bodies.
pub const ENTITY_MANAGER_FIELD: &str = "__entityManager";

/// Entity-manager methods that change the structure of entities.
pub const STRUCTURAL_METHODS: &[&str] = &[
    "CreateEntity",
    "DestroyEntity",
    "Instantiate",
    "AddComponent",
    "AddComponentData",
    "AddComponentObject",
    "AddBuffer",
    "AddSharedComponent",
    "AddSharedComponentManaged",
    "RemoveComponent",
    "SetSharedComponent",
    "SetSharedComponentManaged",
    "SetArchetype",
    "SetEnabled",
    "AddChunkComponentData",
    "RemoveChunkComponentData",
];

/// Lambda body after rewriting.
#[derive(Debug, Clone, PartialEq)]
pub struct RewrittenBody {
    pub body: Block,
    pub lookups: LookupFields,
    /// Source line of each top-level statement, parallel to `body.stmts`.
    /// Empty when line directives are disabled.
    pub lines: Vec<u32>,
    /// Path of the source file, for line directives.
    pub file: String,
    /// Whether the body reaches the entity manager.
    pub uses_entity_manager: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteOptions {
    pub emit_line_directives: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            emit_line_directives: true,
        }
    }
}

/// What replaces one node of the original body.
#[derive(Debug, Clone, PartialEq)]
enum Replacement {
    /// `this` → `__this`
    This,
    /// Implicit member `x` → `__this.x`
    ThisMember,
    /// `const` local → its value.
    Constant(String),
    EntityManager,
    /// Data-access call → lookup field.
    Lookup {
        field: String,
        shape: CallShape,
        /// Argument index holding the `isReadOnly` flag; dropped on rewrite.
        flag_arg: Option<usize>,
    },
}

/// Rewrite the body of `description`, recording lookup fields and
/// diagnostics on it.
pub fn rewrite(
    description: &mut JobDescription,
    scope: &MethodScope<'_>,
    sources: Option<&SourceMap>,
    options: &RewriteOptions,
) {
    let mut planner = Planner::new(description, scope);
    planner.plan(&description.body);
    let Planner {
        plan,
        lookups,
        diagnostics,
        uses_entity_manager,
        ..
    } = planner;

    let body = fold_block(description.body.clone(), &mut |expr| apply(expr, &plan));

    let (lines, file) = match sources {
        Some(sources) if options.emit_line_directives => {
            let lines = body
                .stmts
                .iter()
                .map(|stmt| sources.line_col(&stmt.span).0)
                .collect();
            let file = sources
                .file_path(&description.lambda_span)
                .display()
                .to_string()
                .replace('\\', "/");
            (lines, file)
        }
        _ => (Vec::new(), String::new()),
    };

    debug!(
        job = %description.name,
        replacements = plan.len(),
        lookups = lookups.len(),
        "rewrote lambda body"
    );

    description.diagnostics.extend(diagnostics);
    description.rewritten = Some(RewrittenBody {
        body,
        lookups,
        lines,
        file,
        uses_entity_manager,
    });
}

struct Planner<'d, 's> {
    description: &'d JobDescription,
    scope: &'d MethodScope<'s>,
    bound: HashSet<String>,
    plan: HashMap<NodeId, Replacement>,
    lookups: LookupFields,
    diagnostics: Vec<CompileError>,
    uses_entity_manager: bool,
    /// Ids that must keep their original meaning.
    untouched: HashSet<NodeId>,
}

impl<'d, 's> Planner<'d, 's> {
    fn new(description: &'d JobDescription, scope: &'d MethodScope<'s>) -> Self {
        let params = description.params.iter().map(|p| p.name.as_str());
        Self {
            description,
            scope,
            bound: bound_names(params, &description.body),
            plan: HashMap::new(),
            lookups: LookupFields::new(),
            diagnostics: Vec::new(),
            uses_entity_manager: false,
            untouched: HashSet::new(),
        }
    }

    fn plan(&mut self, body: &Block) {
        let mut nodes = Vec::new();
        walk_block(body, &mut |expr| nodes.push(expr));

        for expr in &nodes {
            self.mark_untouched(expr);
        }
        for expr in nodes {
            if self.untouched.contains(&expr.id) {
                continue;
            }
            match &expr.kind {
                ExprKind::This => {
                    self.plan.insert(expr.id, Replacement::This);
                }
                ExprKind::Name { name, .. } => self.plan_name(expr, name),
                ExprKind::Invoke { callee, args } => self.plan_invoke(expr, callee, args),
                _ => {}
            }
        }
    }

    /// Names inside `nameof`, and type names qualifying a static member
    /// when the containing type has a member of the same name.
    fn mark_untouched(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Nameof(inner) => walk_expr(inner, &mut |node| {
                self.untouched.insert(node.id);
            }),
            ExprKind::Member { target, name, .. } => {
                let scope = self.scope;
                let qualifies_static = target
                    .as_name()
                    .and_then(|qualifier| scope.types().get(qualifier))
                    .is_some_and(|info| info.has_static_member(name));
                if qualifies_static {
                    self.untouched.insert(target.id);
                }
            }
            _ => {}
        }
    }

    fn plan_name(&mut self, expr: &Expr, name: &str) {
        if self.bound.contains(name) {
            return;
        }
        let Some(symbol) = self.scope.resolve(name) else {
            return;
        };

        if symbol.is_outer_variable() {
            if let Some(value) = &symbol.const_value {
                let text = constants::const_text(value, symbol.ty.as_ref());
                self.plan.insert(expr.id, Replacement::Constant(text));
            }
            return;
        }
        if symbol.kind == SymbolKind::Field && name == "EntityManager" && !self.is_user_member(name) {
            self.uses_entity_manager = true;
            self.plan.insert(expr.id, Replacement::EntityManager);
            return;
        }
        if symbol.is_instance_member() {
            self.plan.insert(expr.id, Replacement::ThisMember);
        }
    }

    fn plan_invoke(&mut self, expr: &Expr, callee: &Expr, args: &[Argument]) {
        if let ExprKind::Member { target, name, .. } = &callee.kind {
            self.check_structural_call(expr, target, name);
        }

        let Some((name, type_args)) = patchable_callee(callee) else {
            return;
        };
        if self.is_user_member(name) {
            return;
        }
        let Some(method) = lookup::patchable_method(name) else {
            return;
        };
        let ty = match (method.is_generic(), type_args.first()) {
            (true, Some(ty)) => Some(ty.clone()),
            (true, None) => match self.inferred_type(method, args, expr.span) {
                Some(ty) => Some(ty),
                None => {
                    self.diagnostics.push(
                        CompileError::new(
                            DiagnosticCode::UninferredTypeArgument,
                            expr.span,
                            format!("cannot infer the component type of `{}`", method.name),
                        )
                        .with_note(format!("write it explicitly, e.g. `{}<T>(...)`", method.name)),
                    );
                    return;
                }
            },
            (false, _) => None,
        };

        self.untouched.insert(callee.id);
        walk_expr(callee, &mut |node| {
            self.untouched.insert(node.id);
        });

        let (access, flag_arg) = match method.access {
            AccessPolicy::Fixed(access) => (access, None),
            AccessPolicy::FromLiteralArg { index } => {
                (self.read_only_flag(method, args, index), Some(index))
            }
        };

        if let Some(ty) = &ty {
            self.check_aliasing(expr.span, method, ty, access);
        }

        let field = self.lookups.require(method.kind, ty.as_ref(), access).field_name();
        self.plan.insert(
            expr.id,
            Replacement::Lookup {
                field,
                shape: method.shape,
                flag_arg,
            },
        );
    }

    /// Type argument of `SetComponent(e, value)` written without one, from
    /// the value as seen at the call.
    fn inferred_type(&self, method: &PatchableMethod, args: &[Argument], position: Span) -> Option<TypeRef> {
        if method.shape != CallShape::IndexAssign {
            return None;
        }
        let value = &args.get(1)?.value;
        let params = self
            .description
            .params
            .iter()
            .map(|p| (p.name.as_str(), &p.declared, p.span));
        self.scope
            .within_body(params, &self.description.body, position)
            .type_of(value)
    }

    /// Access implied by an `isReadOnly` argument. A missing argument
    /// means read-write.
    fn read_only_flag(&mut self, method: &PatchableMethod, args: &[Argument], index: usize) -> AccessMode {
        let flag = args
            .iter()
            .find(|arg| arg.label.as_deref() == Some("isReadOnly"))
            .or_else(|| args.get(index).filter(|arg| arg.label.is_none()));
        let Some(flag) = flag else {
            return AccessMode::ReadWrite;
        };

        match &flag.value.unparenthesized().kind {
            ExprKind::Literal(literal) if literal.kind == LiteralKind::Bool => {
                if literal.text == "true" {
                    AccessMode::ReadOnly
                } else {
                    AccessMode::ReadWrite
                }
            }
            _ => {
                self.diagnostics.push(CompileError::new(
                    DiagnosticCode::ReadOnlyFlagNotLiteral,
                    flag.value.span,
                    format!(
                        "the read-only argument of `{}` must be a literal `true` or `false`",
                        method.name
                    ),
                ));
                AccessMode::ReadWrite
            }
        }
    }

    fn check_aliasing(&mut self, span: Span, method: &PatchableMethod, ty: &TypeRef, access: AccessMode) {
        let mode = self.description.schedule.mode;

        if mode == ScheduleMode::ScheduleParallel && access == AccessMode::ReadWrite {
            self.diagnostics.push(CompileError::new(
                DiagnosticCode::WriteLookupInParallel,
                span,
                format!(
                    "`{}<{}>` needs write access, which `ScheduleParallel()` does not allow",
                    method.name, ty
                ),
            ));
        }
        if mode == ScheduleMode::Run {
            return;
        }

        let Some(param) = self
            .description
            .params
            .iter()
            .find(|p| p.query_type() == Some(ty))
        else {
            return;
        };
        if access == AccessMode::ReadWrite {
            self.diagnostics.push(
                CompileError::new(
                    DiagnosticCode::WriteLookupAliasesParameter,
                    span,
                    format!(
                        "`{}<{}>` writes `{}`, which is also the lambda parameter `{}`",
                        method.name, ty, ty, param.name
                    ),
                )
                .with_label(param.span, "parameter declared here".to_string()),
            );
        } else if param.is_write() {
            self.diagnostics.push(
                CompileError::new(
                    DiagnosticCode::LookupAliasesWrittenParameter,
                    span,
                    format!(
                        "`{}<{}>` reads `{}`, which the lambda parameter `{}` writes",
                        method.name, ty, ty, param.name
                    ),
                )
                .with_label(param.span, "parameter declared here".to_string()),
            );
        }
    }

    fn check_structural_call(&mut self, call: &Expr, target: &Expr, name: &str) {
        let on_entity_manager = match &target.kind {
            ExprKind::Name { name, .. } => name == "EntityManager",
            ExprKind::Member { target, name, .. } => {
                name == "EntityManager" && matches!(target.kind, ExprKind::This)
            }
            _ => false,
        };
        if on_entity_manager
            && STRUCTURAL_METHODS.contains(&name)
            && !self.description.structural_changes
        {
            self.diagnostics.push(
                CompileError::new(
                    DiagnosticCode::StructuralChangeNotAllowed,
                    call.span,
                    format!("`EntityManager.{}` changes entity structure", name),
                )
                .with_note("use `WithStructuralChanges()` with `Run()`".to_string()),
            );
        }
    }

    fn is_user_member(&self, name: &str) -> bool {
        self.scope
            .types()
            .get(self.scope.containing_type())
            .is_some_and(|info| info.user_declared && info.has_instance_member(name))
    }
}

/// `M<T>(..)`, `this.M<T>(..)` or `SystemAPI.M<T>(..)`.
fn patchable_callee(callee: &Expr) -> Option<(&str, &[TypeRef])> {
    match &callee.kind {
        ExprKind::Name { name, type_args } => Some((name, type_args)),
        ExprKind::Member {
            target,
            name,
            type_args,
        } => match &target.kind {
            ExprKind::This => Some((name, type_args)),
            ExprKind::Name { name: receiver, .. } if receiver == "SystemAPI" => {
                Some((name, type_args))
            }
            _ => None,
        },
        _ => None,
    }
}

fn name_expr(name: &str, span: Span) -> Expr {
    Expr::synthetic(
        ExprKind::Name {
            name: name.to_string(),
            type_args: Vec::new(),
        },
        span,
    )
}

fn apply(expr: Expr, plan: &HashMap<NodeId, Replacement>) -> Expr {
    let Some(replacement) = plan.get(&expr.id) else {
        return expr;
    };
    let Expr { id, kind, span } = expr;

    let kind = match (replacement, kind) {
        (Replacement::This, _) => ExprKind::Name {
            name: THIS_FIELD.to_string(),
            type_args: Vec::new(),
        },
        (Replacement::ThisMember, ExprKind::Name { name, type_args }) => ExprKind::Member {
            target: Box::new(name_expr(THIS_FIELD, span)),
            name,
            type_args,
        },
        (Replacement::Constant(text), _) => ExprKind::Raw(text.clone()),
        (Replacement::EntityManager, _) => ExprKind::Name {
            name: ENTITY_MANAGER_FIELD.to_string(),
            type_args: Vec::new(),
        },
        (
            Replacement::Lookup {
                field,
                shape,
                flag_arg,
            },
            ExprKind::Invoke { args, .. },
        ) => lookup_call(field, *shape, *flag_arg, args, span),
        (_, kind) => kind,
    };
    Expr::new(id, kind, span)
}

fn lookup_call(
    field: &str,
    shape: CallShape,
    flag_arg: Option<usize>,
    args: Vec<Argument>,
    span: Span,
) -> ExprKind {
    let mut values: Vec<Expr> = args
        .into_iter()
        .enumerate()
        .filter(|(index, arg)| Some(*index) != flag_arg && arg.label.as_deref() != Some("isReadOnly"))
        .map(|(_, arg)| arg.value)
        .collect();
    let target = Box::new(name_expr(field, span));

    match shape {
        CallShape::Field => ExprKind::Name {
            name: field.to_string(),
            type_args: Vec::new(),
        },
        CallShape::Index => ExprKind::Index {
            target,
            args: values.drain(..values.len().min(1)).collect(),
        },
        CallShape::IndexAssign if values.len() >= 2 => {
            let value = values.remove(1);
            let entity = values.remove(0);
            ExprKind::Assign {
                op: lambdajob_ast::AssignOp::Assign,
                target: Box::new(Expr::synthetic(
                    ExprKind::Index {
                        target,
                        args: vec![entity],
                    },
                    span,
                )),
                value: Box::new(value),
            }
        }
        CallShape::IndexAssign => ExprKind::Raw(format!(
            "{}[{}]",
            field,
            values.iter().map(print_expr).collect::<Vec<_>>().join(", ")
        )),
        CallShape::Forward(method) => ExprKind::Invoke {
            callee: Box::new(Expr::synthetic(
                ExprKind::Member {
                    target,
                    name: method.to_string(),
                    type_args: Vec::new(),
                },
                span,
            )),
            args: values
                .into_iter()
                .map(|value| Argument {
                    ref_kind: Default::default(),
                    label: None,
                    value,
                })
                .collect(),
        },
    }
}

#[cfg(test)]
mod tests;
