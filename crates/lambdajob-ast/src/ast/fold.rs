//! Owned, post-order tree rewriting.
//!
//! `fold_*` consume a tree and rebuild it, handing every expression to the
//! rewrite closure after its children have already been rewritten. Node ids
//! are preserved unless the closure replaces a node, so side tables keyed by
//! [`NodeId`](super::NodeId) stay meaningful across the rewrite.

use super::syntax::*;

/// Rewrite an expression tree bottom-up.
pub fn fold_expr<F>(expr: Expr, rewrite: &mut F) -> Expr
where
    F: FnMut(Expr) -> Expr,
{
    let Expr { id, kind, span } = expr;

    let kind = match kind {
        kind @ (ExprKind::Literal(_)
        | ExprKind::Name { .. }
        | ExprKind::This
        | ExprKind::Typeof(_)
        | ExprKind::Raw(_)) => kind,

        ExprKind::Member {
            target,
            name,
            type_args,
        } => ExprKind::Member {
            target: fold_boxed(target, rewrite),
            name,
            type_args,
        },

        ExprKind::Invoke { callee, args } => ExprKind::Invoke {
            callee: fold_boxed(callee, rewrite),
            args: fold_args(args, rewrite),
        },

        ExprKind::Index { target, args } => ExprKind::Index {
            target: fold_boxed(target, rewrite),
            args: args.into_iter().map(|arg| fold_expr(arg, rewrite)).collect(),
        },

        ExprKind::New {
            ty,
            args,
            initializer,
        } => ExprKind::New {
            ty,
            args: fold_args(args, rewrite),
            initializer: initializer
                .into_iter()
                .map(|(name, value)| (name, fold_expr(value, rewrite)))
                .collect(),
        },

        ExprKind::Assign { op, target, value } => ExprKind::Assign {
            op,
            target: fold_boxed(target, rewrite),
            value: fold_boxed(value, rewrite),
        },

        ExprKind::Binary { op, left, right } => ExprKind::Binary {
            op,
            left: fold_boxed(left, rewrite),
            right: fold_boxed(right, rewrite),
        },

        ExprKind::Unary { op, operand } => ExprKind::Unary {
            op,
            operand: fold_boxed(operand, rewrite),
        },

        ExprKind::Cast { ty, operand } => ExprKind::Cast {
            ty,
            operand: fold_boxed(operand, rewrite),
        },

        ExprKind::Conditional {
            cond,
            then,
            otherwise,
        } => ExprKind::Conditional {
            cond: fold_boxed(cond, rewrite),
            then: fold_boxed(then, rewrite),
            otherwise: fold_boxed(otherwise, rewrite),
        },

        ExprKind::Lambda(lambda) => {
            let Lambda {
                params,
                body,
                is_static,
            } = *lambda;
            let body = match body {
                LambdaBody::Expr(body) => LambdaBody::Expr(fold_boxed(body, rewrite)),
                LambdaBody::Block(block) => LambdaBody::Block(fold_block(block, rewrite)),
            };
            ExprKind::Lambda(Box::new(Lambda {
                params,
                body,
                is_static,
            }))
        }

        ExprKind::Nameof(inner) => ExprKind::Nameof(fold_boxed(inner, rewrite)),
        ExprKind::Paren(inner) => ExprKind::Paren(fold_boxed(inner, rewrite)),
    };

    rewrite(Expr { id, kind, span })
}

fn fold_boxed<F>(expr: Box<Expr>, rewrite: &mut F) -> Box<Expr>
where
    F: FnMut(Expr) -> Expr,
{
    Box::new(fold_expr(*expr, rewrite))
}

fn fold_args<F>(args: Vec<Argument>, rewrite: &mut F) -> Vec<Argument>
where
    F: FnMut(Expr) -> Expr,
{
    args.into_iter()
        .map(|arg| Argument {
            ref_kind: arg.ref_kind,
            label: arg.label,
            value: fold_expr(arg.value, rewrite),
        })
        .collect()
}

/// Rewrite every expression inside a statement.
pub fn fold_stmt<F>(stmt: Stmt, rewrite: &mut F) -> Stmt
where
    F: FnMut(Expr) -> Expr,
{
    let Stmt { id, kind, span } = stmt;

    let kind = match kind {
        StmtKind::Block(block) => StmtKind::Block(fold_block(block, rewrite)),
        StmtKind::Local(decl) => StmtKind::Local(LocalDecl {
            declarators: decl
                .declarators
                .into_iter()
                .map(|declarator| VarDeclarator {
                    init: declarator.init.map(|init| fold_expr(init, rewrite)),
                    ..declarator
                })
                .collect(),
            ..decl
        }),
        StmtKind::Expr(expr) => StmtKind::Expr(fold_expr(expr, rewrite)),
        StmtKind::If {
            cond,
            then,
            otherwise,
        } => StmtKind::If {
            cond: fold_expr(cond, rewrite),
            then: Box::new(fold_stmt(*then, rewrite)),
            otherwise: otherwise.map(|stmt| Box::new(fold_stmt(*stmt, rewrite))),
        },
        StmtKind::For {
            init,
            cond,
            step,
            body,
        } => StmtKind::For {
            init: init
                .into_iter()
                .map(|stmt| fold_stmt(stmt, rewrite))
                .collect(),
            cond: cond.map(|cond| fold_expr(cond, rewrite)),
            step: step
                .into_iter()
                .map(|expr| fold_expr(expr, rewrite))
                .collect(),
            body: Box::new(fold_stmt(*body, rewrite)),
        },
        StmtKind::Foreach {
            ty,
            name,
            iterable,
            body,
        } => StmtKind::Foreach {
            ty,
            name,
            iterable: fold_expr(iterable, rewrite),
            body: Box::new(fold_stmt(*body, rewrite)),
        },
        StmtKind::While { cond, body } => StmtKind::While {
            cond: fold_expr(cond, rewrite),
            body: Box::new(fold_stmt(*body, rewrite)),
        },
        StmtKind::DoWhile { body, cond } => StmtKind::DoWhile {
            body: Box::new(fold_stmt(*body, rewrite)),
            cond: fold_expr(cond, rewrite),
        },
        StmtKind::Return(value) => StmtKind::Return(value.map(|value| fold_expr(value, rewrite))),
        StmtKind::LocalFunction(function) => {
            let function = *function;
            StmtKind::LocalFunction(Box::new(MethodDecl {
                body: function.body.map(|body| fold_block(body, rewrite)),
                ..function
            }))
        }
        kind @ (StmtKind::Break | StmtKind::Continue | StmtKind::Empty) => kind,
    };

    Stmt { id, kind, span }
}

/// Rewrite every expression inside a block.
pub fn fold_block<F>(block: Block, rewrite: &mut F) -> Block
where
    F: FnMut(Expr) -> Expr,
{
    Block {
        stmts: block
            .stmts
            .into_iter()
            .map(|stmt| fold_stmt(stmt, rewrite))
            .collect(),
        span: block.span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::Span;

    fn name(id: u32, text: &str) -> Expr {
        Expr::new(
            NodeId(id),
            ExprKind::Name {
                name: text.to_string(),
                type_args: Vec::new(),
            },
            Span::zero(0),
        )
    }

    #[test]
    fn test_fold_visits_children_first() {
        let expr = Expr::new(
            NodeId(0),
            ExprKind::Binary {
                op: BinaryOp::Mul,
                left: Box::new(name(1, "a")),
                right: Box::new(name(2, "b")),
            },
            Span::zero(0),
        );

        let mut order = Vec::new();
        let _ = fold_expr(expr, &mut |node| {
            order.push(node.id.0);
            node
        });
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_fold_replaces_by_node_id() {
        let expr = Expr::new(
            NodeId(0),
            ExprKind::Member {
                target: Box::new(name(1, "speed")),
                name: "Value".to_string(),
                type_args: Vec::new(),
            },
            Span::zero(0),
        );

        let folded = fold_expr(expr, &mut |node| {
            if node.id == NodeId(1) {
                Expr::new(node.id, ExprKind::Raw("__this.speed".to_string()), node.span)
            } else {
                node
            }
        });

        match folded.kind {
            ExprKind::Member { target, .. } => {
                assert_eq!(target.kind, ExprKind::Raw("__this.speed".to_string()));
            }
            other => panic!("expected member access, got {:?}", other),
        }
    }
}
