//! Read-only tree walking.
//!
//! Shared traversal so the scanner, the capture analysis and the body
//! rewriter do not each re-implement recursive descent.
//!
//! # Design
//!
//! - Closure-based visitors, no visitor trait
//! - Pre-order: the visitor sees a node before its children
//! - Lambda bodies and local function bodies are descended into; callers that
//!   must stop at a lambda boundary check for `ExprKind::Lambda` themselves
//!
//! # Examples
//!
//! ```rust,ignore
//! let mut invocations = 0;
//! walk_block(&body, &mut |expr| {
//!     if matches!(expr.kind, ExprKind::Invoke { .. }) {
//!         invocations += 1;
//!     }
//! });
//! ```

use super::syntax::*;

/// Walk an expression tree in pre-order, calling `visitor` for every expression.
pub fn walk_expr<'a, V>(expr: &'a Expr, visitor: &mut V)
where
    V: FnMut(&'a Expr),
{
    visitor(expr);

    match &expr.kind {
        ExprKind::Literal(_)
        | ExprKind::Name { .. }
        | ExprKind::This
        | ExprKind::Typeof(_)
        | ExprKind::Raw(_) => {}

        ExprKind::Member { target, .. } => walk_expr(target, visitor),

        ExprKind::Invoke { callee, args } => {
            walk_expr(callee, visitor);
            for arg in args {
                walk_expr(&arg.value, visitor);
            }
        }

        ExprKind::Index { target, args } => {
            walk_expr(target, visitor);
            for arg in args {
                walk_expr(arg, visitor);
            }
        }

        ExprKind::New {
            args, initializer, ..
        } => {
            for arg in args {
                walk_expr(&arg.value, visitor);
            }
            for (_, value) in initializer {
                walk_expr(value, visitor);
            }
        }

        ExprKind::Assign { target, value, .. } => {
            walk_expr(target, visitor);
            walk_expr(value, visitor);
        }

        ExprKind::Binary { left, right, .. } => {
            walk_expr(left, visitor);
            walk_expr(right, visitor);
        }

        ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } => {
            walk_expr(operand, visitor)
        }

        ExprKind::Conditional {
            cond,
            then,
            otherwise,
        } => {
            walk_expr(cond, visitor);
            walk_expr(then, visitor);
            walk_expr(otherwise, visitor);
        }

        ExprKind::Lambda(lambda) => match &lambda.body {
            LambdaBody::Expr(body) => walk_expr(body, visitor),
            LambdaBody::Block(block) => walk_block(block, visitor),
        },

        ExprKind::Nameof(inner) | ExprKind::Paren(inner) => walk_expr(inner, visitor),
    }
}

/// Walk every expression contained in a statement.
pub fn walk_stmt<'a, V>(stmt: &'a Stmt, visitor: &mut V)
where
    V: FnMut(&'a Expr),
{
    match &stmt.kind {
        StmtKind::Block(block) => walk_block(block, visitor),
        StmtKind::Local(decl) => {
            for declarator in &decl.declarators {
                if let Some(init) = &declarator.init {
                    walk_expr(init, visitor);
                }
            }
        }
        StmtKind::Expr(expr) => walk_expr(expr, visitor),
        StmtKind::If {
            cond,
            then,
            otherwise,
        } => {
            walk_expr(cond, visitor);
            walk_stmt(then, visitor);
            if let Some(otherwise) = otherwise {
                walk_stmt(otherwise, visitor);
            }
        }
        StmtKind::For {
            init,
            cond,
            step,
            body,
        } => {
            for stmt in init {
                walk_stmt(stmt, visitor);
            }
            if let Some(cond) = cond {
                walk_expr(cond, visitor);
            }
            for expr in step {
                walk_expr(expr, visitor);
            }
            walk_stmt(body, visitor);
        }
        StmtKind::Foreach { iterable, body, .. } => {
            walk_expr(iterable, visitor);
            walk_stmt(body, visitor);
        }
        StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
            walk_expr(cond, visitor);
            walk_stmt(body, visitor);
        }
        StmtKind::Return(value) => {
            if let Some(value) = value {
                walk_expr(value, visitor);
            }
        }
        StmtKind::LocalFunction(function) => {
            if let Some(body) = &function.body {
                walk_block(body, visitor);
            }
        }
        StmtKind::Break | StmtKind::Continue | StmtKind::Empty => {}
    }
}

/// Walk every expression contained in a block.
pub fn walk_block<'a, V>(block: &'a Block, visitor: &mut V)
where
    V: FnMut(&'a Expr),
{
    for stmt in &block.stmts {
        walk_stmt(stmt, visitor);
    }
}

/// Walk every statement in a block in pre-order, including statements of
/// lambda bodies and local functions nested anywhere below it.
pub fn walk_block_stmts<'a, V>(block: &'a Block, visitor: &mut V)
where
    V: FnMut(&'a Stmt),
{
    for stmt in &block.stmts {
        walk_stmt_tree(stmt, visitor);
    }
}

fn walk_stmt_tree<'a, V>(stmt: &'a Stmt, visitor: &mut V)
where
    V: FnMut(&'a Stmt),
{
    visitor(stmt);

    let mut lambdas = Vec::new();
    match &stmt.kind {
        StmtKind::Block(block) => walk_block_stmts(block, visitor),
        StmtKind::If {
            cond,
            then,
            otherwise,
        } => {
            lambda_blocks(cond, &mut lambdas);
            walk_lambda_blocks(&lambdas, visitor);
            walk_stmt_tree(then, visitor);
            if let Some(otherwise) = otherwise {
                walk_stmt_tree(otherwise, visitor);
            }
        }
        StmtKind::For {
            init,
            cond,
            step,
            body,
        } => {
            for stmt in init {
                walk_stmt_tree(stmt, visitor);
            }
            if let Some(cond) = cond {
                lambda_blocks(cond, &mut lambdas);
            }
            for expr in step {
                lambda_blocks(expr, &mut lambdas);
            }
            walk_lambda_blocks(&lambdas, visitor);
            walk_stmt_tree(body, visitor);
        }
        StmtKind::Foreach { iterable, body, .. } => {
            lambda_blocks(iterable, &mut lambdas);
            walk_lambda_blocks(&lambdas, visitor);
            walk_stmt_tree(body, visitor);
        }
        StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
            lambda_blocks(cond, &mut lambdas);
            walk_lambda_blocks(&lambdas, visitor);
            walk_stmt_tree(body, visitor);
        }
        StmtKind::LocalFunction(function) => {
            if let Some(body) = &function.body {
                walk_block_stmts(body, visitor);
            }
        }
        StmtKind::Local(decl) => {
            for declarator in &decl.declarators {
                if let Some(init) = &declarator.init {
                    lambda_blocks(init, &mut lambdas);
                }
            }
            walk_lambda_blocks(&lambdas, visitor);
        }
        StmtKind::Expr(expr) | StmtKind::Return(Some(expr)) => {
            lambda_blocks(expr, &mut lambdas);
            walk_lambda_blocks(&lambdas, visitor);
        }
        StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue | StmtKind::Empty => {}
    }
}

fn walk_lambda_blocks<'a, V>(blocks: &[&'a Block], visitor: &mut V)
where
    V: FnMut(&'a Stmt),
{
    for block in blocks {
        walk_block_stmts(block, visitor);
    }
}

/// Block bodies of lambdas directly inside `expr` (not nested in other lambdas).
fn lambda_blocks<'a>(expr: &'a Expr, out: &mut Vec<&'a Block>) {
    walk_shallow_expr(expr, &mut |node: &'a Expr| {
        if let ExprKind::Lambda(lambda) = &node.kind {
            if let LambdaBody::Block(block) = &lambda.body {
                out.push(block);
            }
        }
    });
}

/// Pre-order expression walk that does not descend into lambda bodies.
pub fn walk_shallow_expr<'a, V>(expr: &'a Expr, visitor: &mut V)
where
    V: FnMut(&'a Expr),
{
    visitor(expr);

    match &expr.kind {
        ExprKind::Literal(_)
        | ExprKind::Name { .. }
        | ExprKind::This
        | ExprKind::Typeof(_)
        | ExprKind::Raw(_)
        | ExprKind::Lambda(_) => {}
        ExprKind::Member { target, .. } => walk_shallow_expr(target, visitor),
        ExprKind::Invoke { callee, args } => {
            walk_shallow_expr(callee, visitor);
            for arg in args {
                walk_shallow_expr(&arg.value, visitor);
            }
        }
        ExprKind::Index { target, args } => {
            walk_shallow_expr(target, visitor);
            for arg in args {
                walk_shallow_expr(arg, visitor);
            }
        }
        ExprKind::New {
            args, initializer, ..
        } => {
            for arg in args {
                walk_shallow_expr(&arg.value, visitor);
            }
            for (_, value) in initializer {
                walk_shallow_expr(value, visitor);
            }
        }
        ExprKind::Assign { target, value, .. } => {
            walk_shallow_expr(target, visitor);
            walk_shallow_expr(value, visitor);
        }
        ExprKind::Binary { left, right, .. } => {
            walk_shallow_expr(left, visitor);
            walk_shallow_expr(right, visitor);
        }
        ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } => {
            walk_shallow_expr(operand, visitor)
        }
        ExprKind::Conditional {
            cond,
            then,
            otherwise,
        } => {
            walk_shallow_expr(cond, visitor);
            walk_shallow_expr(then, visitor);
            walk_shallow_expr(otherwise, visitor);
        }
        ExprKind::Nameof(inner) | ExprKind::Paren(inner) => walk_shallow_expr(inner, visitor),
    }
}
