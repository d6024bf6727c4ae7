//! Rendering syntax nodes back to source text.
//!
//! The printer keeps parenthesised sub-expressions as written (the parser
//! preserves `Paren` nodes), so no precedence analysis is needed to
//! reproduce the original grouping. Indentation is four spaces per level.

use super::syntax::*;

const INDENT: &str = "    ";

/// Render an expression on a single logical line.
///
/// Block-bodied lambdas span several lines and are indented from column zero.
pub fn print_expr(expr: &Expr) -> String {
    let mut printer = Printer::new(0);
    printer.expr(expr);
    printer.out
}

/// Render a statement at the given indentation level, newline-terminated.
pub fn print_stmt(stmt: &Stmt, indent: usize) -> String {
    let mut printer = Printer::new(indent);
    printer.stmt(stmt);
    printer.out
}

/// Render a block (`{ ... }`) whose braces sit at the given indentation level.
///
/// The opening brace is not indented (it follows the caller's text); the
/// closing brace is, and no trailing newline is written.
pub fn print_block(block: &Block, indent: usize) -> String {
    let mut printer = Printer::new(indent);
    printer.block(block);
    printer.out
}

struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn new(indent: usize) -> Self {
        Self {
            out: String::new(),
            indent,
        }
    }

    fn pad(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
    }

    fn line_end(&mut self) {
        self.out.push('\n');
    }

    fn block(&mut self, block: &Block) {
        self.out.push_str("{\n");
        self.indent += 1;
        for stmt in &block.stmts {
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.pad();
        self.out.push('}');
    }

    /// Body of an `if`/loop: blocks stay on the header line, other statements
    /// go on their own indented line.
    fn nested_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Block(block) => {
                self.out.push(' ');
                self.block(block);
                self.line_end();
            }
            _ => {
                self.line_end();
                self.indent += 1;
                self.stmt(stmt);
                self.indent -= 1;
            }
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        self.pad();
        match &stmt.kind {
            StmtKind::Block(block) => {
                self.block(block);
                self.line_end();
            }
            StmtKind::Local(decl) => {
                self.local(decl);
                self.out.push_str(";\n");
            }
            StmtKind::Expr(expr) => {
                self.expr(expr);
                self.out.push_str(";\n");
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.out.push_str("if (");
                self.expr(cond);
                self.out.push(')');
                self.nested_stmt(then);
                if let Some(otherwise) = otherwise {
                    self.pad();
                    self.out.push_str("else");
                    if matches!(otherwise.kind, StmtKind::If { .. }) {
                        self.out.push(' ');
                        let text = print_stmt(otherwise, self.indent);
                        self.out.push_str(text.trim_start());
                    } else {
                        self.nested_stmt(otherwise);
                    }
                }
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                self.out.push_str("for (");
                let init = init
                    .iter()
                    .map(|stmt| print_stmt(stmt, 0).trim_end().trim_end_matches(';').to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                self.out.push_str(&init);
                self.out.push_str("; ");
                if let Some(cond) = cond {
                    self.expr(cond);
                }
                self.out.push_str("; ");
                for (idx, expr) in step.iter().enumerate() {
                    if idx > 0 {
                        self.out.push_str(", ");
                    }
                    self.expr(expr);
                }
                self.out.push(')');
                self.nested_stmt(body);
            }
            StmtKind::Foreach {
                ty,
                name,
                iterable,
                body,
            } => {
                self.out.push_str(&format!("foreach ({} {} in ", ty, name));
                self.expr(iterable);
                self.out.push(')');
                self.nested_stmt(body);
            }
            StmtKind::While { cond, body } => {
                self.out.push_str("while (");
                self.expr(cond);
                self.out.push(')');
                self.nested_stmt(body);
            }
            StmtKind::DoWhile { body, cond } => {
                self.out.push_str("do");
                self.nested_stmt(body);
                self.pad();
                self.out.push_str("while (");
                self.expr(cond);
                self.out.push_str(");\n");
            }
            StmtKind::Return(value) => {
                self.out.push_str("return");
                if let Some(value) = value {
                    self.out.push(' ');
                    self.expr(value);
                }
                self.out.push_str(";\n");
            }
            StmtKind::Break => self.out.push_str("break;\n"),
            StmtKind::Continue => self.out.push_str("continue;\n"),
            StmtKind::LocalFunction(function) => {
                self.out.push_str(&function.signature());
                match &function.body {
                    Some(body) => {
                        self.line_end();
                        self.pad();
                        self.block(body);
                        self.line_end();
                    }
                    None => self.out.push_str(";\n"),
                }
            }
            StmtKind::Empty => self.out.push_str(";\n"),
        }
    }

    fn local(&mut self, decl: &LocalDecl) {
        if decl.is_using {
            self.out.push_str("using ");
        }
        if decl.is_const {
            self.out.push_str("const ");
        }
        self.out.push_str(&decl.ty.to_string());
        self.out.push(' ');
        for (idx, declarator) in decl.declarators.iter().enumerate() {
            if idx > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(&declarator.name);
            if let Some(init) = &declarator.init {
                self.out.push_str(" = ");
                self.expr(init);
            }
        }
    }

    fn type_args(&mut self, args: &[TypeRef]) {
        if args.is_empty() {
            return;
        }
        let args = args
            .iter()
            .map(TypeRef::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        self.out.push('<');
        self.out.push_str(&args);
        self.out.push('>');
    }

    fn args(&mut self, args: &[Argument]) {
        for (idx, arg) in args.iter().enumerate() {
            if idx > 0 {
                self.out.push_str(", ");
            }
            if let Some(label) = &arg.label {
                self.out.push_str(label);
                self.out.push_str(": ");
            }
            self.out.push_str(arg.ref_kind.prefix());
            self.expr(&arg.value);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal(literal) => self.out.push_str(&literal.text),
            ExprKind::Name { name, type_args } => {
                self.out.push_str(name);
                self.type_args(type_args);
            }
            ExprKind::This => self.out.push_str("this"),
            ExprKind::Member {
                target,
                name,
                type_args,
            } => {
                self.expr(target);
                self.out.push('.');
                self.out.push_str(name);
                self.type_args(type_args);
            }
            ExprKind::Invoke { callee, args } => {
                self.expr(callee);
                self.out.push('(');
                self.args(args);
                self.out.push(')');
            }
            ExprKind::Index { target, args } => {
                self.expr(target);
                self.out.push('[');
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        self.out.push_str(", ");
                    }
                    self.expr(arg);
                }
                self.out.push(']');
            }
            ExprKind::New {
                ty,
                args,
                initializer,
            } => {
                self.out.push_str("new ");
                self.out.push_str(&ty.to_string());
                if !args.is_empty() || initializer.is_empty() {
                    self.out.push('(');
                    self.args(args);
                    self.out.push(')');
                }
                if !initializer.is_empty() {
                    self.out.push_str(" { ");
                    for (idx, (name, value)) in initializer.iter().enumerate() {
                        if idx > 0 {
                            self.out.push_str(", ");
                        }
                        self.out.push_str(name);
                        self.out.push_str(" = ");
                        self.expr(value);
                    }
                    self.out.push_str(" }");
                }
            }
            ExprKind::Assign { op, target, value } => {
                self.expr(target);
                self.out.push(' ');
                self.out.push_str(op.symbol());
                self.out.push(' ');
                self.expr(value);
            }
            ExprKind::Binary { op, left, right } => {
                self.expr(left);
                self.out.push(' ');
                self.out.push_str(op.symbol());
                self.out.push(' ');
                self.expr(right);
            }
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Neg => self.prefixed("-", operand),
                UnaryOp::Plus => self.prefixed("+", operand),
                UnaryOp::Not => self.prefixed("!", operand),
                UnaryOp::BitNot => self.prefixed("~", operand),
                UnaryOp::PreInc => self.prefixed("++", operand),
                UnaryOp::PreDec => self.prefixed("--", operand),
                UnaryOp::PostInc => {
                    self.expr(operand);
                    self.out.push_str("++");
                }
                UnaryOp::PostDec => {
                    self.expr(operand);
                    self.out.push_str("--");
                }
            },
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond);
                self.out.push_str(" ? ");
                self.expr(then);
                self.out.push_str(" : ");
                self.expr(otherwise);
            }
            ExprKind::Cast { ty, operand } => {
                self.out.push('(');
                self.out.push_str(&ty.to_string());
                self.out.push(')');
                self.expr(operand);
            }
            ExprKind::Lambda(lambda) => self.lambda(lambda),
            ExprKind::Nameof(inner) => {
                self.out.push_str("nameof(");
                self.expr(inner);
                self.out.push(')');
            }
            ExprKind::Typeof(ty) => {
                self.out.push_str("typeof(");
                self.out.push_str(&ty.to_string());
                self.out.push(')');
            }
            ExprKind::Paren(inner) => {
                self.out.push('(');
                self.expr(inner);
                self.out.push(')');
            }
            ExprKind::Raw(text) => self.out.push_str(text),
        }
    }

    fn prefixed(&mut self, op: &str, operand: &Expr) {
        self.out.push_str(op);
        // `- -x` must not collapse into `--x`
        if let ExprKind::Unary {
            op: UnaryOp::Neg | UnaryOp::PreDec,
            ..
        } = operand.kind
        {
            if op == "-" {
                self.out.push(' ');
            }
        }
        self.expr(operand);
    }

    fn lambda(&mut self, lambda: &Lambda) {
        if lambda.is_static {
            self.out.push_str("static ");
        }
        let params = lambda
            .params
            .iter()
            .map(Param::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let single_untyped = lambda.params.len() == 1
            && lambda.params[0].ty.is_none()
            && lambda.params[0].ref_kind == RefKind::None;
        if single_untyped {
            self.out.push_str(&params);
        } else {
            self.out.push('(');
            self.out.push_str(&params);
            self.out.push(')');
        }
        self.out.push_str(" => ");
        match &lambda.body {
            LambdaBody::Expr(body) => self.expr(body),
            LambdaBody::Block(block) => self.block(block),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::Span;

    fn span() -> Span {
        Span::zero(0)
    }

    fn name(text: &str) -> Expr {
        Expr::new(
            NodeId(0),
            ExprKind::Name {
                name: text.to_string(),
                type_args: Vec::new(),
            },
            span(),
        )
    }

    fn literal(kind: LiteralKind, text: &str) -> Expr {
        Expr::new(
            NodeId(0),
            ExprKind::Literal(Literal {
                kind,
                text: text.to_string(),
            }),
            span(),
        )
    }

    fn member(target: Expr, field: &str) -> Expr {
        Expr::new(
            NodeId(0),
            ExprKind::Member {
                target: Box::new(target),
                name: field.to_string(),
                type_args: Vec::new(),
            },
            span(),
        )
    }

    #[test]
    fn test_print_compound_assignment() {
        let expr = Expr::new(
            NodeId(0),
            ExprKind::Assign {
                op: AssignOp::Add,
                target: Box::new(member(name("t"), "Value")),
                value: Box::new(Expr::new(
                    NodeId(0),
                    ExprKind::Binary {
                        op: BinaryOp::Mul,
                        left: Box::new(member(name("v"), "Value")),
                        right: Box::new(name("dt")),
                    },
                    span(),
                )),
            },
            span(),
        );
        assert_eq!(print_expr(&expr), "t.Value += v.Value * dt");
    }

    #[test]
    fn test_print_generic_invocation() {
        let callee = Expr::new(
            NodeId(0),
            ExprKind::Name {
                name: "GetComponent".to_string(),
                type_args: vec![TypeRef::simple("Foo", span())],
            },
            span(),
        );
        let expr = Expr::new(
            NodeId(0),
            ExprKind::Invoke {
                callee: Box::new(callee),
                args: vec![Argument {
                    ref_kind: RefKind::None,
                    label: None,
                    value: name("e"),
                }],
            },
            span(),
        );
        assert_eq!(print_expr(&expr), "GetComponent<Foo>(e)");
    }

    #[test]
    fn test_print_negated_negative_literal() {
        let expr = Expr::new(
            NodeId(0),
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(Expr::new(
                    NodeId(0),
                    ExprKind::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(literal(LiteralKind::Int, "1")),
                    },
                    span(),
                )),
            },
            span(),
        );
        assert_eq!(print_expr(&expr), "- -1");
    }

    #[test]
    fn test_print_if_else_block() {
        let stmt = Stmt {
            id: NodeId(0),
            kind: StmtKind::If {
                cond: name("ok"),
                then: Box::new(Stmt {
                    id: NodeId(1),
                    kind: StmtKind::Block(Block {
                        stmts: vec![Stmt {
                            id: NodeId(2),
                            kind: StmtKind::Return(None),
                            span: span(),
                        }],
                        span: span(),
                    }),
                    span: span(),
                }),
                otherwise: Some(Box::new(Stmt {
                    id: NodeId(3),
                    kind: StmtKind::Break,
                    span: span(),
                })),
            },
            span: span(),
        };

        let text = print_stmt(&stmt, 1);
        assert_eq!(
            text,
            "    if (ok) {\n        return;\n    }\n    else\n        break;\n"
        );
    }

    #[test]
    fn test_print_local_declaration() {
        let stmt = Stmt {
            id: NodeId(0),
            kind: StmtKind::Local(LocalDecl {
                ty: TypeRef::simple("var", span()),
                declarators: vec![VarDeclarator {
                    name: "bar".to_string(),
                    init: Some(literal(LiteralKind::Float, "1.5f")),
                    span: span(),
                }],
                is_const: false,
                is_using: false,
            }),
            span: span(),
        };
        assert_eq!(print_stmt(&stmt, 0), "var bar = 1.5f;\n");
    }
}
