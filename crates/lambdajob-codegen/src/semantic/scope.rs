//! Identifier resolution inside a containing method.
//!
//! A [`MethodScope`] is built for one position in a method body (the span of
//! a lambda-job call) and answers what an identifier at that position refers
//! to: an outer local or parameter, a member of the containing type, or a
//! type.

use super::TypeTable;
use lambdajob_ast::{
    Block, Expr, ExprKind, LambdaBody, LiteralKind, LocalDecl, MethodDecl, Span, Stmt, StmtKind,
    TypeRef, walk_shallow_expr,
};

/// What an identifier resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Local,
    Parameter,
    Field,
    Method,
    Type,
}

/// A resolved identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Declared or inferred type, when known.
    pub ty: Option<TypeRef>,
    pub is_static: bool,
    /// Initializer of a `const` local.
    pub const_value: Option<Expr>,
    /// Bound through a `using` declaration.
    pub is_using: bool,
    pub span: Span,
}

impl Symbol {
    fn member(name: &str, kind: SymbolKind, ty: Option<TypeRef>, is_static: bool) -> Self {
        Self {
            name: name.to_string(),
            kind,
            ty,
            is_static,
            const_value: None,
            is_using: false,
            span: Span::zero(0),
        }
    }

    /// Local or parameter of the containing method.
    pub fn is_outer_variable(&self) -> bool {
        matches!(self.kind, SymbolKind::Local | SymbolKind::Parameter)
    }

    pub fn is_const(&self) -> bool {
        self.const_value.is_some()
    }

    /// Instance member of the containing type, reached through `this`.
    pub fn is_instance_member(&self) -> bool {
        matches!(self.kind, SymbolKind::Field | SymbolKind::Method) && !self.is_static
    }
}

/// Symbols visible at one position inside a method.
#[derive(Debug, Clone)]
pub struct MethodScope<'a> {
    /// Outer locals and parameters, in declaration order.
    locals: Vec<Symbol>,
    containing_type: String,
    types: &'a TypeTable,
}

impl<'a> MethodScope<'a> {
    /// Scope at `position` inside `method` of `containing_type`.
    pub fn at(
        method: &MethodDecl,
        containing_type: &str,
        types: &'a TypeTable,
        position: Span,
    ) -> Self {
        let mut scope = Self {
            locals: Vec::new(),
            containing_type: containing_type.to_string(),
            types,
        };
        for param in &method.params {
            scope.locals.push(Symbol {
                name: param.name.clone(),
                kind: SymbolKind::Parameter,
                ty: param.ty.clone(),
                is_static: false,
                const_value: None,
                is_using: false,
                span: param.span,
            });
        }
        if let Some(body) = &method.body {
            scope.collect_block(body, position);
        }
        scope
    }

    /// Scope at `position` inside a job body: this scope plus the job's
    /// parameters and the body locals declared before `position`.
    pub fn within_body<'p>(
        &self,
        params: impl IntoIterator<Item = (&'p str, &'p TypeRef, Span)>,
        body: &Block,
        position: Span,
    ) -> Self {
        let mut scope = self.clone();
        for (name, ty, span) in params {
            let ty = if ty.is_var() { None } else { Some(ty.clone()) };
            scope.push_local(name, ty, None, false, span);
        }
        scope.collect_block(body, position);
        scope
    }

    pub fn containing_type(&self) -> &str {
        &self.containing_type
    }

    pub fn types(&self) -> &TypeTable {
        self.types
    }

    /// Outer locals and parameters visible at the position.
    pub fn locals(&self) -> &[Symbol] {
        &self.locals
    }

    /// Resolve a simple identifier: locals first (innermost wins), then
    /// members of the containing type and its bases, then type names.
    pub fn resolve(&self, name: &str) -> Option<Symbol> {
        if let Some(local) = self.locals.iter().rev().find(|s| s.name == name) {
            return Some(local.clone());
        }

        if let Some(owner) = self.types.member_owner(&self.containing_type, name) {
            if let Some(ty) = owner.field_type(name) {
                return Some(Symbol::member(name, SymbolKind::Field, Some(ty.clone()), false));
            }
            if owner.methods.iter().any(|m| m == name) {
                return Some(Symbol::member(name, SymbolKind::Method, None, false));
            }
            let kind = if owner.static_methods.iter().any(|m| m == name) {
                SymbolKind::Method
            } else {
                SymbolKind::Field
            };
            return Some(Symbol::member(name, kind, None, true));
        }

        if self.types.contains(name) {
            return Some(Symbol::member(name, SymbolKind::Type, None, true));
        }
        None
    }

    /// Best-effort static type of an expression.
    pub fn type_of(&self, expr: &Expr) -> Option<TypeRef> {
        expr_type(expr, &self.locals, &self.containing_type, self.types)
    }

    fn collect_block(&mut self, block: &Block, position: Span) -> bool {
        for stmt in &block.stmts {
            if stmt.span.contains(&position) {
                self.collect_enclosing(stmt, position);
                return true;
            }
            if stmt.span.end <= position.start {
                self.declare_stmt(stmt);
            }
        }
        false
    }

    /// Descend into the statement that contains `position`.
    fn collect_enclosing(&mut self, stmt: &Stmt, position: Span) {
        match &stmt.kind {
            StmtKind::Block(block) => {
                self.collect_block(block, position);
            }
            StmtKind::Local(decl) => {
                for declarator in &decl.declarators {
                    match &declarator.init {
                        Some(init) if init.span.contains(&position) => {
                            self.collect_expr(init, position);
                            return;
                        }
                        _ => self.declare_local(decl, &declarator.name, declarator.init.as_ref(), declarator.span),
                    }
                }
            }
            StmtKind::Expr(expr) | StmtKind::Return(Some(expr)) => self.collect_expr(expr, position),
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.collect_expr(cond, position);
                for branch in std::iter::once(then).chain(otherwise) {
                    if branch.span.contains(&position) {
                        self.collect_enclosing(branch, position);
                    }
                }
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                for stmt in init {
                    if stmt.span.contains(&position) {
                        self.collect_enclosing(stmt, position);
                        return;
                    }
                    self.declare_stmt(stmt);
                }
                for expr in cond.iter().chain(step) {
                    self.collect_expr(expr, position);
                }
                if body.span.contains(&position) {
                    self.collect_enclosing(body, position);
                }
            }
            StmtKind::Foreach {
                ty,
                name,
                iterable,
                body,
            } => {
                if iterable.span.contains(&position) {
                    self.collect_expr(iterable, position);
                    return;
                }
                let ty = if ty.is_var() { None } else { Some(ty.clone()) };
                self.push_local(name, ty, None, false, stmt.span);
                if body.span.contains(&position) {
                    self.collect_enclosing(body, position);
                }
            }
            StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
                self.collect_expr(cond, position);
                if body.span.contains(&position) {
                    self.collect_enclosing(body, position);
                }
            }
            StmtKind::LocalFunction(function) => {
                for param in &function.params {
                    self.push_local(&param.name, param.ty.clone(), None, false, param.span);
                }
                if let Some(body) = &function.body {
                    self.collect_block(body, position);
                }
            }
            StmtKind::Return(None)
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Empty => {}
        }
    }

    /// Enter a lambda that encloses `position`, declaring its parameters.
    fn collect_expr<'e>(&mut self, expr: &'e Expr, position: Span) {
        if !expr.span.contains(&position) {
            return;
        }
        let mut enclosing = None;
        walk_shallow_expr(expr, &mut |node: &'e Expr| {
            if let ExprKind::Lambda(lambda) = &node.kind {
                if enclosing.is_none() && node.span.contains(&position) {
                    enclosing = Some(lambda);
                }
            }
        });

        let Some(lambda) = enclosing else {
            return;
        };
        for param in &lambda.params {
            self.push_local(&param.name, param.ty.clone(), None, false, param.span);
        }
        match &lambda.body {
            LambdaBody::Block(block) => {
                self.collect_block(block, position);
            }
            LambdaBody::Expr(body) => self.collect_expr(body, position),
        }
    }

    fn declare_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Local(decl) => {
                for declarator in &decl.declarators {
                    self.declare_local(decl, &declarator.name, declarator.init.as_ref(), declarator.span);
                }
            }
            StmtKind::LocalFunction(function) => {
                self.push_local(&function.name, None, None, false, function.span);
                if let Some(last) = self.locals.last_mut() {
                    last.kind = SymbolKind::Method;
                }
            }
            _ => {}
        }
    }

    fn declare_local(&mut self, decl: &LocalDecl, name: &str, init: Option<&Expr>, span: Span) {
        let ty = if decl.ty.is_var() {
            init.and_then(|init| self.type_of(init))
        } else {
            Some(decl.ty.clone())
        };
        let const_value = if decl.is_const { init.cloned() } else { None };
        self.push_local(name, ty, const_value, decl.is_using, span);
    }

    fn push_local(
        &mut self,
        name: &str,
        ty: Option<TypeRef>,
        const_value: Option<Expr>,
        is_using: bool,
        span: Span,
    ) {
        self.locals.push(Symbol {
            name: name.to_string(),
            kind: SymbolKind::Local,
            ty,
            is_static: false,
            const_value,
            is_using,
            span,
        });
    }
}

fn expr_type(
    expr: &Expr,
    locals: &[Symbol],
    containing_type: &str,
    types: &TypeTable,
) -> Option<TypeRef> {
    let simple = |name: &str| Some(TypeRef::simple(name, expr.span));

    match &expr.kind {
        ExprKind::Literal(literal) => match literal.kind {
            LiteralKind::Int => simple("int"),
            LiteralKind::Float => simple("float"),
            LiteralKind::Double => simple("double"),
            LiteralKind::Decimal => simple("decimal"),
            LiteralKind::String => simple("string"),
            LiteralKind::Char => simple("char"),
            LiteralKind::Bool => simple("bool"),
            LiteralKind::Null | LiteralKind::Default => None,
        },
        ExprKind::Name { name, type_args } if type_args.is_empty() => {
            match locals.iter().rev().find(|s| &s.name == name) {
                Some(local) => local.ty.clone(),
                None => types
                    .get(containing_type)
                    .and_then(|info| info.field_type(name))
                    .cloned(),
            }
        }
        ExprKind::This => simple(containing_type),
        ExprKind::New { ty, .. } | ExprKind::Cast { ty, .. } => Some(ty.clone()),
        ExprKind::Paren(inner) => expr_type(inner, locals, containing_type, types),
        ExprKind::Member { target, name, .. } => {
            let target_ty = expr_type(target, locals, containing_type, types)?;
            types.field_type(&target_ty, name).cloned()
        }
        ExprKind::Invoke { callee, .. } => match &callee.kind {
            ExprKind::Name { type_args, .. } | ExprKind::Member { type_args, .. }
                if type_args.len() == 1 =>
            {
                Some(type_args[0].clone())
            }
            _ => None,
        },
        ExprKind::Conditional { then, .. } => expr_type(then, locals, containing_type, types),
        ExprKind::Binary { left, .. } => expr_type(left, locals, containing_type, types),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambdajob_ast::{CompilationUnit, walk_block};
    use lambdajob_parser::parse_source;

    const SYSTEM: &str = r#"
        partial class S : SystemBase {
            float speed;
            static int total;
            void Helper() { }
            void OnUpdate(float scale) {
                const float k = 2f;
                var counter = 0;
                using var guard = new NativeArray<int>(4, Allocator.Temp);
                { var hidden = 1; }
                Entities.ForEach((ref Foo f) => { f.Value = marker; }).Run();
                var after = 3;
            }
        }
    "#;

    fn parse(source: &str) -> CompilationUnit {
        parse_source(source, 0).unwrap()
    }

    /// Span of the first expression statement in the method body.
    fn call_span(method: &MethodDecl) -> Span {
        method
            .body
            .as_ref()
            .unwrap()
            .stmts
            .iter()
            .find_map(|stmt| match &stmt.kind {
                StmtKind::Expr(expr) => Some(expr.span),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_locals_visible_before_position() {
        let unit = parse(SYSTEM);
        let types = TypeTable::from_units([&unit]);
        let method = unit.types[0].methods().find(|m| m.name == "OnUpdate").unwrap();
        let scope = MethodScope::at(method, "S", &types, call_span(method));

        let names: Vec<_> = scope.locals().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["scale", "k", "counter", "guard"]);

        let k = scope.resolve("k").unwrap();
        assert!(k.is_const());
        assert!(scope.resolve("guard").unwrap().is_using);
        assert_eq!(scope.resolve("counter").unwrap().ty.unwrap().name, "int");
        assert!(scope.resolve("after").is_none());
        assert!(scope.resolve("hidden").is_none());
    }

    #[test]
    fn test_members_and_types() {
        let unit = parse(SYSTEM);
        let types = TypeTable::from_units([&unit]);
        let method = unit.types[0].methods().find(|m| m.name == "OnUpdate").unwrap();
        let scope = MethodScope::at(method, "S", &types, call_span(method));

        let speed = scope.resolve("speed").unwrap();
        assert!(speed.is_instance_member());
        assert_eq!(speed.ty.unwrap().name, "float");

        assert!(scope.resolve("Helper").unwrap().is_instance_member());
        assert!(!scope.resolve("total").unwrap().is_instance_member());
        assert!(scope.resolve("EntityManager").unwrap().is_instance_member());
        assert_eq!(scope.resolve("Entity").unwrap().kind, SymbolKind::Type);
    }

    #[test]
    fn test_enclosing_lambda_params_are_visible() {
        let unit = parse(
            r#"
            partial class S : SystemBase {
                void OnUpdate() {
                    list.ForEach(item => { Job.WithCode(() => { }).Run(); });
                }
            }
            "#,
        );
        let types = TypeTable::from_units([&unit]);
        let method = unit.types[0].methods().next().unwrap();

        let mut inner = None;
        walk_block(method.body.as_ref().unwrap(), &mut |expr| {
            if let ExprKind::Lambda(lambda) = &expr.kind {
                if lambda.params.is_empty() {
                    inner = Some(expr.span);
                }
            }
        });

        let scope = MethodScope::at(method, "S", &types, inner.unwrap());
        assert_eq!(scope.resolve("item").unwrap().kind, SymbolKind::Local);
    }
}
