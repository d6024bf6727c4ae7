//! Syntax tree node definitions.
//!
//! Every statement and expression carries a [`NodeId`] assigned once by the
//! parser. Later passes key side tables by this id instead of relying on node
//! identity, so the ids stay valid across clones and rewrites.

use crate::foundation::Span;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Stable identifier of a statement or expression within one compilation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Id used for nodes synthesized by the code generator.
pub const SYNTHETIC_NODE: NodeId = NodeId(u32::MAX);

/// One parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilationUnit {
    pub file_id: u16,
    /// `using` directives, as dotted names.
    pub usings: Vec<String>,
    /// Top-level types (namespaces are flattened into `TypeDecl::namespace`).
    pub types: Vec<TypeDecl>,
}

/// Declaration modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Public,
    Private,
    Protected,
    Internal,
    Static,
    Readonly,
    Partial,
    Override,
    Virtual,
    Abstract,
    Sealed,
    Unsafe,
    Const,
}

/// Kind of type declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeDeclKind {
    Struct,
    Class,
    Interface,
}

/// `[Name(args)]` attribute usage.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeUse {
    pub name: String,
    pub args: Vec<Argument>,
    pub span: Span,
}

/// A struct, class or interface declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    /// Enclosing namespace, dotted.
    pub namespace: Option<String>,
    pub kind: TypeDeclKind,
    pub modifiers: Vec<Modifier>,
    pub attributes: Vec<AttributeUse>,
    pub type_params: Vec<String>,
    /// Base class and implemented interfaces, in declaration order.
    pub bases: Vec<TypeRef>,
    pub members: Vec<Member>,
    pub nested: Vec<TypeDecl>,
    pub span: Span,
}

impl TypeDecl {
    pub fn has_modifier(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    /// Methods declared directly in this type.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDecl> {
        self.members.iter().filter_map(|member| match member {
            Member::Method(method) => Some(method),
            Member::Field(_) => None,
        })
    }

    /// Fields declared directly in this type.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.members.iter().filter_map(|member| match member {
            Member::Field(field) => Some(field),
            Member::Method(_) => None,
        })
    }
}

/// Type member.
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Field(FieldDecl),
    Method(MethodDecl),
}

/// Field, const field or auto-property declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub modifiers: Vec<Modifier>,
    pub attributes: Vec<AttributeUse>,
    pub ty: TypeRef,
    pub declarators: Vec<VarDeclarator>,
    /// Declared as `{ get; set; }`.
    pub is_property: bool,
    pub span: Span,
}

impl FieldDecl {
    pub fn is_static(&self) -> bool {
        self.modifiers.contains(&Modifier::Static) || self.is_const()
    }

    pub fn is_const(&self) -> bool {
        self.modifiers.contains(&Modifier::Const)
    }
}

/// Method or local function declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub modifiers: Vec<Modifier>,
    pub attributes: Vec<AttributeUse>,
    pub return_type: TypeRef,
    pub name: String,
    pub type_params: Vec<String>,
    pub params: Vec<Param>,
    pub body: Option<Block>,
    pub span: Span,
}

impl MethodDecl {
    pub fn is_static(&self) -> bool {
        self.modifiers.contains(&Modifier::Static)
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    /// Human-readable signature, e.g. `void OnUpdate(float dt)`.
    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(Param::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let generics = if self.type_params.is_empty() {
            String::new()
        } else {
            format!("<{}>", self.type_params.join(", "))
        };
        format!("{} {}{}({})", self.return_type, self.name, generics, params)
    }
}

/// `ref`/`in`/`out` modifier on a parameter or argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RefKind {
    #[default]
    None,
    Ref,
    In,
    Out,
}

impl RefKind {
    /// Keyword text including a trailing space, empty for by-value.
    pub fn prefix(self) -> &'static str {
        match self {
            RefKind::None => "",
            RefKind::Ref => "ref ",
            RefKind::In => "in ",
            RefKind::Out => "out ",
        }
    }
}

/// Method or lambda parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ref_kind: RefKind,
    /// `None` for implicitly typed lambda parameters.
    pub ty: Option<TypeRef>,
    pub name: String,
    pub span: Span,
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ty {
            Some(ty) => write!(f, "{}{} {}", self.ref_kind.prefix(), ty, self.name),
            None => write!(f, "{}{}", self.ref_kind.prefix(), self.name),
        }
    }
}

/// Reference to a type, e.g. `DynamicBuffer<Elem>` or `int[]`.
///
/// Equality and hashing ignore `span`: two mentions of the same type are
/// the same type.
#[derive(Debug, Clone)]
pub struct TypeRef {
    /// Dotted name as written (`EntityCommandBuffer.ParallelWriter`).
    pub name: String,
    pub args: Vec<TypeRef>,
    pub array_rank: u8,
    pub nullable: bool,
    pub span: Span,
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.args == other.args
            && self.array_rank == other.array_rank
            && self.nullable == other.nullable
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.args.hash(state);
        self.array_rank.hash(state);
        self.nullable.hash(state);
    }
}

impl TypeRef {
    pub fn simple(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            array_rank: 0,
            nullable: false,
            span,
        }
    }

    /// Last segment of the dotted name.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn is_var(&self) -> bool {
        self.name == "var" && self.args.is_empty() && self.array_rank == 0
    }

    /// Identifier-safe rendering: `Ns.Foo<Bar>` becomes `Ns_Foo_Bar`.
    pub fn identifier(&self) -> String {
        let mut out = self.name.replace('.', "_");
        for arg in &self.args {
            out.push('_');
            out.push_str(&arg.identifier());
        }
        for _ in 0..self.array_rank {
            out.push_str("_Array");
        }
        out
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            let args = self
                .args
                .iter()
                .map(TypeRef::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, "<{}>", args)?;
        }
        if self.nullable {
            write!(f, "?")?;
        }
        for _ in 0..self.array_rank {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

/// `{ ... }` statement list.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// Statement node.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: Span,
}

/// Local variable declaration (`var a = 1, b;`, `const float k = 2f;`, `using var x = ...;`).
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDecl {
    /// Declared type; `var` is kept as written.
    pub ty: TypeRef,
    pub declarators: Vec<VarDeclarator>,
    pub is_const: bool,
    /// Bound through a scope-guarded `using` declaration.
    pub is_using: bool,
}

/// One `name [= init]` in a declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclarator {
    pub name: String,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Block(Block),
    Local(LocalDecl),
    Expr(Expr),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    For {
        init: Vec<Stmt>,
        cond: Option<Expr>,
        step: Vec<Expr>,
        body: Box<Stmt>,
    },
    Foreach {
        ty: TypeRef,
        name: String,
        iterable: Expr,
        body: Box<Stmt>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    LocalFunction(Box<MethodDecl>),
    Empty,
}

/// Expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(id: NodeId, kind: ExprKind, span: Span) -> Self {
        Self { id, kind, span }
    }

    /// Node created by the code generator rather than the parser.
    pub fn synthetic(kind: ExprKind, span: Span) -> Self {
        Self::new(SYNTHETIC_NODE, kind, span)
    }

    /// Simple name without type arguments.
    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name { name, type_args } if type_args.is_empty() => Some(name),
            _ => None,
        }
    }

    /// Strip any number of enclosing parentheses.
    pub fn unparenthesized(&self) -> &Expr {
        match &self.kind {
            ExprKind::Paren(inner) => inner.unparenthesized(),
            _ => self,
        }
    }

    /// Dotted rendering of a pure name/member chain (`FloatMode.Fast`).
    pub fn as_dotted(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Name { name, type_args } if type_args.is_empty() => Some(name.clone()),
            ExprKind::Member {
                target,
                name,
                type_args,
            } if type_args.is_empty() => Some(format!("{}.{}", target.as_dotted()?, name)),
            _ => None,
        }
    }
}

/// Literal category; the source text is kept alongside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    Int,
    Float,
    Double,
    Decimal,
    String,
    Char,
    Bool,
    Null,
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub kind: LiteralKind,
    /// Source form, ready to print (`1.5f`, `"text"`, `true`).
    pub text: String,
}

impl Literal {
    /// Content of a string literal with escapes resolved. Regular and
    /// verbatim strings both arrive here in regular `"..."` form.
    pub fn string_value(&self) -> Option<String> {
        if self.kind != LiteralKind::String {
            return None;
        }
        let inner = self.text.strip_prefix('"')?.strip_suffix('"')?;
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(ch) = chars.next() {
            if ch != '\\' {
                out.push(ch);
                continue;
            }
            match chars.next()? {
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                '0' => out.push('\0'),
                other => out.push(other),
            }
        }
        Some(out)
    }
}

/// Invocation or constructor argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub ref_kind: RefKind,
    /// Named argument label (`synchronousCompilation: true`).
    pub label: Option<String>,
    pub value: Expr,
}

/// Lambda expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<Param>,
    pub body: LambdaBody,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block(Block),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Coalesce,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Coalesce => "??",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnaryOp {
    /// Whether the operator stores into its operand.
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Mod => "%=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitOr => "|=",
            AssignOp::BitXor => "^=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    /// Simple or generic name (`dt`, `GetComponent<Foo>`).
    Name {
        name: String,
        type_args: Vec<TypeRef>,
    },
    This,
    Member {
        target: Box<Expr>,
        name: String,
        type_args: Vec<TypeRef>,
    },
    Invoke {
        callee: Box<Expr>,
        args: Vec<Argument>,
    },
    Index {
        target: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        ty: TypeRef,
        args: Vec<Argument>,
        initializer: Vec<(String, Expr)>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Lambda(Box<Lambda>),
    Cast {
        ty: TypeRef,
        operand: Box<Expr>,
    },
    Nameof(Box<Expr>),
    Typeof(TypeRef),
    Paren(Box<Expr>),
    /// Pre-rendered text produced by the code generator.
    Raw(String),
}
