use std::fmt;

use super::{AstNode, Span};

macro_rules! spanned {
    ($($node:ident),* $(,)?) => {
        $(
            impl AstNode for $node {
                fn span(&self) -> Span {
                    self.span
                }
            }
        )*
    };
}

spanned!(
    ImportDecl,
    Annotation,
    TypeRef,
    ClassDecl,
    InterfaceDecl,
    AnnotationDecl,
    AnnotationElement,
    FieldDecl,
    MethodDecl,
    Param,
    IfStmt,
    WhileStmt,
    ForStmt,
    TryStmt,
    SyncStmt,
    ReturnStmt,
    ThrowStmt,
    LiteralExpr,
    NameExpr,
    AccessExpr,
    InvocationExpr,
    NewExpr,
    IndexExpr,
    BinaryExpr,
    UnaryExpr,
    LogicalExpr,
    AssignExpr,
    VarDefExpr,
    LambdaExpr,
    ArrayLitExpr,
    AsTypeExpr,
    TypeOfExpr,
);

// Imports

#[derive(Debug, Clone)]
pub struct ImportDecl {
    /// Dotted name; a wildcard import may or may not carry the `.*` suffix
    pub name: String,
    pub is_static: bool,
    pub is_wildcard: bool,
    pub span: Span,
}

impl fmt::Display for ImportDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static {
            write!(f, "import static ")?;
        } else {
            write!(f, "import ")?;
        }
        if self.is_wildcard && !self.name.ends_with(".*") {
            write!(f, "{}.*", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

// Type declarations

#[derive(Debug, Clone)]
pub enum TypeDecl {
    Class(ClassDecl),
    Interface(InterfaceDecl),
    Annotation(AnnotationDecl),
}

impl TypeDecl {
    pub fn name(&self) -> &str {
        match self {
            TypeDecl::Class(c) => &c.name,
            TypeDecl::Interface(i) => &i.name,
            TypeDecl::Annotation(a) => &a.name,
        }
    }

    pub fn modifiers(&self) -> &[Modifier] {
        match self {
            TypeDecl::Class(c) => &c.modifiers,
            TypeDecl::Interface(i) => &i.modifiers,
            TypeDecl::Annotation(a) => &a.modifiers,
        }
    }

    pub fn annotations(&self) -> &[Annotation] {
        match self {
            TypeDecl::Class(c) => &c.annotations,
            TypeDecl::Interface(i) => &i.annotations,
            TypeDecl::Annotation(a) => &a.annotations,
        }
    }
}

impl AstNode for TypeDecl {
    fn span(&self) -> Span {
        match self {
            TypeDecl::Class(c) => c.span,
            TypeDecl::Interface(i) => i.span,
            TypeDecl::Annotation(a) => a.span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Public,
    Protected,
    Private,
    /// Explicit package-private access; members are public otherwise
    Package,
    Static,
    Final,
    Abstract,
    Synchronized,
    Volatile,
    Transient,
    Strictfp,
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Modifier::Public => "public",
            Modifier::Protected => "protected",
            Modifier::Private => "private",
            Modifier::Package => "pkg",
            Modifier::Static => "static",
            Modifier::Final => "final",
            Modifier::Abstract => "abstract",
            Modifier::Synchronized => "synchronized",
            Modifier::Volatile => "volatile",
            Modifier::Transient => "transient",
            Modifier::Strictfp => "strictfp",
        };
        f.write_str(text)
    }
}

/// `@Name(key = value, ...)`; a single unnamed argument is keyed `value`
#[derive(Debug, Clone)]
pub struct Annotation {
    pub name: String,
    pub args: Vec<(String, Expr)>,
    pub span: Span,
}

/// A type as written: `int`, `List`, `java.lang.String[][]`
#[derive(Debug, Clone)]
pub struct TypeRef {
    pub name: String,
    pub array_dims: usize,
    pub span: Span,
}

impl TypeRef {
    /// Name with one `[]` per dimension
    pub fn spelled(&self) -> String {
        let mut s = self.name.clone();
        for _ in 0..self.array_dims {
            s.push_str("[]");
        }
        s
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spelled())
    }
}

/// `extends Parent(args)`
#[derive(Debug, Clone)]
pub struct SuperCall {
    pub ty: TypeRef,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub modifiers: Vec<Modifier>,
    pub annotations: Vec<Annotation>,
    pub name: String,
    /// Primary constructor parameters; each also becomes a field
    pub params: Vec<Param>,
    pub extends: Option<SuperCall>,
    pub implements: Vec<TypeRef>,
    pub body: Vec<ClassMember>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ClassMember {
    Field(FieldDecl),
    Method(MethodDecl),
    StaticBlock(Vec<Stmt>),
    /// Bare statements run in the primary constructor, in order
    Stmt(Stmt),
}

#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub modifiers: Vec<Modifier>,
    pub annotations: Vec<Annotation>,
    pub name: String,
    pub extends: Vec<TypeRef>,
    pub body: Vec<InterfaceMember>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum InterfaceMember {
    Field(FieldDecl),
    Method(MethodDecl),
}

#[derive(Debug, Clone)]
pub struct AnnotationDecl {
    pub modifiers: Vec<Modifier>,
    pub annotations: Vec<Annotation>,
    pub name: String,
    pub elements: Vec<AnnotationElement>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct AnnotationElement {
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub modifiers: Vec<Modifier>,
    pub annotations: Vec<Annotation>,
    pub name: String,
    pub ty: Option<TypeRef>,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub modifiers: Vec<Modifier>,
    pub annotations: Vec<Annotation>,
    pub name: String,
    pub params: Vec<Param>,
    /// Untyped methods return `java.lang.Object`
    pub return_type: Option<TypeRef>,
    /// `None` for abstract methods
    pub body: Option<Vec<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Option<TypeRef>,
    pub default: Option<Expr>,
    pub modifiers: Vec<Modifier>,
    pub annotations: Vec<Annotation>,
    pub span: Span,
}

// Statements

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    Try(TryStmt),
    Synchronized(SyncStmt),
    Return(ReturnStmt),
    Throw(ThrowStmt),
    Break(Span),
    Continue(Span),
    Pass(Span),
    /// Named method declared inside a body
    MethodDef(MethodDecl),
}

impl AstNode for Stmt {
    fn span(&self) -> Span {
        match self {
            Stmt::Expr(e) => e.span(),
            Stmt::If(s) => s.span,
            Stmt::While(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::Try(s) => s.span,
            Stmt::Synchronized(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::Throw(s) => s.span,
            Stmt::Break(span) | Stmt::Continue(span) | Stmt::Pass(span) => *span,
            Stmt::MethodDef(m) => m.span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IfBranch {
    /// `None` for the trailing `else`
    pub cond: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub branches: Vec<IfBranch>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub cond: Expr,
    pub body: Vec<Stmt>,
    pub do_while: bool,
    pub span: Span,
}

/// `for name in iterable { body }`
#[derive(Debug, Clone)]
pub struct ForStmt {
    pub name: String,
    pub iterable: Expr,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TryStmt {
    pub body: Vec<Stmt>,
    /// Name bound to the caught exception; there is no catch clause
    /// without it
    pub catch_var: Option<String>,
    pub catch_body: Vec<Stmt>,
    pub finally: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SyncStmt {
    pub locks: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ThrowStmt {
    pub value: Expr,
    pub span: Span,
}

// Expressions

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(LiteralExpr),
    Null(Span),
    Name(NameExpr),
    Access(AccessExpr),
    Invocation(InvocationExpr),
    New(NewExpr),
    Index(IndexExpr),
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Logical(LogicalExpr),
    Assign(AssignExpr),
    VarDef(VarDefExpr),
    Lambda(LambdaExpr),
    ArrayLit(ArrayLitExpr),
    AsType(AsTypeExpr),
    TypeOf(TypeOfExpr),
    This(Span),
    Super(Span),
}

impl AstNode for Expr {
    fn span(&self) -> Span {
        match self {
            Expr::Literal(e) => e.span,
            Expr::Name(e) => e.span,
            Expr::Access(e) => e.span,
            Expr::Invocation(e) => e.span,
            Expr::New(e) => e.span,
            Expr::Index(e) => e.span,
            Expr::Binary(e) => e.span,
            Expr::Unary(e) => e.span,
            Expr::Logical(e) => e.span,
            Expr::Assign(e) => e.span,
            Expr::VarDef(e) => e.span,
            Expr::Lambda(e) => e.span,
            Expr::ArrayLit(e) => e.span,
            Expr::AsType(e) => e.span,
            Expr::TypeOf(e) => e.span,
            Expr::Null(span) | Expr::This(span) | Expr::Super(span) => *span,
        }
    }
}

impl Expr {
    /// Dotted name if this is a chain of plain accesses ending in a name,
    /// e.g. `java.lang.Math`
    pub fn dotted_name(&self) -> Option<String> {
        match self {
            Expr::Name(n) => Some(n.name.clone()),
            Expr::Access(a) => {
                let head = a.target.as_ref()?.dotted_name()?;
                Some(format!("{}.{}", head, a.name))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Source text, including an optional `L`/`F`/`D` suffix
    Number(String),
    String(String),
    Char(char),
    Bool(bool),
}

#[derive(Debug, Clone)]
pub struct LiteralExpr {
    pub value: Literal,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct NameExpr {
    pub name: String,
    pub span: Span,
}

/// `target.name`, or a bare `name` when the target is absent
#[derive(Debug, Clone)]
pub struct AccessExpr {
    pub target: Option<Box<Expr>>,
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct InvocationExpr {
    pub callee: Box<Expr>,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct NewExpr {
    pub ty: TypeRef,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct IndexExpr {
    pub target: Box<Expr>,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    Ushr,
    BitAnd,
    BitOr,
    BitXor,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    /// `===`
    RefEq,
    /// `!==`
    RefNe,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Ushr => ">>>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::RefEq => "===",
            BinaryOp::RefNe => "!==",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    /// Logical `!`
    Not,
    /// Bitwise `~`
    BitNot,
    Plus,
}

#[derive(Debug, Clone)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone)]
pub struct LogicalExpr {
    pub op: LogicalOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl AssignOp {
    /// Operator a compound assignment applies before storing
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Rem => Some(BinaryOp::Rem),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssignExpr {
    pub target: Box<Expr>,
    pub op: AssignOp,
    pub value: Box<Expr>,
    pub span: Span,
}

/// Local declaration; as an expression its value is the stored value
#[derive(Debug, Clone)]
pub struct VarDefExpr {
    pub name: String,
    pub ty: Option<TypeRef>,
    pub init: Option<Box<Expr>>,
    pub modifiers: Vec<Modifier>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct LambdaExpr {
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ArrayLitExpr {
    pub items: Vec<Expr>,
    pub span: Span,
}

/// `expr as Type`
#[derive(Debug, Clone)]
pub struct AsTypeExpr {
    pub expr: Box<Expr>,
    pub ty: TypeRef,
    pub span: Span,
}

/// `type Name`: the class literal of a type
#[derive(Debug, Clone)]
pub struct TypeOfExpr {
    pub ty: TypeRef,
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> Expr {
        Expr::Name(NameExpr { name: n.to_string(), span: Span::default() })
    }

    #[test]
    fn test_dotted_name_of_access_chain() {
        let e = Expr::Access(AccessExpr {
            target: Some(Box::new(Expr::Access(AccessExpr {
                target: Some(Box::new(name("java"))),
                name: "lang".into(),
                span: Span::default(),
            }))),
            name: "Math".into(),
            span: Span::default(),
        });
        assert_eq!(e.dotted_name().as_deref(), Some("java.lang.Math"));
        let call = Expr::Invocation(InvocationExpr { callee: Box::new(name("f")), args: vec![], span: Span::default() });
        assert_eq!(call.dotted_name(), None);
    }

    #[test]
    fn test_type_ref_spelling() {
        let t = TypeRef { name: "int".into(), array_dims: 2, span: Span::default() };
        assert_eq!(t.to_string(), "int[][]");
        assert_eq!(AssignOp::Rem.binary(), Some(BinaryOp::Rem));
        assert!(BinaryOp::Le.is_comparison());
        assert!(!BinaryOp::RefEq.is_comparison());
    }
}
