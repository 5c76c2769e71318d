//! Plain Java AST produced by [`crate::parse`].
//!
//! Every node carries the byte [`Span`] it covers in the original file so
//! callers can copy source text verbatim when rewriting.

use nova_types::{JavaType, Span};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationUnit {
    pub package: Option<PackageDecl>,
    pub imports: Vec<ImportDecl>,
    pub types: Vec<TypeDecl>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDecl {
    pub name: String,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub is_static: bool,
    pub is_star: bool,
    pub path: String,
    pub range: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeDeclKind {
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub kind: TypeDeclKind,
    pub name: String,
    pub name_range: Span,
    pub range: Span,
    pub body: ClassBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassBody {
    pub members: Vec<MemberDecl>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberDecl {
    Field(FieldDecl),
    Method(MethodDecl),
    Constructor(MethodDecl),
    Initializer(InitializerDecl),
    Type(TypeDecl),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub is_final: bool,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub text: String,
    pub range: Span,
}

impl TypeRef {
    pub fn ty(&self) -> JavaType {
        JavaType::parse(&self.text)
    }

    /// `var` in a local declaration.
    pub fn is_var(&self) -> bool {
        self.text == "var"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub modifiers: Modifiers,
    pub ty: TypeRef,
    pub declarators: Vec<VarDeclarator>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub is_final: bool,
    pub ty: TypeRef,
    pub name: String,
    pub name_range: Span,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub modifiers: Modifiers,
    /// `None` for constructors.
    pub return_ty: Option<TypeRef>,
    pub name: String,
    pub name_range: Span,
    pub params: Vec<ParamDecl>,
    pub body: Option<Block>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializerDecl {
    pub is_static: bool,
    pub body: Block,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Block(Block),
    LocalVar(LocalVarStmt),
    LocalClass(TypeDecl),
    Expr(ExprStmt),
    If(IfStmt),
    For(ForStmt),
    ForEach(ForEachStmt),
    While(WhileStmt),
    Do(DoStmt),
    Return(ReturnStmt),
    Break(JumpStmt),
    Continue(JumpStmt),
    Labeled(LabeledStmt),
    Throw(ThrowStmt),
    Try(TryStmt),
    Switch(SwitchStmt),
    Synchronized(SynchronizedStmt),
    /// A statement the parser skipped over (`assert`, `yield`, malformed input).
    Other(Span),
    Empty(Span),
}

impl Stmt {
    pub fn range(&self) -> Span {
        match self {
            Stmt::Block(stmt) => stmt.range,
            Stmt::LocalVar(stmt) => stmt.range,
            Stmt::LocalClass(decl) => decl.range,
            Stmt::Expr(stmt) => stmt.range,
            Stmt::If(stmt) => stmt.range,
            Stmt::For(stmt) => stmt.range,
            Stmt::ForEach(stmt) => stmt.range,
            Stmt::While(stmt) => stmt.range,
            Stmt::Do(stmt) => stmt.range,
            Stmt::Return(stmt) => stmt.range,
            Stmt::Break(stmt) => stmt.range,
            Stmt::Continue(stmt) => stmt.range,
            Stmt::Labeled(stmt) => stmt.range,
            Stmt::Throw(stmt) => stmt.range,
            Stmt::Try(stmt) => stmt.range,
            Stmt::Switch(stmt) => stmt.range,
            Stmt::Synchronized(stmt) => stmt.range,
            Stmt::Other(range) | Stmt::Empty(range) => *range,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVarStmt {
    pub is_final: bool,
    pub ty: TypeRef,
    pub declarators: Vec<VarDeclarator>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDeclarator {
    pub name: String,
    pub name_range: Span,
    /// Extra `[]` written after the name (`int a[]`).
    pub dims: usize,
    pub initializer: Option<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprStmt {
    pub expr: Expr,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForStmt {
    /// Either a single [`Stmt::LocalVar`] or a list of [`Stmt::Expr`].
    pub init: Vec<Stmt>,
    pub condition: Option<Expr>,
    pub update: Vec<Expr>,
    pub body: Box<Stmt>,
    pub keyword_range: Span,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForEachStmt {
    pub is_final: bool,
    pub ty: TypeRef,
    pub name: String,
    pub name_range: Span,
    pub iterable: Expr,
    pub body: Box<Stmt>,
    pub keyword_range: Span,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Box<Stmt>,
    pub keyword_range: Span,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoStmt {
    pub body: Box<Stmt>,
    pub condition: Expr,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnStmt {
    pub expr: Option<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpStmt {
    pub label: Option<String>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledStmt {
    pub label: String,
    pub label_range: Span,
    pub body: Box<Stmt>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrowStmt {
    pub expr: Expr,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryStmt {
    pub resources: Vec<LocalVarStmt>,
    pub body: Block,
    pub catches: Vec<CatchClause>,
    pub finally: Option<Block>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchClause {
    pub param: ParamDecl,
    pub body: Block,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchStmt {
    pub selector: Expr,
    pub groups: Vec<SwitchGroup>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchGroup {
    /// Empty for `default`.
    pub labels: Vec<Expr>,
    pub is_arrow: bool,
    pub statements: Vec<Stmt>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynchronizedStmt {
    pub lock: Expr,
    pub body: Block,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Name(NameExpr),
    Literal(LiteralExpr),
    This(Span),
    Super(Span),
    /// A type in expression position: `String[]` in `String[]::new`, `int` in `int.class`.
    Type(TypeRef),
    FieldAccess(FieldAccessExpr),
    MethodCall(MethodCallExpr),
    New(NewExpr),
    NewArray(NewArrayExpr),
    ArrayInit(ArrayInitExpr),
    ArrayAccess(ArrayAccessExpr),
    Unary(UnaryExpr),
    Binary(BinaryExpr),
    InstanceOf(InstanceOfExpr),
    Conditional(ConditionalExpr),
    Assign(AssignExpr),
    Cast(CastExpr),
    Paren(ParenExpr),
    Lambda(LambdaExpr),
    MethodRef(MethodRefExpr),
    ClassLiteral(ClassLiteralExpr),
    Missing(Span),
}

impl Expr {
    pub fn range(&self) -> Span {
        match self {
            Expr::Name(expr) => expr.range,
            Expr::Literal(expr) => expr.range,
            Expr::This(range) | Expr::Super(range) | Expr::Missing(range) => *range,
            Expr::Type(ty) => ty.range,
            Expr::FieldAccess(expr) => expr.range,
            Expr::MethodCall(expr) => expr.range,
            Expr::New(expr) => expr.range,
            Expr::NewArray(expr) => expr.range,
            Expr::ArrayInit(expr) => expr.range,
            Expr::ArrayAccess(expr) => expr.range,
            Expr::Unary(expr) => expr.range,
            Expr::Binary(expr) => expr.range,
            Expr::InstanceOf(expr) => expr.range,
            Expr::Conditional(expr) => expr.range,
            Expr::Assign(expr) => expr.range,
            Expr::Cast(expr) => expr.range,
            Expr::Paren(expr) => expr.range,
            Expr::Lambda(expr) => expr.range,
            Expr::MethodRef(expr) => expr.range,
            Expr::ClassLiteral(expr) => expr.range,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameExpr {
    pub name: String,
    pub range: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    Bool,
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralExpr {
    pub kind: LiteralKind,
    /// Source text of the literal, quotes and suffixes included.
    pub value: String,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAccessExpr {
    pub receiver: Box<Expr>,
    pub name: String,
    pub name_range: Span,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCallExpr {
    pub receiver: Option<Box<Expr>>,
    pub name: String,
    pub name_range: Span,
    pub args: Vec<Expr>,
    pub args_range: Span,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExpr {
    pub ty: TypeRef,
    pub args: Vec<Expr>,
    pub body: Option<ClassBody>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArrayExpr {
    /// Element type without dimensions (`String` in `new String[n][]`).
    pub elem_ty: TypeRef,
    pub dims: Vec<Expr>,
    /// Total number of dimensions, sized or not.
    pub rank: usize,
    pub initializer: Option<ArrayInitExpr>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayInitExpr {
    pub elements: Vec<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayAccessExpr {
    pub array: Box<Expr>,
    pub index: Box<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnaryOp {
    pub fn is_increment_or_decrement(self) -> bool {
        matches!(
            self,
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Box<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    UShr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitXor => "^",
            BinaryOp::BitOr => "|",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    /// Java operator precedence; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 10,
            BinaryOp::Add | BinaryOp::Sub => 9,
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => 8,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => 7,
            BinaryOp::Eq | BinaryOp::Ne => 6,
            BinaryOp::BitAnd => 5,
            BinaryOp::BitXor => 4,
            BinaryOp::BitOr => 3,
            BinaryOp::And => 2,
            BinaryOp::Or => 1,
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceOfExpr {
    pub expr: Box<Expr>,
    pub ty: TypeRef,
    /// Pattern variable introduced by `x instanceof String s`.
    pub binding: Option<(String, Span)>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalExpr {
    pub condition: Box<Expr>,
    pub then_expr: Box<Expr>,
    pub else_expr: Box<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
}

impl AssignOp {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Rem => "%=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitOr => "|=",
            AssignOp::BitXor => "^=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
            AssignOp::UShr => ">>>=",
        }
    }

    /// The binary operator a compound assignment applies (`+=` -> `+`).
    pub fn binary_op(self) -> Option<BinaryOp> {
        Some(match self {
            AssignOp::Assign => return None,
            AssignOp::Add => BinaryOp::Add,
            AssignOp::Sub => BinaryOp::Sub,
            AssignOp::Mul => BinaryOp::Mul,
            AssignOp::Div => BinaryOp::Div,
            AssignOp::Rem => BinaryOp::Rem,
            AssignOp::BitAnd => BinaryOp::BitAnd,
            AssignOp::BitOr => BinaryOp::BitOr,
            AssignOp::BitXor => BinaryOp::BitXor,
            AssignOp::Shl => BinaryOp::Shl,
            AssignOp::Shr => BinaryOp::Shr,
            AssignOp::UShr => BinaryOp::UShr,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignExpr {
    pub op: AssignOp,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastExpr {
    pub ty: TypeRef,
    pub expr: Box<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParenExpr {
    pub expr: Box<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaParam {
    /// `None` for implicitly typed parameters.
    pub ty: Option<TypeRef>,
    pub name: String,
    pub name_range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block(Block),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaExpr {
    pub params: Vec<LambdaParam>,
    pub body: LambdaBody,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRefExpr {
    pub receiver: Box<Expr>,
    /// `new` for constructor references.
    pub name: String,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLiteralExpr {
    pub ty: TypeRef,
    pub range: Span,
}
