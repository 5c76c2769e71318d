use nova_types::{JavaType, Span};
use std::fmt;
use std::sync::Arc;

pub use nova_syntax::{AssignOp, BinaryOp, LiteralKind, UnaryOp};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u32);

impl ExprId {
    pub(crate) fn from_raw(raw: u32) -> Self {
        ExprId(raw)
    }

    #[must_use]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExprId({})", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(u32);

impl StmtId {
    pub(crate) fn from_raw(raw: u32) -> Self {
        StmtId(raw)
    }

    #[must_use]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StmtId({})", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(u32);

impl LocalId {
    pub(crate) fn from_raw(raw: u32) -> Self {
        LocalId(raw)
    }

    #[must_use]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalId({})", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arena<T> {
    data: Vec<T>,
}

impl<T> Arena<T> {
    pub fn alloc(&mut self, value: T) -> u32 {
        let idx = self.data.len() as u32;
        self.data.push(value);
        idx
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.data.iter().enumerate().map(|(i, v)| (i as u32, v))
    }

    pub(crate) fn replace(&mut self, idx: u32, value: T) {
        self.data[idx as usize] = value;
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Arena { data: Vec::new() }
    }
}

impl<T> std::ops::Index<ExprId> for Arena<T> {
    type Output = T;

    fn index(&self, index: ExprId) -> &Self::Output {
        &self.data[index.idx()]
    }
}

impl<T> std::ops::Index<StmtId> for Arena<T> {
    type Output = T;

    fn index(&self, index: StmtId) -> &Self::Output {
        &self.data[index.idx()]
    }
}

impl<T> std::ops::Index<LocalId> for Arena<T> {
    type Output = T;

    fn index(&self, index: LocalId) -> &Self::Output {
        &self.data[index.idx()]
    }
}

/// Either kind of HIR node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Stmt(StmtId),
    Expr(ExprId),
}

/// The lowered body of one method, constructor, initializer or field
/// initializer, together with the source text it was lowered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    /// Name of the member the body belongs to (`<init>` for initializers).
    pub owner_name: String,
    pub params: Vec<LocalId>,
    pub root: StmtId,
    pub stmts: Arena<Stmt>,
    pub exprs: Arena<Expr>,
    pub locals: Arena<Local>,
    pub(crate) stmt_parents: Vec<Option<Node>>,
    pub(crate) expr_parents: Vec<Option<Node>>,
    pub(crate) source: Arc<str>,
}

impl Body {
    #[must_use]
    pub fn empty(owner_name: &str, range: Span, source: Arc<str>) -> Self {
        let mut stmts = Arena::default();
        let root = StmtId::from_raw(stmts.alloc(Stmt::Block {
            statements: Vec::new(),
            range,
        }));
        Body {
            owner_name: owner_name.to_string(),
            params: Vec::new(),
            root,
            stmts,
            exprs: Arena::default(),
            locals: Arena::default(),
            stmt_parents: vec![None],
            expr_parents: Vec::new(),
            source,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id]
    }

    pub fn local(&self, id: LocalId) -> &Local {
        &self.locals[id]
    }

    pub fn stmt_ids(&self) -> impl Iterator<Item = StmtId> + '_ {
        self.stmts.iter().map(|(idx, _)| StmtId::from_raw(idx))
    }

    pub fn expr_ids(&self) -> impl Iterator<Item = ExprId> + '_ {
        self.exprs.iter().map(|(idx, _)| ExprId::from_raw(idx))
    }

    pub fn local_ids(&self) -> impl Iterator<Item = LocalId> + '_ {
        self.locals.iter().map(|(idx, _)| LocalId::from_raw(idx))
    }

    pub fn stmt_parent(&self, id: StmtId) -> Option<Node> {
        self.stmt_parents.get(id.idx()).copied().flatten()
    }

    pub fn expr_parent(&self, id: ExprId) -> Option<Node> {
        self.expr_parents.get(id.idx()).copied().flatten()
    }

    pub fn parent(&self, node: Node) -> Option<Node> {
        match node {
            Node::Stmt(id) => self.stmt_parent(id),
            Node::Expr(id) => self.expr_parent(id),
        }
    }

    pub fn range(&self, node: Node) -> Span {
        match node {
            Node::Stmt(id) => self.stmts[id].range(),
            Node::Expr(id) => self.exprs[id].range(),
        }
    }

    /// Source text covered by `range`.
    pub fn text(&self, range: Span) -> &str {
        range.slice(&self.source)
    }

    pub fn expr_text(&self, id: ExprId) -> &str {
        self.text(self.exprs[id].range())
    }

    pub fn stmt_text(&self, id: StmtId) -> &str {
        self.text(self.stmts[id].range())
    }

    /// Direct children of `node` in source order.
    pub fn children(&self, node: Node) -> Vec<Node> {
        let mut out = Vec::new();
        match node {
            Node::Stmt(id) => self.stmt_children(id, &mut out),
            Node::Expr(id) => self.expr_children(id, &mut out),
        }
        out
    }

    fn stmt_children(&self, id: StmtId, out: &mut Vec<Node>) {
        let stmts = |ids: &[StmtId], out: &mut Vec<Node>| {
            out.extend(ids.iter().map(|id| Node::Stmt(*id)));
        };
        match &self.stmts[id] {
            Stmt::Block { statements, .. } => stmts(statements, out),
            Stmt::LocalVar { locals, .. } => {
                out.extend(
                    locals
                        .iter()
                        .filter_map(|local| self.locals[*local].initializer)
                        .map(Node::Expr),
                );
            }
            Stmt::Expr { expr, .. } | Stmt::Throw { expr, .. } => out.push(Node::Expr(*expr)),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                out.push(Node::Expr(*condition));
                out.push(Node::Stmt(*then_branch));
                out.extend(else_branch.map(Node::Stmt));
            }
            Stmt::For {
                init,
                condition,
                update,
                body,
                ..
            } => {
                stmts(init, out);
                out.extend(condition.map(Node::Expr));
                out.extend(update.iter().map(|e| Node::Expr(*e)));
                out.push(Node::Stmt(*body));
            }
            Stmt::ForEach { iterable, body, .. } => {
                out.push(Node::Expr(*iterable));
                out.push(Node::Stmt(*body));
            }
            Stmt::While {
                condition, body, ..
            } => {
                out.push(Node::Expr(*condition));
                out.push(Node::Stmt(*body));
            }
            Stmt::Do {
                body, condition, ..
            } => {
                out.push(Node::Stmt(*body));
                out.push(Node::Expr(*condition));
            }
            Stmt::Return { expr, .. } => out.extend(expr.map(Node::Expr)),
            Stmt::Labeled { body, .. } => out.push(Node::Stmt(*body)),
            Stmt::Try {
                resources,
                body,
                catches,
                finally,
                ..
            } => {
                stmts(resources, out);
                out.push(Node::Stmt(*body));
                out.extend(catches.iter().map(|c| Node::Stmt(c.body)));
                out.extend(finally.map(Node::Stmt));
            }
            Stmt::Switch {
                selector, groups, ..
            } => {
                out.push(Node::Expr(*selector));
                for group in groups {
                    out.extend(group.labels.iter().map(|e| Node::Expr(*e)));
                    stmts(&group.statements, out);
                }
            }
            Stmt::Synchronized { lock, body, .. } => {
                out.push(Node::Expr(*lock));
                out.push(Node::Stmt(*body));
            }
            Stmt::LocalClass { members, .. } => stmts(members, out),
            Stmt::Method { body, .. } => out.extend(body.map(Node::Stmt)),
            Stmt::Field { initializers, .. } => {
                out.extend(initializers.iter().map(|e| Node::Expr(*e)))
            }
            Stmt::Other { refs, .. } => out.extend(refs.iter().map(|e| Node::Expr(*e))),
            Stmt::Break { .. } | Stmt::Continue { .. } | Stmt::Empty { .. } => {}
        }
    }

    fn expr_children(&self, id: ExprId, out: &mut Vec<Node>) {
        let exprs = |ids: &[ExprId], out: &mut Vec<Node>| {
            out.extend(ids.iter().map(|id| Node::Expr(*id)));
        };
        match &self.exprs[id] {
            Expr::Local { .. }
            | Expr::Name { .. }
            | Expr::Literal { .. }
            | Expr::This { .. }
            | Expr::Super { .. }
            | Expr::Type { .. }
            | Expr::ClassLiteral { .. } => {}
            Expr::FieldAccess { receiver, .. } => out.push(Node::Expr(*receiver)),
            Expr::Call { receiver, args, .. } => {
                out.extend(receiver.map(Node::Expr));
                exprs(args, out);
            }
            Expr::New { args, members, .. } => {
                exprs(args, out);
                if let Some(members) = members {
                    out.extend(members.iter().map(|s| Node::Stmt(*s)));
                }
            }
            Expr::NewArray {
                dims, initializer, ..
            } => {
                exprs(dims, out);
                out.extend(initializer.map(Node::Expr));
            }
            Expr::ArrayInit { elements, .. } => exprs(elements, out),
            Expr::ArrayAccess { array, index, .. } => {
                out.push(Node::Expr(*array));
                out.push(Node::Expr(*index));
            }
            Expr::Unary { operand, .. } => out.push(Node::Expr(*operand)),
            Expr::Binary { lhs, rhs, .. } | Expr::Assign { lhs, rhs, .. } => {
                out.push(Node::Expr(*lhs));
                out.push(Node::Expr(*rhs));
            }
            Expr::InstanceOf { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::Paren { expr, .. } => out.push(Node::Expr(*expr)),
            Expr::Conditional {
                condition,
                then_expr,
                else_expr,
                ..
            } => exprs(&[*condition, *then_expr, *else_expr], out),
            Expr::Lambda { body, .. } => out.push(match body {
                LambdaBody::Expr(expr) => Node::Expr(*expr),
                LambdaBody::Block(block) => Node::Stmt(*block),
            }),
            Expr::MethodRef { receiver, .. } => out.push(Node::Expr(*receiver)),
            Expr::Missing { refs, .. } => exprs(refs, out),
        }
    }

    /// Pre-order walk below (and including) `node`. Returning `false` from
    /// `f` skips the children of the visited node.
    pub fn walk(&self, node: Node, f: &mut dyn FnMut(Node) -> bool) {
        let mut stack = vec![node];
        while let Some(node) = stack.pop() {
            if !f(node) {
                continue;
            }
            let children = self.children(node);
            stack.extend(children.into_iter().rev());
        }
    }

    /// Returns `true` when `node` is `ancestor` or lies below it.
    pub fn is_within(&self, node: Node, ancestor: Node) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalKind {
    Local,
    Param,
    ForEach,
    Pattern,
    LambdaParam,
    Catch,
    Resource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Local {
    pub name: String,
    pub name_range: Span,
    /// The declared type; `Unknown` for `var` and untyped lambda parameters.
    pub ty: JavaType,
    pub ty_text: String,
    pub ty_range: Span,
    pub kind: LocalKind,
    pub is_final: bool,
    /// Statement declaring the local (`LocalVar`, `ForEach`, `Try`, `Method`);
    /// `None` for lambda parameters, pattern bindings and method parameters.
    pub decl: Option<StmtId>,
    /// Position of the declarator within its statement.
    pub declarator: usize,
    pub initializer: Option<ExprId>,
    /// Innermost lambda or class the local is declared in.
    pub owner: Option<Node>,
    /// The declarator (`name = init`), or the whole parameter.
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchClause {
    pub param: LocalId,
    pub body: StmtId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchGroup {
    pub labels: Vec<ExprId>,
    pub statements: Vec<StmtId>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Block {
        statements: Vec<StmtId>,
        range: Span,
    },
    LocalVar {
        locals: Vec<LocalId>,
        is_final: bool,
        range: Span,
    },
    Expr {
        expr: ExprId,
        range: Span,
    },
    If {
        condition: ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
        range: Span,
    },
    For {
        init: Vec<StmtId>,
        condition: Option<ExprId>,
        update: Vec<ExprId>,
        body: StmtId,
        keyword_range: Span,
        range: Span,
    },
    ForEach {
        local: LocalId,
        iterable: ExprId,
        body: StmtId,
        keyword_range: Span,
        range: Span,
    },
    While {
        condition: ExprId,
        body: StmtId,
        keyword_range: Span,
        range: Span,
    },
    Do {
        body: StmtId,
        condition: ExprId,
        range: Span,
    },
    Return {
        expr: Option<ExprId>,
        range: Span,
    },
    Break {
        label: Option<String>,
        range: Span,
    },
    Continue {
        label: Option<String>,
        range: Span,
    },
    Labeled {
        label: String,
        body: StmtId,
        range: Span,
    },
    Throw {
        expr: ExprId,
        range: Span,
    },
    Try {
        resources: Vec<StmtId>,
        body: StmtId,
        catches: Vec<CatchClause>,
        finally: Option<StmtId>,
        range: Span,
    },
    Switch {
        selector: ExprId,
        groups: Vec<SwitchGroup>,
        range: Span,
    },
    Synchronized {
        lock: ExprId,
        body: StmtId,
        range: Span,
    },
    /// A class declared inside a body; its members are lowered in place.
    LocalClass {
        name: String,
        members: Vec<StmtId>,
        range: Span,
    },
    /// A method, constructor or initializer of a local or anonymous class.
    Method {
        name: String,
        params: Vec<LocalId>,
        body: Option<StmtId>,
        range: Span,
    },
    /// Field declarators of a local or anonymous class.
    Field {
        initializers: Vec<ExprId>,
        range: Span,
    },
    /// A statement the parser skipped; `refs` are the locals named in its text.
    Other {
        refs: Vec<ExprId>,
        range: Span,
    },
    Empty {
        range: Span,
    },
}

impl Stmt {
    #[must_use]
    pub fn range(&self) -> Span {
        match self {
            Stmt::Block { range, .. }
            | Stmt::LocalVar { range, .. }
            | Stmt::Expr { range, .. }
            | Stmt::If { range, .. }
            | Stmt::For { range, .. }
            | Stmt::ForEach { range, .. }
            | Stmt::While { range, .. }
            | Stmt::Do { range, .. }
            | Stmt::Return { range, .. }
            | Stmt::Break { range, .. }
            | Stmt::Continue { range, .. }
            | Stmt::Labeled { range, .. }
            | Stmt::Throw { range, .. }
            | Stmt::Try { range, .. }
            | Stmt::Switch { range, .. }
            | Stmt::Synchronized { range, .. }
            | Stmt::LocalClass { range, .. }
            | Stmt::Method { range, .. }
            | Stmt::Field { range, .. }
            | Stmt::Other { range, .. }
            | Stmt::Empty { range } => *range,
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            Stmt::For { .. } | Stmt::ForEach { .. } | Stmt::While { .. } | Stmt::Do { .. }
        )
    }

    /// Loop body, for the four loop statements.
    pub fn loop_body(&self) -> Option<StmtId> {
        match self {
            Stmt::For { body, .. }
            | Stmt::ForEach { body, .. }
            | Stmt::While { body, .. }
            | Stmt::Do { body, .. } => Some(*body),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LambdaBody {
    Expr(ExprId),
    Block(StmtId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A name resolved to a local variable or parameter.
    Local {
        local: LocalId,
        range: Span,
    },
    /// A simple name that is not a local (field, type, package).
    Name {
        name: String,
        range: Span,
    },
    Literal {
        kind: LiteralKind,
        value: String,
        range: Span,
    },
    This {
        range: Span,
    },
    Super {
        range: Span,
    },
    Type {
        text: String,
        range: Span,
    },
    FieldAccess {
        receiver: ExprId,
        name: String,
        name_range: Span,
        range: Span,
    },
    Call {
        receiver: Option<ExprId>,
        name: String,
        name_range: Span,
        args: Vec<ExprId>,
        range: Span,
    },
    New {
        ty: String,
        ty_range: Span,
        args: Vec<ExprId>,
        /// Members of an anonymous class body.
        members: Option<Vec<StmtId>>,
        range: Span,
    },
    NewArray {
        elem_ty: String,
        dims: Vec<ExprId>,
        rank: usize,
        initializer: Option<ExprId>,
        range: Span,
    },
    ArrayInit {
        elements: Vec<ExprId>,
        range: Span,
    },
    ArrayAccess {
        array: ExprId,
        index: ExprId,
        range: Span,
    },
    Unary {
        op: UnaryOp,
        operand: ExprId,
        range: Span,
    },
    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
        range: Span,
    },
    InstanceOf {
        expr: ExprId,
        ty: String,
        ty_range: Span,
        binding: Option<LocalId>,
        range: Span,
    },
    Conditional {
        condition: ExprId,
        then_expr: ExprId,
        else_expr: ExprId,
        range: Span,
    },
    Assign {
        op: AssignOp,
        lhs: ExprId,
        rhs: ExprId,
        range: Span,
    },
    Cast {
        ty: String,
        expr: ExprId,
        range: Span,
    },
    Paren {
        expr: ExprId,
        range: Span,
    },
    Lambda {
        params: Vec<LocalId>,
        body: LambdaBody,
        range: Span,
    },
    MethodRef {
        receiver: ExprId,
        name: String,
        range: Span,
    },
    ClassLiteral {
        ty: String,
        range: Span,
    },
    /// An expression the parser could not read; `refs` are the locals named in its text.
    Missing {
        refs: Vec<ExprId>,
        range: Span,
    },
}

impl Expr {
    #[must_use]
    pub fn range(&self) -> Span {
        match self {
            Expr::Local { range, .. }
            | Expr::Name { range, .. }
            | Expr::Literal { range, .. }
            | Expr::This { range }
            | Expr::Super { range }
            | Expr::Type { range, .. }
            | Expr::FieldAccess { range, .. }
            | Expr::Call { range, .. }
            | Expr::New { range, .. }
            | Expr::NewArray { range, .. }
            | Expr::ArrayInit { range, .. }
            | Expr::ArrayAccess { range, .. }
            | Expr::Unary { range, .. }
            | Expr::Binary { range, .. }
            | Expr::InstanceOf { range, .. }
            | Expr::Conditional { range, .. }
            | Expr::Assign { range, .. }
            | Expr::Cast { range, .. }
            | Expr::Paren { range, .. }
            | Expr::Lambda { range, .. }
            | Expr::MethodRef { range, .. }
            | Expr::ClassLiteral { range, .. }
            | Expr::Missing { range, .. } => *range,
        }
    }
}
