use std::sync::Arc;

use crate::hir::{
    Arena, Body, CatchClause, Expr, ExprId, LambdaBody, Local, LocalId, LocalKind, Node, Stmt,
    StmtId, SwitchGroup,
};
use nova_syntax::ast as syntax;
use nova_types::{JavaType, Span};

/// Lowers every member body of `unit` (recursing into member types).
#[must_use]
pub fn lower_bodies(source: &Arc<str>, unit: &syntax::CompilationUnit) -> Vec<Body> {
    let mut out = Vec::new();
    for decl in &unit.types {
        lower_type_bodies(source, decl, &mut out);
    }
    out
}

fn lower_type_bodies(source: &Arc<str>, decl: &syntax::TypeDecl, out: &mut Vec<Body>) {
    for member in &decl.body.members {
        match member {
            syntax::MemberDecl::Method(method) | syntax::MemberDecl::Constructor(method) => {
                if let Some(block) = &method.body {
                    out.push(lower_method(source, method, block));
                }
            }
            syntax::MemberDecl::Initializer(init) => {
                let mut ctx = BodyLower::new(source);
                let root = ctx.lower_block(&init.body);
                out.push(ctx.finish("<init>", Vec::new(), root));
            }
            syntax::MemberDecl::Field(field) => {
                if field.declarators.iter().all(|d| d.initializer.is_none()) {
                    continue;
                }
                let mut ctx = BodyLower::new(source);
                let initializers = field
                    .declarators
                    .iter()
                    .filter_map(|d| d.initializer.as_ref())
                    .map(|init| ctx.lower_expr(init))
                    .collect();
                let field_stmt = ctx.alloc_stmt(Stmt::Field {
                    initializers,
                    range: field.range,
                });
                let root = ctx.alloc_stmt(Stmt::Block {
                    statements: vec![field_stmt],
                    range: field.range,
                });
                let name = field
                    .declarators
                    .first()
                    .map(|d| d.name.as_str())
                    .unwrap_or("<field>");
                out.push(ctx.finish(name, Vec::new(), root));
            }
            syntax::MemberDecl::Type(nested) => lower_type_bodies(source, nested, out),
        }
    }
}

fn lower_method(source: &Arc<str>, method: &syntax::MethodDecl, block: &syntax::Block) -> Body {
    let mut ctx = BodyLower::new(source);
    ctx.push_scope();
    let params = method
        .params
        .iter()
        .map(|param| ctx.declare_param(param, LocalKind::Param, None))
        .collect();
    let root = ctx.lower_block(block);
    ctx.pop_scope();
    ctx.finish(&method.name, params, root)
}

struct BodyLower<'a> {
    source: &'a Arc<str>,
    stmts: Arena<Stmt>,
    exprs: Arena<Expr>,
    locals: Arena<Local>,
    /// `None` entries are fields of local classes shadowing outer locals.
    scopes: Vec<Vec<(String, Option<LocalId>)>>,
    owners: Vec<Node>,
}

impl<'a> BodyLower<'a> {
    fn new(source: &'a Arc<str>) -> Self {
        Self {
            source,
            stmts: Arena::default(),
            exprs: Arena::default(),
            locals: Arena::default(),
            scopes: vec![Vec::new()],
            owners: Vec::new(),
        }
    }

    fn finish(self, owner_name: &str, params: Vec<LocalId>, root: StmtId) -> Body {
        let mut body = Body {
            owner_name: owner_name.to_string(),
            params,
            root,
            stmts: self.stmts,
            exprs: self.exprs,
            locals: self.locals,
            stmt_parents: Vec::new(),
            expr_parents: Vec::new(),
            source: Arc::clone(self.source),
        };

        let mut stmt_parents = vec![None; body.stmts.len()];
        let mut expr_parents = vec![None; body.exprs.len()];
        let nodes = (0..body.stmts.len() as u32)
            .map(|idx| Node::Stmt(StmtId::from_raw(idx)))
            .chain((0..body.exprs.len() as u32).map(|idx| Node::Expr(ExprId::from_raw(idx))));
        for parent in nodes {
            for child in body.children(parent) {
                match child {
                    Node::Stmt(id) => stmt_parents[id.idx()] = Some(parent),
                    Node::Expr(id) => expr_parents[id.idx()] = Some(parent),
                }
            }
        }
        body.stmt_parents = stmt_parents;
        body.expr_parents = expr_parents;
        body
    }

    fn alloc_stmt(&mut self, stmt: Stmt) -> StmtId {
        StmtId::from_raw(self.stmts.alloc(stmt))
    }

    fn alloc_expr(&mut self, expr: Expr) -> ExprId {
        ExprId::from_raw(self.exprs.alloc(expr))
    }

    /// Allocates a placeholder so children can refer to the statement before it is built.
    fn reserve_stmt(&mut self, range: Span) -> StmtId {
        self.alloc_stmt(Stmt::Empty { range })
    }

    fn set_stmt(&mut self, id: StmtId, stmt: Stmt) -> StmtId {
        self.stmts.replace(id.idx() as u32, stmt);
        id
    }

    fn reserve_expr(&mut self, range: Span) -> ExprId {
        self.alloc_expr(Expr::Missing {
            refs: Vec::new(),
            range,
        })
    }

    fn set_expr(&mut self, id: ExprId, expr: Expr) -> ExprId {
        self.exprs.replace(id.idx() as u32, expr);
        id
    }

    fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, local: Option<LocalId>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push((name.to_string(), local));
        }
    }

    fn resolve(&self, name: &str) -> Option<LocalId> {
        for scope in self.scopes.iter().rev() {
            if let Some((_, local)) = scope.iter().rev().find(|(n, _)| n == name) {
                return *local;
            }
        }
        None
    }

    fn owner(&self) -> Option<Node> {
        self.owners.last().copied()
    }

    fn alloc_local(&mut self, local: Local) -> LocalId {
        let name = local.name.clone();
        let id = LocalId::from_raw(self.locals.alloc(local));
        self.declare(&name, Some(id));
        id
    }

    fn declare_param(
        &mut self,
        param: &syntax::ParamDecl,
        kind: LocalKind,
        decl: Option<StmtId>,
    ) -> LocalId {
        let owner = self.owner();
        self.alloc_local(Local {
            name: param.name.clone(),
            name_range: param.name_range,
            ty: param.ty.ty(),
            ty_text: param.ty.text.clone(),
            ty_range: param.ty.range,
            kind,
            is_final: param.is_final,
            decl,
            declarator: 0,
            initializer: None,
            owner,
            range: param.range,
        })
    }

    fn lower_declarators(
        &mut self,
        decl: &syntax::LocalVarStmt,
        stmt: StmtId,
        kind: LocalKind,
    ) -> Vec<LocalId> {
        let mut locals = Vec::with_capacity(decl.declarators.len());
        for (idx, declarator) in decl.declarators.iter().enumerate() {
            let initializer = declarator
                .initializer
                .as_ref()
                .map(|init| self.lower_expr(init));
            let mut ty_text = decl.ty.text.clone();
            for _ in 0..declarator.dims {
                ty_text.push_str("[]");
            }
            let ty = if decl.ty.is_var() {
                JavaType::Unknown
            } else {
                JavaType::parse(&ty_text)
            };
            let owner = self.owner();
            locals.push(self.alloc_local(Local {
                name: declarator.name.clone(),
                name_range: declarator.name_range,
                ty,
                ty_text,
                ty_range: decl.ty.range,
                kind,
                is_final: decl.is_final,
                decl: Some(stmt),
                declarator: idx,
                initializer,
                owner,
                range: declarator.range,
            }));
        }
        locals
    }

    fn lower_block(&mut self, block: &syntax::Block) -> StmtId {
        self.push_scope();
        let statements = block
            .statements
            .iter()
            .map(|stmt| self.lower_stmt(stmt))
            .collect();
        self.pop_scope();
        self.alloc_stmt(Stmt::Block {
            statements,
            range: block.range,
        })
    }

    /// Lowers a branch or loop body; a bare declaration there gets its own scope.
    fn lower_nested_stmt(&mut self, stmt: &syntax::Stmt) -> StmtId {
        self.push_scope();
        let id = self.lower_stmt(stmt);
        self.pop_scope();
        id
    }

    fn lower_stmt(&mut self, stmt: &syntax::Stmt) -> StmtId {
        match stmt {
            syntax::Stmt::Block(block) => self.lower_block(block),
            syntax::Stmt::LocalVar(decl) => {
                let id = self.reserve_stmt(decl.range);
                let locals = self.lower_declarators(decl, id, LocalKind::Local);
                self.set_stmt(
                    id,
                    Stmt::LocalVar {
                        locals,
                        is_final: decl.is_final,
                        range: decl.range,
                    },
                )
            }
            syntax::Stmt::LocalClass(decl) => self.lower_local_class(decl),
            syntax::Stmt::Expr(stmt) => {
                let expr = self.lower_expr(&stmt.expr);
                self.alloc_stmt(Stmt::Expr {
                    expr,
                    range: stmt.range,
                })
            }
            syntax::Stmt::If(stmt) => {
                let condition = self.lower_expr(&stmt.condition);
                let then_branch = self.lower_nested_stmt(&stmt.then_branch);
                let else_branch = stmt
                    .else_branch
                    .as_ref()
                    .map(|branch| self.lower_nested_stmt(branch));
                self.alloc_stmt(Stmt::If {
                    condition,
                    then_branch,
                    else_branch,
                    range: stmt.range,
                })
            }
            syntax::Stmt::For(stmt) => {
                let id = self.reserve_stmt(stmt.range);
                self.push_scope();
                let init = stmt.init.iter().map(|s| self.lower_stmt(s)).collect();
                let condition = stmt.condition.as_ref().map(|c| self.lower_expr(c));
                let update = stmt.update.iter().map(|u| self.lower_expr(u)).collect();
                let body = self.lower_nested_stmt(&stmt.body);
                self.pop_scope();
                self.set_stmt(
                    id,
                    Stmt::For {
                        init,
                        condition,
                        update,
                        body,
                        keyword_range: stmt.keyword_range,
                        range: stmt.range,
                    },
                )
            }
            syntax::Stmt::ForEach(stmt) => {
                let iterable = self.lower_expr(&stmt.iterable);
                let id = self.reserve_stmt(stmt.range);
                self.push_scope();
                let owner = self.owner();
                let local = self.alloc_local(Local {
                    name: stmt.name.clone(),
                    name_range: stmt.name_range,
                    ty: if stmt.ty.is_var() {
                        JavaType::Unknown
                    } else {
                        stmt.ty.ty()
                    },
                    ty_text: stmt.ty.text.clone(),
                    ty_range: stmt.ty.range,
                    kind: LocalKind::ForEach,
                    is_final: stmt.is_final,
                    decl: Some(id),
                    declarator: 0,
                    initializer: None,
                    owner,
                    range: stmt.ty.range.cover(stmt.name_range),
                });
                let body = self.lower_nested_stmt(&stmt.body);
                self.pop_scope();
                self.set_stmt(
                    id,
                    Stmt::ForEach {
                        local,
                        iterable,
                        body,
                        keyword_range: stmt.keyword_range,
                        range: stmt.range,
                    },
                )
            }
            syntax::Stmt::While(stmt) => {
                let condition = self.lower_expr(&stmt.condition);
                let body = self.lower_nested_stmt(&stmt.body);
                self.alloc_stmt(Stmt::While {
                    condition,
                    body,
                    keyword_range: stmt.keyword_range,
                    range: stmt.range,
                })
            }
            syntax::Stmt::Do(stmt) => {
                let body = self.lower_nested_stmt(&stmt.body);
                let condition = self.lower_expr(&stmt.condition);
                self.alloc_stmt(Stmt::Do {
                    body,
                    condition,
                    range: stmt.range,
                })
            }
            syntax::Stmt::Return(stmt) => {
                let expr = stmt.expr.as_ref().map(|e| self.lower_expr(e));
                self.alloc_stmt(Stmt::Return {
                    expr,
                    range: stmt.range,
                })
            }
            syntax::Stmt::Break(stmt) => self.alloc_stmt(Stmt::Break {
                label: stmt.label.clone(),
                range: stmt.range,
            }),
            syntax::Stmt::Continue(stmt) => self.alloc_stmt(Stmt::Continue {
                label: stmt.label.clone(),
                range: stmt.range,
            }),
            syntax::Stmt::Labeled(stmt) => {
                let body = self.lower_nested_stmt(&stmt.body);
                self.alloc_stmt(Stmt::Labeled {
                    label: stmt.label.clone(),
                    body,
                    range: stmt.range,
                })
            }
            syntax::Stmt::Throw(stmt) => {
                let expr = self.lower_expr(&stmt.expr);
                self.alloc_stmt(Stmt::Throw {
                    expr,
                    range: stmt.range,
                })
            }
            syntax::Stmt::Try(stmt) => self.lower_try(stmt),
            syntax::Stmt::Switch(stmt) => {
                let selector = self.lower_expr(&stmt.selector);
                self.push_scope();
                let groups = stmt
                    .groups
                    .iter()
                    .map(|group| SwitchGroup {
                        labels: group.labels.iter().map(|l| self.lower_expr(l)).collect(),
                        statements: group.statements.iter().map(|s| self.lower_stmt(s)).collect(),
                        range: group.range,
                    })
                    .collect();
                self.pop_scope();
                self.alloc_stmt(Stmt::Switch {
                    selector,
                    groups,
                    range: stmt.range,
                })
            }
            syntax::Stmt::Synchronized(stmt) => {
                let lock = self.lower_expr(&stmt.lock);
                let body = self.lower_block(&stmt.body);
                self.alloc_stmt(Stmt::Synchronized {
                    lock,
                    body,
                    range: stmt.range,
                })
            }
            syntax::Stmt::Other(range) => {
                let refs = self.opaque_refs(*range);
                self.alloc_stmt(Stmt::Other {
                    refs,
                    range: *range,
                })
            }
            syntax::Stmt::Empty(range) => self.alloc_stmt(Stmt::Empty { range: *range }),
        }
    }

    fn lower_try(&mut self, stmt: &syntax::TryStmt) -> StmtId {
        let id = self.reserve_stmt(stmt.range);
        self.push_scope();
        let resources = stmt
            .resources
            .iter()
            .map(|resource| {
                let resource_id = self.reserve_stmt(resource.range);
                let locals = self.lower_declarators(resource, resource_id, LocalKind::Resource);
                self.set_stmt(
                    resource_id,
                    Stmt::LocalVar {
                        locals,
                        is_final: true,
                        range: resource.range,
                    },
                )
            })
            .collect();
        let body = self.lower_block(&stmt.body);
        self.pop_scope();

        let catches = stmt
            .catches
            .iter()
            .map(|catch| {
                self.push_scope();
                let param = self.declare_param(&catch.param, LocalKind::Catch, Some(id));
                let body = self.lower_block(&catch.body);
                self.pop_scope();
                CatchClause { param, body }
            })
            .collect();
        let finally = stmt.finally.as_ref().map(|block| self.lower_block(block));
        self.set_stmt(
            id,
            Stmt::Try {
                resources,
                body,
                catches,
                finally,
                range: stmt.range,
            },
        )
    }

    fn lower_local_class(&mut self, decl: &syntax::TypeDecl) -> StmtId {
        let id = self.reserve_stmt(decl.range);
        self.owners.push(Node::Stmt(id));
        let members = self.lower_class_members(&decl.body);
        self.owners.pop();
        self.set_stmt(
            id,
            Stmt::LocalClass {
                name: decl.name.clone(),
                members,
                range: decl.range,
            },
        )
    }

    fn lower_class_members(&mut self, body: &syntax::ClassBody) -> Vec<StmtId> {
        self.push_scope();
        for member in &body.members {
            if let syntax::MemberDecl::Field(field) = member {
                for declarator in &field.declarators {
                    self.declare(&declarator.name, None);
                }
            }
        }

        let mut members = Vec::with_capacity(body.members.len());
        for member in &body.members {
            let stmt = match member {
                syntax::MemberDecl::Field(field) => {
                    let initializers = field
                        .declarators
                        .iter()
                        .filter_map(|d| d.initializer.as_ref())
                        .map(|init| self.lower_expr(init))
                        .collect();
                    self.alloc_stmt(Stmt::Field {
                        initializers,
                        range: field.range,
                    })
                }
                syntax::MemberDecl::Method(method) | syntax::MemberDecl::Constructor(method) => {
                    let id = self.reserve_stmt(method.range);
                    self.push_scope();
                    let params = method
                        .params
                        .iter()
                        .map(|param| self.declare_param(param, LocalKind::Param, Some(id)))
                        .collect();
                    let block = method.body.as_ref().map(|block| self.lower_block(block));
                    self.pop_scope();
                    self.set_stmt(
                        id,
                        Stmt::Method {
                            name: method.name.clone(),
                            params,
                            body: block,
                            range: method.range,
                        },
                    )
                }
                syntax::MemberDecl::Initializer(init) => {
                    let block = self.lower_block(&init.body);
                    self.alloc_stmt(Stmt::Method {
                        name: "<init>".to_string(),
                        params: Vec::new(),
                        body: Some(block),
                        range: init.range,
                    })
                }
                syntax::MemberDecl::Type(nested) => self.lower_local_class(nested),
            };
            members.push(stmt);
        }
        self.pop_scope();
        members
    }

    fn lower_expr(&mut self, expr: &syntax::Expr) -> ExprId {
        match expr {
            syntax::Expr::Name(name) => match self.resolve(&name.name) {
                Some(local) => self.alloc_expr(Expr::Local {
                    local,
                    range: name.range,
                }),
                None => self.alloc_expr(Expr::Name {
                    name: name.name.clone(),
                    range: name.range,
                }),
            },
            syntax::Expr::Literal(lit) => self.alloc_expr(Expr::Literal {
                kind: lit.kind,
                value: lit.value.clone(),
                range: lit.range,
            }),
            syntax::Expr::This(range) => self.alloc_expr(Expr::This { range: *range }),
            syntax::Expr::Super(range) => self.alloc_expr(Expr::Super { range: *range }),
            syntax::Expr::Type(ty) => self.alloc_expr(Expr::Type {
                text: ty.text.clone(),
                range: ty.range,
            }),
            syntax::Expr::FieldAccess(access) => {
                let receiver = self.lower_expr(&access.receiver);
                self.alloc_expr(Expr::FieldAccess {
                    receiver,
                    name: access.name.clone(),
                    name_range: access.name_range,
                    range: access.range,
                })
            }
            syntax::Expr::MethodCall(call) => {
                let receiver = call.receiver.as_ref().map(|r| self.lower_expr(r));
                let args = call.args.iter().map(|a| self.lower_expr(a)).collect();
                self.alloc_expr(Expr::Call {
                    receiver,
                    name: call.name.clone(),
                    name_range: call.name_range,
                    args,
                    range: call.range,
                })
            }
            syntax::Expr::New(new) => {
                let args = new.args.iter().map(|a| self.lower_expr(a)).collect();
                match &new.body {
                    None => self.alloc_expr(Expr::New {
                        ty: new.ty.text.clone(),
                        ty_range: new.ty.range,
                        args,
                        members: None,
                        range: new.range,
                    }),
                    Some(body) => {
                        let id = self.reserve_expr(new.range);
                        self.owners.push(Node::Expr(id));
                        let members = self.lower_class_members(body);
                        self.owners.pop();
                        self.set_expr(
                            id,
                            Expr::New {
                                ty: new.ty.text.clone(),
                                ty_range: new.ty.range,
                                args,
                                members: Some(members),
                                range: new.range,
                            },
                        )
                    }
                }
            }
            syntax::Expr::NewArray(array) => {
                let dims = array.dims.iter().map(|d| self.lower_expr(d)).collect();
                let initializer = array
                    .initializer
                    .as_ref()
                    .map(|init| self.lower_array_init(init));
                self.alloc_expr(Expr::NewArray {
                    elem_ty: array.elem_ty.text.clone(),
                    dims,
                    rank: array.rank,
                    initializer,
                    range: array.range,
                })
            }
            syntax::Expr::ArrayInit(init) => self.lower_array_init(init),
            syntax::Expr::ArrayAccess(access) => {
                let array = self.lower_expr(&access.array);
                let index = self.lower_expr(&access.index);
                self.alloc_expr(Expr::ArrayAccess {
                    array,
                    index,
                    range: access.range,
                })
            }
            syntax::Expr::Unary(unary) => {
                let operand = self.lower_expr(&unary.operand);
                self.alloc_expr(Expr::Unary {
                    op: unary.op,
                    operand,
                    range: unary.range,
                })
            }
            syntax::Expr::Binary(binary) => {
                let lhs = self.lower_expr(&binary.lhs);
                let rhs = self.lower_expr(&binary.rhs);
                self.alloc_expr(Expr::Binary {
                    op: binary.op,
                    lhs,
                    rhs,
                    range: binary.range,
                })
            }
            syntax::Expr::InstanceOf(instance_of) => {
                let operand = self.lower_expr(&instance_of.expr);
                let binding = instance_of.binding.as_ref().map(|(name, name_range)| {
                    let owner = self.owner();
                    self.alloc_local(Local {
                        name: name.clone(),
                        name_range: *name_range,
                        ty: instance_of.ty.ty(),
                        ty_text: instance_of.ty.text.clone(),
                        ty_range: instance_of.ty.range,
                        kind: LocalKind::Pattern,
                        is_final: false,
                        decl: None,
                        declarator: 0,
                        initializer: None,
                        owner,
                        range: instance_of.ty.range.cover(*name_range),
                    })
                });
                self.alloc_expr(Expr::InstanceOf {
                    expr: operand,
                    ty: instance_of.ty.text.clone(),
                    ty_range: instance_of.ty.range,
                    binding,
                    range: instance_of.range,
                })
            }
            syntax::Expr::Conditional(cond) => {
                let condition = self.lower_expr(&cond.condition);
                let then_expr = self.lower_expr(&cond.then_expr);
                let else_expr = self.lower_expr(&cond.else_expr);
                self.alloc_expr(Expr::Conditional {
                    condition,
                    then_expr,
                    else_expr,
                    range: cond.range,
                })
            }
            syntax::Expr::Assign(assign) => {
                let lhs = self.lower_expr(&assign.lhs);
                let rhs = self.lower_expr(&assign.rhs);
                self.alloc_expr(Expr::Assign {
                    op: assign.op,
                    lhs,
                    rhs,
                    range: assign.range,
                })
            }
            syntax::Expr::Cast(cast) => {
                let expr = self.lower_expr(&cast.expr);
                self.alloc_expr(Expr::Cast {
                    ty: cast.ty.text.clone(),
                    expr,
                    range: cast.range,
                })
            }
            syntax::Expr::Paren(paren) => {
                let expr = self.lower_expr(&paren.expr);
                self.alloc_expr(Expr::Paren {
                    expr,
                    range: paren.range,
                })
            }
            syntax::Expr::Lambda(lambda) => self.lower_lambda(lambda),
            syntax::Expr::MethodRef(method_ref) => {
                let receiver = self.lower_expr(&method_ref.receiver);
                self.alloc_expr(Expr::MethodRef {
                    receiver,
                    name: method_ref.name.clone(),
                    range: method_ref.range,
                })
            }
            syntax::Expr::ClassLiteral(lit) => self.alloc_expr(Expr::ClassLiteral {
                ty: lit.ty.text.clone(),
                range: lit.range,
            }),
            syntax::Expr::Missing(range) => {
                let refs = self.opaque_refs(*range);
                self.alloc_expr(Expr::Missing {
                    refs,
                    range: *range,
                })
            }
        }
    }

    fn lower_array_init(&mut self, init: &syntax::ArrayInitExpr) -> ExprId {
        let elements = init.elements.iter().map(|e| self.lower_expr(e)).collect();
        self.alloc_expr(Expr::ArrayInit {
            elements,
            range: init.range,
        })
    }

    fn lower_lambda(&mut self, lambda: &syntax::LambdaExpr) -> ExprId {
        let id = self.reserve_expr(lambda.range);
        self.owners.push(Node::Expr(id));
        self.push_scope();
        let params = lambda
            .params
            .iter()
            .map(|param| {
                let (ty, ty_text, ty_range) = match &param.ty {
                    Some(ty) if !ty.is_var() => (ty.ty(), ty.text.clone(), ty.range),
                    Some(ty) => (JavaType::Unknown, ty.text.clone(), ty.range),
                    None => (JavaType::Unknown, String::new(), param.name_range),
                };
                self.alloc_local(Local {
                    name: param.name.clone(),
                    name_range: param.name_range,
                    ty,
                    ty_text,
                    ty_range,
                    kind: LocalKind::LambdaParam,
                    is_final: false,
                    decl: None,
                    declarator: 0,
                    initializer: None,
                    owner: Some(Node::Expr(id)),
                    range: param.name_range,
                })
            })
            .collect();
        let body = match &lambda.body {
            syntax::LambdaBody::Expr(expr) => LambdaBody::Expr(self.lower_expr(expr)),
            syntax::LambdaBody::Block(block) => LambdaBody::Block(self.lower_block(block)),
        };
        self.pop_scope();
        self.owners.pop();
        self.set_expr(
            id,
            Expr::Lambda {
                params,
                body,
                range: lambda.range,
            },
        )
    }

    /// Locals named in text the parser could not structure. Each becomes an
    /// [`Expr::Local`] so reference and write queries still see it.
    fn opaque_refs(&mut self, range: Span) -> Vec<ExprId> {
        let source = Arc::clone(self.source);
        let text = range.slice(&source);
        let mut refs = Vec::new();
        for (start, end) in identifiers(text) {
            let name = &text[start..end];
            if let Some(local) = self.resolve(name) {
                refs.push(self.alloc_expr(Expr::Local {
                    local,
                    range: Span::new(range.start + start, range.start + end),
                }));
            }
        }
        refs
    }
}

/// Byte ranges of identifiers in `text` that are not member selections,
/// skipping string/char literals and comments.
fn identifiers(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    let mut prev_significant = b' ';
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'"' | b'\'' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
                prev_significant = b;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 2;
            }
            _ if b.is_ascii_alphabetic() || b == b'_' || b == b'$' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'$')
                {
                    i += 1;
                }
                if prev_significant != b'.' {
                    out.push((start, i));
                }
                prev_significant = b'a';
            }
            _ if b.is_ascii_digit() => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                    i += 1;
                }
                prev_significant = b'0';
            }
            _ => {
                if !b.is_ascii_whitespace() {
                    prev_significant = b;
                }
                i += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::identifiers;

    #[test]
    fn opaque_identifier_scan_skips_literals_and_members() {
        let text = "assert list.size() > n : \"n too big\"; // n";
        let names: Vec<&str> = identifiers(text)
            .into_iter()
            .map(|(s, e)| &text[s..e])
            .collect();
        assert_eq!(names, vec!["assert", "list", "n"]);
    }
}
