use std::sync::Arc;

use crate::hir::{
    AssignOp, BinaryOp, Body, Expr, ExprId, LiteralKind, LocalId, LocalKind, Node, Stmt, StmtId,
    UnaryOp,
};
use crate::lowering::lower_bodies;
use nova_syntax::{LiteralValue, ParseError};
use nova_types::{JavaType, PrimitiveType, Span};

/// A parsed and lowered source file.
#[derive(Debug, Clone)]
pub struct LoweredFile {
    pub source: Arc<str>,
    pub package: Option<nova_syntax::PackageDecl>,
    pub imports: Vec<nova_syntax::ImportDecl>,
    pub bodies: Vec<Body>,
    pub errors: Vec<ParseError>,
}

/// Parse `text` and lower every member body in it.
#[must_use]
pub fn lower_file(text: &str) -> LoweredFile {
    let source: Arc<str> = Arc::from(text);
    let parse = nova_syntax::parse(&source);
    let bodies = lower_bodies(&source, parse.compilation_unit());
    let unit = parse.compilation_unit();
    LoweredFile {
        package: unit.package.clone(),
        imports: unit.imports.clone(),
        errors: parse.errors().to_vec(),
        source,
        bodies,
    }
}

/// Recursion guard for constant folding through locals.
const MAX_CONSTANT_DEPTH: usize = 8;

/// Methods that neither mutate their receiver nor their arguments.
const PURE_METHODS: &[&str] = &[
    "size",
    "length",
    "isEmpty",
    "get",
    "getKey",
    "getValue",
    "charAt",
    "contains",
    "containsKey",
    "containsValue",
    "equals",
    "equalsIgnoreCase",
    "hashCode",
    "toString",
    "substring",
    "trim",
    "strip",
    "startsWith",
    "endsWith",
    "indexOf",
    "lastIndexOf",
    "compareTo",
    "toUpperCase",
    "toLowerCase",
    "valueOf",
    "intValue",
    "longValue",
    "doubleValue",
    "booleanValue",
    "abs",
    "max",
    "min",
    "isDigit",
    "isLetter",
    "isWhitespace",
];

impl Body {
    pub fn skip_parens(&self, mut expr: ExprId) -> ExprId {
        while let Expr::Paren { expr: inner, .. } = &self.exprs[expr] {
            expr = *inner;
        }
        expr
    }

    /// Parent of `expr`, looking through enclosing parentheses.
    pub fn parent_skip_parens(&self, mut expr: ExprId) -> Option<Node> {
        loop {
            match self.expr_parent(expr)? {
                Node::Expr(parent) if matches!(self.exprs[parent], Expr::Paren { .. }) => {
                    expr = parent
                }
                other => return Some(other),
            }
        }
    }

    /// The local `expr` refers to, if it is a (parenthesized) local reference.
    pub fn as_local(&self, expr: ExprId) -> Option<LocalId> {
        match &self.exprs[self.skip_parens(expr)] {
            Expr::Local { local, .. } => Some(*local),
            _ => None,
        }
    }

    pub fn is_reference_to(&self, expr: ExprId, local: LocalId) -> bool {
        self.as_local(expr) == Some(local)
    }

    /// References to `local` at or below `within`, in source order.
    pub fn references(&self, local: LocalId, within: Node) -> Vec<ExprId> {
        let mut out = Vec::new();
        self.walk(within, &mut |node| {
            if let Node::Expr(id) = node {
                if matches!(&self.exprs[id], Expr::Local { local: l, .. } if *l == local) {
                    out.push(id);
                }
            }
            true
        });
        out
    }

    pub fn is_referenced(&self, local: LocalId, within: Node) -> bool {
        let mut found = false;
        self.walk(within, &mut |node| {
            if found {
                return false;
            }
            if let Node::Expr(id) = node {
                if matches!(&self.exprs[id], Expr::Local { local: l, .. } if *l == local) {
                    found = true;
                }
            }
            true
        });
        found
    }

    /// References to `local` anywhere in the body.
    pub fn all_references(&self, local: LocalId) -> Vec<ExprId> {
        self.references(local, Node::Stmt(self.root))
    }

    /// Locals referenced at or below `within`, each once, in order of first use.
    pub fn referenced_locals(&self, within: Node) -> Vec<LocalId> {
        let mut out = Vec::new();
        self.walk(within, &mut |node| {
            if let Node::Expr(id) = node {
                if let Expr::Local { local, .. } = &self.exprs[id] {
                    if !out.contains(local) {
                        out.push(*local);
                    }
                }
            }
            true
        });
        out
    }

    /// Whether `expr` is written: an assignment target, an increment/decrement
    /// operand, or a name inside text the parser could not structure.
    pub fn is_write(&self, expr: ExprId) -> bool {
        match self.parent_skip_parens(expr) {
            Some(Node::Expr(parent)) => match &self.exprs[parent] {
                Expr::Assign { lhs, .. } => self.skip_parens(*lhs) == expr,
                Expr::Unary { op, .. } => op.is_increment_or_decrement(),
                Expr::Missing { .. } => true,
                _ => false,
            },
            Some(Node::Stmt(parent)) => matches!(self.stmts[parent], Stmt::Other { .. }),
            None => false,
        }
    }

    /// The assignment or increment expression writing `expr`, if any.
    pub fn write_of(&self, expr: ExprId) -> Option<ExprId> {
        match self.parent_skip_parens(expr)? {
            Node::Expr(parent) => match &self.exprs[parent] {
                Expr::Assign { lhs, .. } if self.skip_parens(*lhs) == expr => Some(parent),
                Expr::Unary { op, .. } if op.is_increment_or_decrement() => Some(parent),
                _ => None,
            },
            Node::Stmt(_) => None,
        }
    }

    pub fn writes(&self, local: LocalId, within: Node) -> Vec<ExprId> {
        self.references(local, within)
            .into_iter()
            .filter(|r| self.is_write(*r))
            .collect()
    }

    /// `final`, or never reassigned after its declaration.
    pub fn is_effectively_final(&self, local: LocalId) -> bool {
        let data = &self.locals[local];
        if data.is_final {
            return true;
        }
        let writes = self.writes(local, Node::Stmt(self.root));
        if data.initializer.is_some() || data.kind != LocalKind::Local {
            return writes.is_empty();
        }
        // A blank local may be assigned exactly once, outside any loop nested
        // in its declaring block.
        let [write] = writes.as_slice() else {
            return writes.is_empty();
        };
        let Some(assign) = self.write_of(*write) else {
            return false;
        };
        if !matches!(&self.exprs[assign], Expr::Assign { op, .. } if *op == AssignOp::Assign)
        {
            return false;
        }
        let scope = data.decl.and_then(|decl| self.stmt_parent(decl));
        let mut current = self.expr_parent(assign);
        while let Some(node) = current {
            if Some(node) == scope {
                break;
            }
            if let Node::Stmt(stmt) = node {
                if self.stmts[stmt].is_loop() {
                    return false;
                }
            }
            current = self.parent(node);
        }
        true
    }

    /// Innermost lambda, anonymous class or local class enclosing `node`
    /// (excluding `node` itself).
    pub fn surrounder(&self, node: Node) -> Option<Node> {
        let mut current = self.parent(node);
        while let Some(n) = current {
            match n {
                Node::Expr(id)
                    if matches!(
                        self.exprs[id],
                        Expr::Lambda { .. } | Expr::New { members: Some(_), .. }
                    ) =>
                {
                    return Some(n)
                }
                Node::Stmt(id) if matches!(self.stmts[id], Stmt::LocalClass { .. }) => {
                    return Some(n)
                }
                _ => {}
            }
            current = self.parent(n);
        }
        None
    }

    /// The statement containing `node` (or `node` itself when it is a statement).
    pub fn enclosing_stmt(&self, node: Node) -> Option<StmtId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if let Node::Stmt(id) = n {
                return Some(id);
            }
            current = self.parent(n);
        }
        None
    }

    /// Statements of the block (or switch group) holding `stmt`, and its index.
    pub fn siblings(&self, stmt: StmtId) -> Option<(Vec<StmtId>, usize)> {
        let Node::Stmt(parent) = self.stmt_parent(stmt)? else {
            return None;
        };
        let list: Vec<StmtId> = match &self.stmts[parent] {
            Stmt::Block { statements, .. } => statements.clone(),
            Stmt::Switch { groups, .. } => groups
                .iter()
                .find(|g| g.statements.contains(&stmt))?
                .statements
                .clone(),
            _ => return None,
        };
        let idx = list.iter().position(|s| *s == stmt)?;
        Some((list, idx))
    }

    /// Labeled statements wrapping `stmt`, outermost last.
    pub fn label_wrapped(&self, mut stmt: StmtId) -> StmtId {
        while let Some(Node::Stmt(parent)) = self.stmt_parent(stmt) {
            if matches!(self.stmts[parent], Stmt::Labeled { .. }) {
                stmt = parent;
            } else {
                break;
            }
        }
        stmt
    }

    pub fn prev_statement(&self, stmt: StmtId) -> Option<StmtId> {
        let (list, idx) = self.siblings(self.label_wrapped(stmt))?;
        idx.checked_sub(1).map(|i| list[i])
    }

    pub fn next_statement(&self, stmt: StmtId) -> Option<StmtId> {
        let (list, idx) = self.siblings(self.label_wrapped(stmt))?;
        list.get(idx + 1).copied()
    }

    /// Statements of a block, or the statement itself when it is not a block.
    pub fn statements_of(&self, stmt: StmtId) -> Vec<StmtId> {
        match &self.stmts[stmt] {
            Stmt::Block { statements, .. } => statements.clone(),
            _ => vec![stmt],
        }
    }

    /// The declared type of `local`, inferring `var` from its initializer or
    /// iterated value.
    pub fn local_type(&self, local: LocalId) -> JavaType {
        let data = &self.locals[local];
        if data.ty.is_known() {
            return data.ty.clone();
        }
        if let Some(init) = data.initializer {
            return self.type_of(init);
        }
        if data.kind == LocalKind::ForEach {
            if let Some(Stmt::ForEach { iterable, .. }) = data.decl.map(|d| &self.stmts[d]) {
                return self.type_of(*iterable).iterable_element();
            }
        }
        JavaType::Unknown
    }

    /// Conservative static type of `expr`; `Unknown` when it cannot be told
    /// from local information.
    pub fn type_of(&self, expr: ExprId) -> JavaType {
        match &self.exprs[expr] {
            Expr::Literal { kind, .. } => match kind {
                LiteralKind::Int => JavaType::INT,
                LiteralKind::Long => JavaType::LONG,
                LiteralKind::Float => JavaType::Primitive(PrimitiveType::Float),
                LiteralKind::Double => JavaType::DOUBLE,
                LiteralKind::Char => JavaType::CHAR,
                LiteralKind::String => JavaType::string(),
                LiteralKind::Bool => JavaType::BOOLEAN,
                LiteralKind::Null => JavaType::Null,
            },
            Expr::Local { local, .. } => self.local_type(*local),
            Expr::FieldAccess {
                receiver, name, ..
            } => {
                if name == "length" && self.type_of(*receiver).is_array() {
                    return JavaType::INT;
                }
                match (&self.exprs[*receiver], name.as_str()) {
                    (Expr::Name { name: class, .. }, "MAX_VALUE" | "MIN_VALUE") => {
                        match PrimitiveType::from_box_name(class) {
                            Some(p) => JavaType::Primitive(p),
                            None => JavaType::Unknown,
                        }
                    }
                    _ => JavaType::Unknown,
                }
            }
            Expr::Call {
                receiver,
                name,
                args,
                ..
            } => self.call_type(*receiver, name, args),
            Expr::New { ty, .. } => JavaType::parse(ty),
            Expr::NewArray { elem_ty, rank, .. } => {
                let mut ty = JavaType::parse(elem_ty);
                if !ty.is_known() {
                    return ty;
                }
                for _ in 0..*rank {
                    ty = JavaType::Array(Box::new(ty));
                }
                ty
            }
            Expr::ArrayAccess { array, .. } => self
                .type_of(*array)
                .array_component()
                .cloned()
                .unwrap_or(JavaType::Unknown),
            Expr::Unary { op, operand, .. } => {
                let ty = self.type_of(*operand);
                match op {
                    UnaryOp::Not => JavaType::BOOLEAN,
                    UnaryOp::Plus | UnaryOp::Minus | UnaryOp::BitNot => ty
                        .unboxed()
                        .and_then(|p| p.promote(PrimitiveType::Int))
                        .map_or(JavaType::Unknown, JavaType::Primitive),
                    _ => ty,
                }
            }
            Expr::Binary { op, lhs, rhs, .. } => self.binary_type(*op, *lhs, *rhs),
            Expr::InstanceOf { .. } => JavaType::BOOLEAN,
            Expr::Conditional {
                then_expr,
                else_expr,
                ..
            } => {
                let then_ty = self.type_of(*then_expr);
                let else_ty = self.type_of(*else_expr);
                if then_ty.same_as(&else_ty) {
                    return then_ty;
                }
                match (then_ty.as_primitive(), else_ty.as_primitive()) {
                    (Some(a), Some(b)) => {
                        a.promote(b).map_or(JavaType::Unknown, JavaType::Primitive)
                    }
                    _ if matches!(else_ty, JavaType::Null) => then_ty,
                    _ if matches!(then_ty, JavaType::Null) => else_ty,
                    _ => JavaType::Unknown,
                }
            }
            Expr::Assign { lhs, .. } => self.type_of(*lhs),
            Expr::Cast { ty, .. } => JavaType::parse(ty),
            Expr::Paren { expr, .. } => self.type_of(*expr),
            Expr::ClassLiteral { ty, .. } => {
                JavaType::class("Class", vec![JavaType::parse(ty).boxed()])
            }
            Expr::Name { .. }
            | Expr::This { .. }
            | Expr::Super { .. }
            | Expr::Type { .. }
            | Expr::ArrayInit { .. }
            | Expr::Lambda { .. }
            | Expr::MethodRef { .. }
            | Expr::Missing { .. } => JavaType::Unknown,
        }
    }

    fn binary_type(&self, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> JavaType {
        if op.is_comparison() || matches!(op, BinaryOp::And | BinaryOp::Or) {
            return JavaType::BOOLEAN;
        }
        let lhs_ty = self.type_of(lhs);
        let rhs_ty = self.type_of(rhs);
        if op == BinaryOp::Add && (lhs_ty.is_string() || rhs_ty.is_string()) {
            return JavaType::string();
        }
        let (Some(a), Some(b)) = (lhs_ty.unboxed(), rhs_ty.unboxed()) else {
            return JavaType::Unknown;
        };
        match op {
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => a
                .promote(PrimitiveType::Int)
                .map_or(JavaType::Unknown, JavaType::Primitive),
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor
                if a == PrimitiveType::Boolean && b == PrimitiveType::Boolean =>
            {
                JavaType::BOOLEAN
            }
            _ => a.promote(b).map_or(JavaType::Unknown, JavaType::Primitive),
        }
    }

    fn call_type(&self, receiver: Option<ExprId>, name: &str, args: &[ExprId]) -> JavaType {
        let receiver_ty = receiver.map(|r| self.type_of(r)).unwrap_or(JavaType::Unknown);
        let static_class = receiver.and_then(|r| match &self.exprs[r] {
            Expr::Name { name, .. } => Some(name.as_str()),
            _ => None,
        });

        match (static_class, name) {
            (Some("Math"), "max" | "min" | "abs") => {
                let mut ty = match args.first() {
                    Some(arg) => self.type_of(*arg),
                    None => return JavaType::Unknown,
                };
                for arg in &args[1..] {
                    ty = match (ty.unboxed(), self.type_of(*arg).unboxed()) {
                        (Some(a), Some(b)) => {
                            a.promote(b).map_or(JavaType::Unknown, JavaType::Primitive)
                        }
                        _ => JavaType::Unknown,
                    };
                }
                return ty;
            }
            (Some("String"), "valueOf" | "join" | "format") => return JavaType::string(),
            (Some("Integer"), "parseInt") => return JavaType::INT,
            (Some("Long"), "parseLong") => return JavaType::LONG,
            (Some("Double"), "parseDouble") => return JavaType::DOUBLE,
            (Some(class), "valueOf") => {
                if let Some(p) = PrimitiveType::from_box_name(class) {
                    return JavaType::class(p.box_name(), Vec::new());
                }
            }
            (Some("Character"), "isDigit" | "isLetter" | "isWhitespace" | "isUpperCase")
            | (Some("Objects"), "equals" | "isNull" | "nonNull") => return JavaType::BOOLEAN,
            _ => {}
        }

        match name {
            "equals" | "isEmpty" | "contains" | "containsKey" | "containsValue" | "startsWith"
            | "endsWith" | "hasNext" | "add" => JavaType::BOOLEAN,
            "size" | "hashCode" | "compareTo" | "indexOf" | "lastIndexOf" | "intValue" => {
                JavaType::INT
            }
            "length" if receiver_ty.is_char_sequence() => JavaType::INT,
            "charAt" => JavaType::CHAR,
            "longValue" => JavaType::LONG,
            "doubleValue" => JavaType::DOUBLE,
            "toString" => JavaType::string(),
            "substring" | "trim" | "strip" | "toUpperCase" | "toLowerCase" | "concat"
            | "repeat" | "replace"
                if receiver_ty.is_string() =>
            {
                JavaType::string()
            }
            "split" if receiver_ty.is_string() => {
                JavaType::Array(Box::new(JavaType::string()))
            }
            "toCharArray" => JavaType::Array(Box::new(JavaType::CHAR)),
            "readLine" => JavaType::string(),
            "get" if receiver_ty.is_map() => receiver_ty.type_arg(1),
            "get" if receiver_ty.is_collection() => receiver_ty.type_arg(0),
            "getKey" if receiver_ty.is_class("Entry") => receiver_ty.type_arg(0),
            "getValue" if receiver_ty.is_class("Entry") => receiver_ty.type_arg(1),
            "keySet" if receiver_ty.is_map() => {
                JavaType::class("Set", vec![receiver_ty.type_arg(0)])
            }
            "values" if receiver_ty.is_map() => {
                JavaType::class("Collection", vec![receiver_ty.type_arg(1)])
            }
            "entrySet" if receiver_ty.is_map() => JavaType::class(
                "Set",
                vec![JavaType::class(
                    "Map.Entry",
                    vec![receiver_ty.type_arg(0), receiver_ty.type_arg(1)],
                )],
            ),
            "stream" if receiver_ty.is_collection() => {
                JavaType::class("Stream", vec![receiver_ty.type_arg(0)])
            }
            "iterator" if receiver_ty.is_collection_like() => {
                JavaType::class("Iterator", vec![receiver_ty.type_arg(0)])
            }
            "next" if receiver_ty.is_class("Iterator") => receiver_ty.type_arg(0),
            _ => JavaType::Unknown,
        }
    }

    /// Compile-time value of `expr`, folding through effectively final locals.
    pub fn constant_value(&self, expr: ExprId) -> Option<LiteralValue> {
        self.constant_value_at(expr, 0)
    }

    fn constant_value_at(&self, expr: ExprId, depth: usize) -> Option<LiteralValue> {
        if depth > MAX_CONSTANT_DEPTH {
            return None;
        }
        match &self.exprs[expr] {
            Expr::Literal { kind, value, .. } => nova_syntax::parse_literal(*kind, value).ok(),
            Expr::Paren { expr, .. } => self.constant_value_at(*expr, depth + 1),
            Expr::Local { local, .. } => {
                let init = self.locals[*local].initializer?;
                if !self.is_effectively_final(*local) {
                    return None;
                }
                self.constant_value_at(init, depth + 1)
            }
            Expr::FieldAccess {
                receiver, name, ..
            } => match (&self.exprs[*receiver], name.as_str()) {
                (Expr::Name { name: class, .. }, field) => match (class.as_str(), field) {
                    ("Integer", "MAX_VALUE") => Some(LiteralValue::Int(i32::MAX)),
                    ("Integer", "MIN_VALUE") => Some(LiteralValue::Int(i32::MIN)),
                    ("Long", "MAX_VALUE") => Some(LiteralValue::Long(i64::MAX)),
                    ("Long", "MIN_VALUE") => Some(LiteralValue::Long(i64::MIN)),
                    _ => None,
                },
                _ => None,
            },
            Expr::Unary { op, operand, .. } => {
                // `-2147483648` is only valid as a negated literal.
                if *op == UnaryOp::Minus {
                    if let Expr::Literal {
                        kind: LiteralKind::Int,
                        value,
                        ..
                    } = &self.exprs[*operand]
                    {
                        if let Ok(v) = nova_syntax::parse_long_literal(value) {
                            return i32::try_from(-v).ok().map(LiteralValue::Int);
                        }
                    }
                }
                let value = self.constant_value_at(*operand, depth + 1)?;
                match (op, value) {
                    (UnaryOp::Minus, LiteralValue::Int(v)) => v.checked_neg().map(LiteralValue::Int),
                    (UnaryOp::Minus, LiteralValue::Long(v)) => {
                        v.checked_neg().map(LiteralValue::Long)
                    }
                    (UnaryOp::Minus, LiteralValue::Double(v)) => Some(LiteralValue::Double(-v)),
                    (UnaryOp::Plus, v) => Some(v),
                    (UnaryOp::Not, LiteralValue::Bool(b)) => Some(LiteralValue::Bool(!b)),
                    (UnaryOp::BitNot, LiteralValue::Int(v)) => Some(LiteralValue::Int(!v)),
                    (UnaryOp::BitNot, LiteralValue::Long(v)) => Some(LiteralValue::Long(!v)),
                    _ => None,
                }
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                let lhs = self.constant_value_at(*lhs, depth + 1)?;
                let rhs = self.constant_value_at(*rhs, depth + 1)?;
                fold_binary(*op, lhs, rhs)
            }
            _ => None,
        }
    }

    /// Constant string value, treating `char` constants as one-character strings.
    pub fn constant_string(&self, expr: ExprId) -> Option<String> {
        match self.constant_value(expr)? {
            LiteralValue::String(s) => Some(s),
            LiteralValue::Char(c) => Some(c.to_string()),
            _ => None,
        }
    }

    /// Constant integral value (`int`, `long` or `char`).
    pub fn constant_int(&self, expr: ExprId) -> Option<i64> {
        match self.constant_value(expr)? {
            LiteralValue::Int(v) => Some(i64::from(v)),
            LiteralValue::Long(v) => Some(v),
            LiteralValue::Char(c) => Some(i64::from(u32::from(c))),
            _ => None,
        }
    }

    /// Whether evaluating `expr` cannot change program state.
    pub fn is_side_effect_free(&self, expr: ExprId) -> bool {
        let mut pure = true;
        self.walk(Node::Expr(expr), &mut |node| {
            if !pure {
                return false;
            }
            let Node::Expr(id) = node else {
                pure = false;
                return false;
            };
            match &self.exprs[id] {
                Expr::Assign { .. } | Expr::New { .. } | Expr::Missing { .. } => pure = false,
                Expr::Unary { op, .. } if op.is_increment_or_decrement() => pure = false,
                Expr::Call { name, .. } if !PURE_METHODS.contains(&name.as_str()) => {
                    pure = false
                }
                Expr::Lambda { .. } | Expr::MethodRef { .. } => return false,
                _ => {}
            }
            pure
        });
        pure
    }

    /// Structural equality of two expressions, ignoring parentheses.
    pub fn equivalent(&self, a: ExprId, b: ExprId) -> bool {
        let a = self.skip_parens(a);
        let b = self.skip_parens(b);
        if a == b {
            return true;
        }
        let all = |xs: &[ExprId], ys: &[ExprId]| {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| self.equivalent(*x, *y))
        };
        match (&self.exprs[a], &self.exprs[b]) {
            (Expr::Local { local: x, .. }, Expr::Local { local: y, .. }) => x == y,
            (Expr::Name { name: x, .. }, Expr::Name { name: y, .. }) => x == y,
            (
                Expr::Literal {
                    kind: k1, value: v1, ..
                },
                Expr::Literal {
                    kind: k2, value: v2, ..
                },
            ) => k1 == k2 && v1 == v2,
            (Expr::This { .. }, Expr::This { .. }) | (Expr::Super { .. }, Expr::Super { .. }) => {
                true
            }
            (Expr::Type { text: x, .. }, Expr::Type { text: y, .. })
            | (Expr::ClassLiteral { ty: x, .. }, Expr::ClassLiteral { ty: y, .. }) => x == y,
            (
                Expr::FieldAccess {
                    receiver: r1,
                    name: n1,
                    ..
                },
                Expr::FieldAccess {
                    receiver: r2,
                    name: n2,
                    ..
                },
            ) => n1 == n2 && self.equivalent(*r1, *r2),
            (
                Expr::Call {
                    receiver: r1,
                    name: n1,
                    args: a1,
                    ..
                },
                Expr::Call {
                    receiver: r2,
                    name: n2,
                    args: a2,
                    ..
                },
            ) => {
                n1 == n2
                    && all(a1, a2)
                    && match (r1, r2) {
                        (Some(r1), Some(r2)) => self.equivalent(*r1, *r2),
                        (None, None) => true,
                        _ => false,
                    }
            }
            (
                Expr::ArrayAccess {
                    array: a1,
                    index: i1,
                    ..
                },
                Expr::ArrayAccess {
                    array: a2,
                    index: i2,
                    ..
                },
            ) => self.equivalent(*a1, *a2) && self.equivalent(*i1, *i2),
            (
                Expr::Unary {
                    op: o1, operand: x, ..
                },
                Expr::Unary {
                    op: o2, operand: y, ..
                },
            ) => o1 == o2 && self.equivalent(*x, *y),
            (
                Expr::Binary {
                    op: o1,
                    lhs: l1,
                    rhs: r1,
                    ..
                },
                Expr::Binary {
                    op: o2,
                    lhs: l2,
                    rhs: r2,
                    ..
                },
            ) => o1 == o2 && self.equivalent(*l1, *l2) && self.equivalent(*r1, *r2),
            (
                Expr::Cast {
                    ty: t1, expr: x, ..
                },
                Expr::Cast {
                    ty: t2, expr: y, ..
                },
            ) => t1 == t2 && self.equivalent(*x, *y),
            (
                Expr::Conditional {
                    condition: c1,
                    then_expr: t1,
                    else_expr: e1,
                    ..
                },
                Expr::Conditional {
                    condition: c2,
                    then_expr: t2,
                    else_expr: e2,
                    ..
                },
            ) => all(&[*c1, *t1, *e1], &[*c2, *t2, *e2]),
            (
                Expr::New {
                    ty: t1,
                    args: a1,
                    members: None,
                    ..
                },
                Expr::New {
                    ty: t2,
                    args: a2,
                    members: None,
                    ..
                },
            ) => t1 == t2 && all(a1, a2),
            _ => false,
        }
    }

    /// Binding strength of `expr`, higher binds tighter.
    pub fn precedence(&self, expr: ExprId) -> u8 {
        match &self.exprs[expr] {
            Expr::Lambda { .. } | Expr::Assign { .. } => 1,
            Expr::Conditional { .. } => 2,
            Expr::Binary { op, .. } => op.precedence() + 2,
            Expr::InstanceOf { .. } => BinaryOp::Lt.precedence() + 2,
            Expr::Cast { .. } => 13,
            Expr::Unary { op, .. } => match op {
                UnaryOp::PostInc | UnaryOp::PostDec => 14,
                _ => 13,
            },
            _ => 15,
        }
    }

    /// Source text of `expr`, parenthesized unless it binds at least as tight as `min`.
    pub fn text_at_precedence(&self, expr: ExprId, min: u8) -> String {
        let text = self.expr_text(expr);
        if self.precedence(expr) >= min {
            text.to_string()
        } else {
            format!("({text})")
        }
    }

    /// Source text of `expr` as a boolean negation.
    pub fn negated_text(&self, expr: ExprId) -> String {
        let expr = self.skip_parens(expr);
        match &self.exprs[expr] {
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
                ..
            } => self.expr_text(self.skip_parens(*operand)).to_string(),
            Expr::Literal {
                kind: LiteralKind::Bool,
                value,
                ..
            } => if value == "true" { "false" } else { "true" }.to_string(),
            Expr::Binary { op, lhs, rhs, .. } if op.is_comparison() => {
                let negated = match op {
                    BinaryOp::Eq => BinaryOp::Ne,
                    BinaryOp::Ne => BinaryOp::Eq,
                    BinaryOp::Lt => BinaryOp::Ge,
                    BinaryOp::Ge => BinaryOp::Lt,
                    BinaryOp::Gt => BinaryOp::Le,
                    _ => BinaryOp::Gt,
                };
                format!(
                    "{} {} {}",
                    self.expr_text(*lhs),
                    negated.as_str(),
                    self.expr_text(*rhs)
                )
            }
            _ => format!("!{}", self.text_at_precedence(expr, 13)),
        }
    }

    /// Whether `expr` is a boolean negation (`!x` or `a != b`).
    pub fn is_negation(&self, expr: ExprId) -> bool {
        matches!(
            &self.exprs[self.skip_parens(expr)],
            Expr::Unary {
                op: UnaryOp::Not,
                ..
            } | Expr::Binary {
                op: BinaryOp::Ne,
                ..
            }
        )
    }

    /// Text of `range` with the given sub-ranges replaced. Replacements
    /// outside `range` or overlapping an earlier one are ignored.
    pub fn text_with_replacements(&self, range: Span, replacements: &[(Span, String)]) -> String {
        let mut sorted: Vec<&(Span, String)> = replacements
            .iter()
            .filter(|(span, _)| range.contains(*span))
            .collect();
        sorted.sort_by_key(|(span, _)| (span.start, span.end));

        let mut out = String::with_capacity(range.len());
        let mut cursor = range.start;
        for (span, text) in sorted {
            if span.start < cursor {
                continue;
            }
            out.push_str(self.text(Span::new(cursor, span.start)));
            out.push_str(text);
            cursor = span.end;
        }
        out.push_str(self.text(Span::new(cursor, range.end)));
        out
    }

    /// The value of a `true`/`false` literal.
    pub fn boolean_literal(&self, expr: ExprId) -> Option<bool> {
        match &self.exprs[self.skip_parens(expr)] {
            Expr::Literal {
                kind: LiteralKind::Bool,
                value,
                ..
            } => Some(value == "true"),
            _ => None,
        }
    }
}

fn fold_binary(op: BinaryOp, lhs: LiteralValue, rhs: LiteralValue) -> Option<LiteralValue> {
    use LiteralValue as V;

    if op == BinaryOp::Add {
        if let V::String(l) = &lhs {
            return Some(V::String(format!("{l}{}", constant_text(&rhs)?)));
        }
        if let V::String(r) = &rhs {
            return Some(V::String(format!("{}{r}", constant_text(&lhs)?)));
        }
    }

    let as_long = |v: &V| match v {
        V::Int(x) => Some(i64::from(*x)),
        V::Long(x) => Some(*x),
        V::Char(c) => Some(i64::from(u32::from(*c))),
        _ => None,
    };
    let is_long = matches!(lhs, V::Long(_)) || matches!(rhs, V::Long(_));
    match (&lhs, &rhs) {
        (V::Bool(a), V::Bool(b)) => match op {
            BinaryOp::And | BinaryOp::BitAnd => Some(V::Bool(*a && *b)),
            BinaryOp::Or | BinaryOp::BitOr => Some(V::Bool(*a || *b)),
            BinaryOp::BitXor | BinaryOp::Ne => Some(V::Bool(a != b)),
            BinaryOp::Eq => Some(V::Bool(a == b)),
            _ => None,
        },
        _ => {
            let (a, b) = (as_long(&lhs)?, as_long(&rhs)?);
            let value = match op {
                BinaryOp::Add => a.checked_add(b)?,
                BinaryOp::Sub => a.checked_sub(b)?,
                BinaryOp::Mul => a.checked_mul(b)?,
                BinaryOp::Div => a.checked_div(b)?,
                BinaryOp::Rem => a.checked_rem(b)?,
                BinaryOp::Eq => return Some(V::Bool(a == b)),
                BinaryOp::Ne => return Some(V::Bool(a != b)),
                BinaryOp::Lt => return Some(V::Bool(a < b)),
                BinaryOp::Le => return Some(V::Bool(a <= b)),
                BinaryOp::Gt => return Some(V::Bool(a > b)),
                BinaryOp::Ge => return Some(V::Bool(a >= b)),
                _ => return None,
            };
            if is_long {
                Some(V::Long(value))
            } else {
                i32::try_from(value).ok().map(V::Int)
            }
        }
    }
}

fn constant_text(value: &LiteralValue) -> Option<String> {
    Some(match value {
        LiteralValue::Int(v) => v.to_string(),
        LiteralValue::Long(v) => v.to_string(),
        LiteralValue::Char(c) => c.to_string(),
        LiteralValue::String(s) => s.clone(),
        LiteralValue::Bool(b) => b.to_string(),
        LiteralValue::Null => "null".to_string(),
        LiteralValue::Float(_) | LiteralValue::Double(_) => return None,
    })
}
