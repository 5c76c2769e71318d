//! Small syntactic matchers shared by the operation extractors and the
//! terminal catalogue.

use nova_hir::{AssignOp, BinaryOp, Body, Expr, ExprId, LocalId, Node, Stmt, StmtId, UnaryOp};
use nova_types::Span;

/// `(receiver, name, args)` of a method call.
pub(crate) fn call_parts(body: &Body, expr: ExprId) -> Option<(Option<ExprId>, &str, &[ExprId])> {
    match body.expr(body.skip_parens(expr)) {
        Expr::Call {
            receiver,
            name,
            args,
            ..
        } => Some((*receiver, name.as_str(), args.as_slice())),
        _ => None,
    }
}

/// A call to `name` with `arity` arguments.
pub(crate) fn is_call(body: &Body, expr: ExprId, name: &str, arity: usize) -> bool {
    call_parts(body, expr).is_some_and(|(_, n, args)| n == name && args.len() == arity)
}

/// A static call `Class.name(..)` on an unresolved class name.
pub(crate) fn is_static_call(body: &Body, expr: ExprId, class: &str, names: &[&str]) -> bool {
    let Some((Some(receiver), name, _)) = call_parts(body, expr) else {
        return false;
    };
    names.contains(&name) && is_class_name(body, receiver, class)
}

pub(crate) fn is_class_name(body: &Body, expr: ExprId, class: &str) -> bool {
    match body.expr(body.skip_parens(expr)) {
        Expr::Name { name, .. } | Expr::Type { text: name, .. } => name == class,
        Expr::FieldAccess { name, .. } => name == class && body.expr_text(expr).starts_with("java."),
        _ => false,
    }
}

/// The expression of an expression statement.
pub(crate) fn statement_expr(body: &Body, stmt: StmtId) -> Option<ExprId> {
    match body.stmt(stmt) {
        Stmt::Expr { expr, .. } => Some(body.skip_parens(*expr)),
        _ => None,
    }
}

/// `(op, lhs, rhs)` of an assignment expression.
pub(crate) fn assignment(body: &Body, expr: ExprId) -> Option<(AssignOp, ExprId, ExprId)> {
    match body.expr(body.skip_parens(expr)) {
        Expr::Assign { op, lhs, rhs, .. } => Some((*op, *lhs, *rhs)),
        _ => None,
    }
}

/// The local incremented by `x++`, `++x`, `x += 1` or `x = x + 1`.
pub(crate) fn incremented_local(body: &Body, expr: ExprId) -> Option<LocalId> {
    match body.expr(body.skip_parens(expr)) {
        Expr::Unary {
            op: UnaryOp::PreInc | UnaryOp::PostInc,
            operand,
            ..
        } => body.as_local(*operand),
        Expr::Assign { .. } => {
            let operand = extract_operand(body, expr, BinaryOp::Add)?;
            if body.constant_int(operand) != Some(1) {
                return None;
            }
            let (_, lhs, _) = assignment(body, expr)?;
            body.as_local(lhs)
        }
        _ => None,
    }
}

/// The operand of `x op= operand` or `x = x op operand` (`operand op x`).
pub(crate) fn extract_operand(body: &Body, expr: ExprId, op: BinaryOp) -> Option<ExprId> {
    let (assign_op, lhs, rhs) = assignment(body, expr)?;
    if assign_op.binary_op() == Some(op) {
        return Some(rhs);
    }
    if assign_op != AssignOp::Assign {
        return None;
    }
    let Expr::Binary {
        op: bin_op,
        lhs: left,
        rhs: right,
        ..
    } = body.expr(body.skip_parens(rhs))
    else {
        return None;
    };
    if *bin_op != op {
        return None;
    }
    if same_reference(body, *left, lhs) {
        Some(*right)
    } else if same_reference(body, *right, lhs) {
        Some(*left)
    } else {
        None
    }
}

/// The local accumulated by `x op= e` or `x = x op e`.
pub(crate) fn extract_accumulator(body: &Body, expr: ExprId, op: BinaryOp) -> Option<LocalId> {
    let (_, lhs, _) = assignment(body, expr)?;
    let local = body.as_local(lhs)?;
    extract_operand(body, expr, op).map(|_| local)
}

fn same_reference(body: &Body, a: ExprId, b: ExprId) -> bool {
    match (body.as_local(a), body.as_local(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// The mutated side of a `==`/`!=` against `null`.
pub(crate) fn compared_with_null(body: &Body, expr: ExprId, op: BinaryOp) -> Option<ExprId> {
    match body.expr(body.skip_parens(expr)) {
        Expr::Binary {
            op: actual,
            lhs,
            rhs,
            ..
        } if *actual == op => crate::source::value_compared_with_null(body, *lhs, *rhs),
        _ => None,
    }
}

/// Source text of a filter condition, dropping pattern bindings the
/// condition itself does not use.
pub(crate) fn condition_text(body: &Body, condition: ExprId, negated: bool) -> String {
    let condition = body.skip_parens(condition);
    if negated {
        return match body.expr(condition) {
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
                ..
            } => condition_text(body, *operand, false),
            Expr::Binary { op, .. } if op.is_comparison() => body.negated_text(condition),
            Expr::Literal { .. } => body.negated_text(condition),
            _ => {
                let text = condition_text(body, condition, false);
                if body.precedence(condition) >= 13 {
                    format!("!{text}")
                } else {
                    format!("!({text})")
                }
            }
        };
    }
    let range = body.expr(condition).range();
    let mut replacements: Vec<(Span, String)> = Vec::new();
    body.walk(Node::Expr(condition), &mut |node| {
        if let Node::Expr(id) = node {
            if let Expr::InstanceOf {
                ty_range,
                binding: Some(binding),
                range,
                ..
            } = body.expr(id)
            {
                if !body.is_referenced(*binding, Node::Expr(condition)) {
                    replacements.push((Span::new(ty_range.end, range.end), String::new()));
                }
            }
        }
        true
    });
    body.text_with_replacements(range, &replacements)
}

/// Pattern bindings introduced by `instanceof` tests inside `condition`.
pub(crate) fn pattern_bindings(body: &Body, condition: ExprId) -> Vec<(ExprId, LocalId)> {
    let mut out = Vec::new();
    body.walk(Node::Expr(condition), &mut |node| {
        if let Node::Expr(id) = node {
            if let Expr::InstanceOf {
                binding: Some(binding),
                ..
            } = body.expr(id)
            {
                out.push((id, *binding));
            }
        }
        !matches!(node, Node::Expr(id) if matches!(body.expr(id), Expr::Lambda { .. }))
    });
    out
}

/// An expression that can be evaluated twice without observable difference.
pub(crate) fn is_safely_recomputable(body: &Body, expr: ExprId) -> bool {
    match body.expr(body.skip_parens(expr)) {
        Expr::Literal { .. } | Expr::Local { .. } | Expr::Name { .. } | Expr::This { .. } => true,
        Expr::FieldAccess { receiver, .. } => is_safely_recomputable(body, *receiver),
        Expr::Unary {
            op: UnaryOp::Minus | UnaryOp::Plus,
            operand,
            ..
        } => matches!(body.expr(body.skip_parens(*operand)), Expr::Literal { .. }),
        _ => false,
    }
}

/// A value that is safe to compute whether or not it is needed, and that
/// nothing can change: literals, `final` or effectively final locals,
/// static constants and operators over them.
pub(crate) fn is_stable_value(body: &Body, expr: ExprId) -> bool {
    match body.expr(body.skip_parens(expr)) {
        Expr::Literal { .. } => true,
        Expr::Local { local, .. } => body.is_effectively_final(*local),
        Expr::FieldAccess { receiver, name, .. } => {
            matches!(body.expr(body.skip_parens(*receiver)), Expr::Type { .. })
                && name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        }
        Expr::Unary {
            op: UnaryOp::Minus | UnaryOp::Plus | UnaryOp::Not | UnaryOp::BitNot,
            operand,
            ..
        } => is_stable_value(body, *operand),
        Expr::Binary { op, lhs, rhs, .. } => {
            !matches!(op, BinaryOp::Div | BinaryOp::Rem)
                && is_stable_value(body, *lhs)
                && is_stable_value(body, *rhs)
        }
        Expr::Conditional {
            condition,
            then_expr,
            else_expr,
            ..
        } => [*condition, *then_expr, *else_expr]
            .into_iter()
            .all(|e| is_stable_value(body, e)),
        _ => false,
    }
}

/// Whether `stmt` is a call that a method reference could express with
/// `var` as its only input (`foo(x)`, `q.foo(x)` or `x.foo()`).
pub(crate) fn is_method_ref_candidate(body: &Body, stmt: StmtId, var: LocalId) -> bool {
    let Some(expr) = statement_expr(body, stmt) else {
        return false;
    };
    let Some((receiver, _, args)) = call_parts(body, expr) else {
        return false;
    };
    match (receiver, args) {
        (Some(receiver), []) => body.is_reference_to(receiver, var),
        (receiver, [arg]) => {
            body.is_reference_to(*arg, var)
                && receiver.map_or(true, |r| {
                    !body.is_referenced(var, Node::Expr(r))
                        && matches!(
                            body.expr(body.skip_parens(r)),
                            Expr::Local { .. }
                                | Expr::Name { .. }
                                | Expr::This { .. }
                                | Expr::Super { .. }
                                | Expr::FieldAccess { .. }
                        )
                })
        }
        _ => false,
    }
}

/// `base`, or `base1`, `base2`, … when a local of the body already uses it.
pub(crate) fn unique_name(body: &Body, base: &str) -> String {
    let taken = |name: &str| body.local_ids().any(|id| body.local(id).name == name);
    if !taken(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{base}{n}"))
        .find(|name| !taken(name))
        .unwrap_or_else(|| base.to_string())
}

/// A break or continue that is the only statement of `stmt`'s block form.
pub(crate) fn single_jump(body: &Body, stmt: StmtId) -> Option<StmtId> {
    match body.statements_of(stmt).as_slice() {
        [only] if matches!(body.stmt(*only), Stmt::Break { .. } | Stmt::Continue { .. }) => {
            Some(*only)
        }
        _ => None,
    }
}

/// Statements of `stmt` with nested blocks that declare nothing spliced in.
pub(crate) fn flatten(body: &Body, stmt: StmtId) -> Vec<StmtId> {
    let mut out = Vec::new();
    flatten_into(body, &body.statements_of(stmt), &mut out);
    out
}

pub(crate) fn flatten_into(body: &Body, statements: &[StmtId], out: &mut Vec<StmtId>) {
    for stmt in statements {
        match body.stmt(*stmt) {
            Stmt::Empty { .. } => {}
            Stmt::Block { statements, .. }
                if !statements
                    .iter()
                    .any(|s| matches!(body.stmt(*s), Stmt::LocalVar { .. } | Stmt::LocalClass { .. })) =>
            {
                flatten_into(body, statements, out);
            }
            _ => out.push(*stmt),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::test_support::{expr, local, method, stmt};

    use super::*;

    #[test]
    fn increments_in_every_spelling() {
        let body = method("int c = 0; c++; ++c; c += 1; c = c + 1; c = 1 + c; c += 2; c--;");
        let c = local(&body, "c");
        for text in ["c++", "++c", "c += 1", "c = c + 1", "c = 1 + c"] {
            assert_eq!(incremented_local(&body, expr(&body, text)), Some(c), "{text}");
        }
        assert_eq!(incremented_local(&body, expr(&body, "c += 2")), None);
        assert_eq!(incremented_local(&body, expr(&body, "c--")), None);
    }

    #[test]
    fn accumulators_accept_compound_and_expanded_forms() {
        let body = method("int s = 0; int x = 1; s += x; s = s * x; s = x | s; s = x - s;");
        let s = local(&body, "s");
        assert_eq!(extract_accumulator(&body, expr(&body, "s += x"), BinaryOp::Add), Some(s));
        assert_eq!(extract_accumulator(&body, expr(&body, "s = s * x"), BinaryOp::Mul), Some(s));
        assert_eq!(
            body.expr_text(extract_operand(&body, expr(&body, "s = x | s"), BinaryOp::BitOr).unwrap()),
            "x"
        );
        assert_eq!(extract_accumulator(&body, expr(&body, "s = x - s"), BinaryOp::Add), None);
    }

    #[test]
    fn condition_text_negates_and_strips_unused_bindings() {
        let body = method(
            "for (Object o : list) { if (o instanceof String s) use(s); if (!(o == null)) use(o); if (o instanceof String t && t.isEmpty()) use(t); }",
        );
        assert_eq!(
            condition_text(&body, expr(&body, "o instanceof String s"), false),
            "o instanceof String"
        );
        assert_eq!(
            condition_text(&body, expr(&body, "!(o == null)"), true),
            "o == null"
        );
        assert_eq!(
            condition_text(&body, expr(&body, "o instanceof String t && t.isEmpty()"), true),
            "!(o instanceof String t && t.isEmpty())"
        );
        let _ = stmt(&body, "for (Object");
    }

    #[test]
    fn unique_names_skip_existing_locals() {
        let body = method("int a = 0; int a1 = 0; use(a, a1);");
        assert_eq!(unique_name(&body, "a"), "a2");
        assert_eq!(unique_name(&body, "b"), "b");
    }
}
