//! `reduce(identity, op)` and `max()`/`min()` terminals.

use nova_flow::{initializer_usage_status, InitializerUsageStatus};
use nova_hir::{AssignOp, BinaryOp, Body, Expr, ExprId, LocalId, LocalKind, Node};
use nova_syntax::LiteralValue;
use nova_types::{JavaType, PrimitiveType};
use serde::Serialize;

use crate::edit::TextEdit;
use crate::operation::Operation;
use crate::patterns::{assignment, extract_accumulator, extract_operand, is_static_call, unique_name};
use crate::pipeline::{lambda, map_step};
use crate::rewrite::Rewriter;
use crate::terminal_block::TerminalBlock;
use crate::{MigrateError, MigrationContext};

/// A compound assignment folded with `Stream.reduce`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionOp {
    /// `x *= e` on `int`, `long` or `double`.
    Product,
    /// `b &= e` on `boolean`.
    And,
    /// `b |= e` on `boolean`.
    Or,
    BitOr,
    BitAnd,
    Xor,
}

impl ReductionOp {
    pub const ALL: [ReductionOp; 6] = [
        ReductionOp::Product,
        ReductionOp::And,
        ReductionOp::Or,
        ReductionOp::BitOr,
        ReductionOp::BitAnd,
        ReductionOp::Xor,
    ];

    pub fn binary_op(self) -> BinaryOp {
        match self {
            ReductionOp::Product => BinaryOp::Mul,
            ReductionOp::And | ReductionOp::BitAnd => BinaryOp::BitAnd,
            ReductionOp::Or | ReductionOp::BitOr => BinaryOp::BitOr,
            ReductionOp::Xor => BinaryOp::BitXor,
        }
    }

    /// Source text of the identity element.
    pub fn identity(self) -> &'static str {
        match self {
            ReductionOp::Product => "1",
            ReductionOp::And => "true",
            ReductionOp::Or => "false",
            ReductionOp::BitOr | ReductionOp::Xor => "0",
            ReductionOp::BitAnd => "-1",
        }
    }

    fn accepts(self, ty: &JavaType) -> bool {
        let primitive = ty.as_primitive();
        match self {
            ReductionOp::Product => matches!(
                primitive,
                Some(PrimitiveType::Int | PrimitiveType::Long | PrimitiveType::Double)
            ),
            ReductionOp::And | ReductionOp::Or => primitive == Some(PrimitiveType::Boolean),
            ReductionOp::BitOr | ReductionOp::BitAnd | ReductionOp::Xor => {
                matches!(primitive, Some(PrimitiveType::Int | PrimitiveType::Long))
            }
        }
    }

    fn is_identity(self, value: &LiteralValue) -> bool {
        match (self, value) {
            (ReductionOp::Product, LiteralValue::Int(1) | LiteralValue::Long(1)) => true,
            (ReductionOp::Product, LiteralValue::Double(v)) => *v == 1.0,
            (ReductionOp::And, LiteralValue::Bool(b)) => *b,
            (ReductionOp::Or, LiteralValue::Bool(b)) => !*b,
            (ReductionOp::BitOr | ReductionOp::Xor, LiteralValue::Int(0) | LiteralValue::Long(0)) => true,
            (ReductionOp::BitAnd, LiteralValue::Int(-1) | LiteralValue::Long(-1)) => true,
            _ => false,
        }
    }
}

/// The single non-final local accumulated with `op` by the block's only
/// statement, and the accumulated operand.
pub(super) fn accumulator(
    cx: MigrationContext<'_>,
    tb: &TerminalBlock,
    non_final: &[LocalId],
    op: BinaryOp,
    accepts: impl Fn(&JavaType) -> bool,
) -> Option<(LocalId, ExprId)> {
    let body = cx.body;
    let [var] = non_final else {
        return None;
    };
    let expr = tb.single_expression(body)?;
    if extract_accumulator(body, expr, op)? != *var {
        return None;
    }
    if body.local(*var).kind != LocalKind::Local || !accepts(&body.local_type(*var)) {
        return None;
    }
    let operand = extract_operand(body, expr, op)?;
    if body.is_referenced(*var, Node::Expr(operand)) || tb.is_referenced_in_operations(body, *var) {
        return None;
    }
    Some((*var, operand))
}

pub(super) fn accumulated_variable(
    cx: MigrationContext<'_>,
    tb: &TerminalBlock,
    non_final: &[LocalId],
    op: ReductionOp,
) -> Option<(LocalId, ExprId)> {
    accumulator(cx, tb, non_final, op.binary_op(), |ty| op.accepts(ty))
}

pub(super) fn migrate_reduction(
    cx: MigrationContext<'_>,
    tb: &TerminalBlock,
    op: ReductionOp,
) -> Result<Vec<TextEdit>, MigrateError> {
    let body = cx.body;
    let parts = tb.single_expression(body).and_then(|expr| {
        Some((
            extract_accumulator(body, expr, op.binary_op())?,
            extract_operand(body, expr, op.binary_op())?,
        ))
    });
    let Some((var, operand)) = parts else {
        return Err(MigrateError::InvariantViolation(format!(
            "loop no longer accumulates with `{}`",
            op.binary_op().as_str()
        )));
    };

    let mut stream = tb.generate(body);
    stream.extend(map_step(
        &body.local(tb.var()).name,
        &body.local_type(tb.var()),
        &body.local_type(var),
        body.expr_text(operand),
        body.is_reference_to(operand, tb.var()),
    ));
    let a = unique_name(body, "a");
    let b = unique_name(body, "b");
    let symbol = op.binary_op().as_str();
    stream.push(
        "reduce",
        vec![op.identity().to_string(), format!("({a}, {b}) -> {a} {symbol} {b}")],
    );

    let data = body.local(var);
    let status = initializer_usage_status(body, var, tb.main_loop());
    let starts_at_identity = data
        .initializer
        .and_then(|init| body.constant_value(init))
        .is_some_and(|value| op.is_identity(&value));
    let mut rewriter = Rewriter::new(body);
    if status != InitializerUsageStatus::Unknown && starts_at_identity {
        rewriter.replace_initializer(tb.main_loop(), var, &stream.to_string(), status)?;
    } else {
        rewriter.replace_stmt(tb.main_loop(), format!("{} {symbol}= {stream};", data.name));
    }
    rewriter.finish()
}

/// `best = Math.max(best, e)`, `best = e > best ? e : best`, or
/// `if (e > best) best = e;` with the comparison peeled as a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct ExtremumTerminal {
    pub(super) max: bool,
    var: LocalId,
    value: ExprId,
    /// The comparison is the block's last filter and disappears.
    drops_filter: bool,
}

pub(super) fn extract_extremum(
    cx: MigrationContext<'_>,
    tb: &TerminalBlock,
    non_final: &[LocalId],
) -> Option<ExtremumTerminal> {
    let body = cx.body;
    let [var] = non_final else {
        return None;
    };
    let var = *var;
    let data = body.local(var);
    let var_type = body.local_type(var).as_primitive()?;
    if data.kind != LocalKind::Local
        || !matches!(
            var_type,
            PrimitiveType::Int | PrimitiveType::Long | PrimitiveType::Double
        )
    {
        return None;
    }
    body.constant_value(data.initializer?)?;
    if initializer_usage_status(body, var, tb.main_loop()) == InitializerUsageStatus::Unknown {
        return None;
    }

    let (AssignOp::Assign, lhs, rhs) = assignment(body, tb.single_expression(body)?)? else {
        return None;
    };
    if !body.is_reference_to(lhs, var) {
        return None;
    }
    let terminal = math_call(body, var, rhs)
        .or_else(|| ternary(body, var, rhs))
        .or_else(|| filtered(body, tb, var, rhs))?;

    if body.is_referenced(var, Node::Expr(terminal.value)) {
        return None;
    }
    let value_type = body.type_of(terminal.value).unboxed()?;
    if value_type.promote(var_type) != Some(var_type) {
        return None;
    }
    let kept = if terminal.drops_filter {
        &tb.operations()[..tb.operations().len() - 1]
    } else {
        tb.operations()
    };
    let uses_var = kept
        .iter()
        .flat_map(Operation::expressions)
        .any(|e| body.is_referenced(var, Node::Expr(e)));
    (!uses_var).then_some(terminal)
}

fn math_call(body: &Body, var: LocalId, rhs: ExprId) -> Option<ExtremumTerminal> {
    if !is_static_call(body, rhs, "Math", &["max", "min"]) {
        return None;
    }
    let (_, name, [a, b]) = crate::patterns::call_parts(body, rhs)? else {
        return None;
    };
    let value = if body.is_reference_to(*a, var) {
        *b
    } else if body.is_reference_to(*b, var) {
        *a
    } else {
        return None;
    };
    Some(ExtremumTerminal {
        max: name == "max",
        var,
        value,
        drops_filter: false,
    })
}

fn ternary(body: &Body, var: LocalId, rhs: ExprId) -> Option<ExtremumTerminal> {
    let Expr::Conditional {
        condition,
        then_expr,
        else_expr,
        ..
    } = body.expr(body.skip_parens(rhs))
    else {
        return None;
    };
    let (value, _) = split_var(body, var, *then_expr, *else_expr)?;
    let (left_greater, value_left) = comparison(body, var, *condition, value)?;
    // The value is chosen when the condition holds.
    let value_chosen_when_true = body.equivalent(*then_expr, value);
    let value_greater_when_true = left_greater == value_left;
    Some(ExtremumTerminal {
        max: value_chosen_when_true == value_greater_when_true,
        var,
        value,
        drops_filter: false,
    })
}

fn filtered(body: &Body, tb: &TerminalBlock, var: LocalId, rhs: ExprId) -> Option<ExtremumTerminal> {
    let Operation::Filter {
        condition, negated, ..
    } = tb.last_operation()
    else {
        return None;
    };
    let (left_greater, value_left) = comparison(body, var, *condition, rhs)?;
    Some(ExtremumTerminal {
        max: (left_greater == value_left) != *negated,
        var,
        value: rhs,
        drops_filter: true,
    })
}

/// Splits `(a, b)` into the non-`var` side and the `var` reference.
fn split_var(body: &Body, var: LocalId, a: ExprId, b: ExprId) -> Option<(ExprId, ExprId)> {
    if body.is_reference_to(b, var) && !body.is_reference_to(a, var) {
        Some((a, b))
    } else if body.is_reference_to(a, var) && !body.is_reference_to(b, var) {
        Some((b, a))
    } else {
        None
    }
}

/// For `l op r` comparing `value` with `var`: whether `op` holds when the
/// left side is greater, and whether `value` is on the left.
fn comparison(body: &Body, var: LocalId, condition: ExprId, value: ExprId) -> Option<(bool, bool)> {
    let Expr::Binary { op, lhs, rhs, .. } = body.expr(body.skip_parens(condition)) else {
        return None;
    };
    let left_greater = match op {
        BinaryOp::Gt | BinaryOp::Ge => true,
        BinaryOp::Lt | BinaryOp::Le => false,
        _ => return None,
    };
    if body.equivalent(*lhs, value) && body.is_reference_to(*rhs, var) {
        Some((left_greater, true))
    } else if body.equivalent(*rhs, value) && body.is_reference_to(*lhs, var) {
        Some((left_greater, false))
    } else {
        None
    }
}

pub(super) fn migrate_extremum(cx: MigrationContext<'_>, tb: &TerminalBlock) -> Result<Vec<TextEdit>, MigrateError> {
    let body = cx.body;
    let terminal = tb
        .single_expression(body)
        .and_then(|expr| assignment(body, expr))
        .and_then(|(_, lhs, _)| body.as_local(lhs))
        .and_then(|var| extract_extremum(cx, tb, &[var]))
        .ok_or_else(|| MigrateError::InvariantViolation("loop no longer finds an extremum".to_string()))?;
    let var = terminal.var;
    let data = body.local(var);
    let init = data.initializer.ok_or_else(|| {
        MigrateError::InvariantViolation(format!("`{}` has no initializer", data.name))
    })?;
    let init_text = body.expr_text(init);
    let element = &body.local(tb.var()).name;
    let var_type = body.local_type(var);

    let mut stream = if terminal.drops_filter {
        tb.without_last_operation().generate(body)
    } else {
        tb.generate(body)
    };
    stream.extend(map_step(
        element,
        &body.local_type(tb.var()),
        &var_type,
        body.expr_text(terminal.value),
        body.is_reference_to(terminal.value, tb.var()),
    ));
    if !is_neutral_bound(body, init, terminal.max) {
        let cmp = if terminal.max { ">" } else { "<" };
        stream.push(
            "filter",
            vec![lambda(element, &format!("{element} {cmp} {init_text}"))],
        );
    }
    stream.push(if terminal.max { "max" } else { "min" }, Vec::new());
    stream.push("orElse", vec![init_text.to_string()]);

    let status = initializer_usage_status(body, var, tb.main_loop());
    let mut rewriter = Rewriter::new(body);
    rewriter.replace_initializer(tb.main_loop(), var, &stream.to_string(), status)?;
    rewriter.finish()
}

/// `Integer.MIN_VALUE` for a maximum (or `MAX_VALUE` for a minimum) never
/// wins a comparison, so no filter is needed.
fn is_neutral_bound(body: &Body, init: ExprId, max: bool) -> bool {
    match body.constant_value(init) {
        Some(LiteralValue::Int(v)) => v == if max { i32::MIN } else { i32::MAX },
        Some(LiteralValue::Long(v)) => v == if max { i64::MIN } else { i64::MAX },
        Some(LiteralValue::Double(v)) => {
            v == if max { f64::NEG_INFINITY } else { f64::INFINITY }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::test_support::rewrite;
    use crate::{MigrationKind, ReductionOp};

    #[test]
    fn product_folds_into_identity_initializer() {
        let (migration, out) =
            rewrite("int p = 1; for (String s : list) { p *= s.length(); } return p;").expect("migrates");
        assert_eq!(migration.kind, MigrationKind::Reduction(ReductionOp::Product));
        assert_eq!(
            out,
            "int p = list.stream().mapToInt(s -> s.length()).reduce(1, (a, b) -> a * b); return p;"
        );
    }

    #[test]
    fn boolean_and_keeps_non_identity_start() {
        let (migration, out) =
            rewrite("boolean ok = flag; for (String s : list) { ok &= s.isEmpty(); } return ok;").expect("migrates");
        assert_eq!(migration.kind, MigrationKind::Reduction(ReductionOp::And));
        assert_eq!(
            out,
            "boolean ok = flag; ok &= list.stream().map(s -> s.isEmpty()).reduce(true, (a, b) -> a & b); return ok;"
        );
    }

    #[test]
    fn guarded_assignment_becomes_max() {
        let (migration, out) = rewrite(
            "int best = 0; for (String s : list) { if (s.length() > best) best = s.length(); } return best;",
        )
        .expect("migrates");
        assert_eq!(migration.kind, MigrationKind::FindExtremum { max: true });
        assert_eq!(
            out,
            "int best = list.stream().mapToInt(s -> s.length()).filter(s -> s > 0).max().orElse(0); return best;"
        );
    }

    #[test]
    fn math_min_from_max_value_needs_no_filter() {
        let (migration, out) = rewrite(
            "int best = Integer.MAX_VALUE; for (String s : list) { best = Math.min(best, s.length()); } return best;",
        )
        .expect("migrates");
        assert_eq!(migration.kind, MigrationKind::FindExtremum { max: false });
        assert_eq!(
            out,
            "int best = list.stream().mapToInt(s -> s.length()).min().orElse(Integer.MAX_VALUE); return best;"
        );
    }

    #[test]
    fn ternary_picks_direction_from_branches() {
        let (migration, _) = rewrite(
            "int best = 100; for (String s : list) { best = s.length() < best ? s.length() : best; } return best;",
        )
        .expect("migrates");
        assert_eq!(migration.kind, MigrationKind::FindExtremum { max: false });
    }

    #[test]
    fn extremum_needs_constant_start() {
        let migration = rewrite(
            "int best = list.size(); for (String s : list) { best = Math.max(best, s.length()); } return best;",
        );
        assert_eq!(migration, None);
    }
}
