//! `count()` and `sum()`: numeric accumulation into a local.

use nova_flow::{initializer_usage_status, InitializerUsageStatus};
use nova_hir::{BinaryOp, Body, ExprId, LocalId, LocalKind};
use nova_types::{JavaType, PrimitiveType};

use crate::edit::TextEdit;
use crate::patterns::{extract_operand, incremented_local};
use crate::pipeline::map_step;
use crate::rewrite::Rewriter;
use crate::terminal_block::TerminalBlock;
use crate::{MigrateError, MigrationContext};

use super::reduce::accumulator;

fn incremented_variable(
    body: &Body,
    tb: &TerminalBlock,
    expr: ExprId,
    non_final: &[LocalId],
) -> Option<LocalId> {
    if non_final.len() != 1 {
        return None;
    }
    let local = incremented_local(body, expr)?;
    (body.local(local).kind == LocalKind::Local
        && non_final.contains(&local)
        && !tb.is_referenced_in_operations(body, local))
    .then_some(local)
}

/// `count++` (possibly guarded by a limit on the same counter).
pub(super) fn is_count_operation(cx: MigrationContext<'_>, tb: &TerminalBlock, non_final: &[LocalId]) -> bool {
    let body = cx.body;
    let mut variable = tb
        .single_expression(body)
        .and_then(|e| incremented_variable(body, tb, e, non_final));
    let Some(counter) = tb.count_expression() else {
        return variable.is_some();
    };
    if tb.is_empty() {
        // if (++count == limit) break;
        variable = incremented_variable(body, tb, counter, non_final);
    } else if !variable.is_some_and(|v| body.is_reference_to(counter, v)) {
        return false;
    }
    variable.is_some_and(|v| {
        body.local(v).initializer.is_some_and(|init| is_zero(body, init))
            && initializer_usage_status(body, v, tb.main_loop()) != InitializerUsageStatus::Unknown
    })
}

pub(super) fn migrate_count(cx: MigrationContext<'_>, tb: &TerminalBlock) -> Result<Vec<TextEdit>, MigrateError> {
    let body = cx.body;
    let increment = match (tb.single_expression(body), tb.count_expression()) {
        (Some(expr), _) => expr,
        (None, Some(counter)) if tb.is_empty() => counter,
        _ => {
            return Err(MigrateError::InvariantViolation(
                "count loop has no increment".to_string(),
            ))
        }
    };
    let var = incremented_local(body, increment).ok_or_else(|| {
        MigrateError::InvariantViolation(format!(
            "`{}` is not an increment",
            body.expr_text(increment)
        ))
    })?;
    let stream = tb.generate(body).call("count", Vec::new()).to_string();
    let mut rewriter = Rewriter::new(body);
    replace_with_numeric_addition(&mut rewriter, body, tb.main_loop(), var, &stream, true)?;
    rewriter.finish()
}

/// `sum += expr` (or `sum = sum + expr`) over an `int`, `long` or `double`.
pub(super) fn sum_accumulator(
    cx: MigrationContext<'_>,
    tb: &TerminalBlock,
    non_final: &[LocalId],
) -> Option<(LocalId, ExprId)> {
    let body = cx.body;
    let (var, operand) = accumulator(cx, tb, non_final, BinaryOp::Add, |ty| {
        matches!(
            ty.as_primitive(),
            Some(PrimitiveType::Int | PrimitiveType::Long | PrimitiveType::Double)
        )
    })?;
    let var_type = body.local_type(var).as_primitive()?;
    let addend = body.type_of(operand).unboxed()?;
    (addend.promote(var_type) == Some(var_type)).then_some((var, operand))
}

pub(super) fn migrate_sum(cx: MigrationContext<'_>, tb: &TerminalBlock) -> Result<Vec<TextEdit>, MigrateError> {
    let body = cx.body;
    let expr = tb
        .single_expression(body)
        .ok_or_else(|| MigrateError::InvariantViolation("sum loop has no assignment".to_string()))?;
    let (var, operand) = crate::patterns::assignment(body, expr)
        .and_then(|(_, lhs, _)| Some((body.as_local(lhs)?, extract_operand(body, expr, BinaryOp::Add)?)))
        .ok_or_else(|| {
            MigrateError::InvariantViolation(format!("`{}` is not a sum", body.expr_text(expr)))
        })?;
    let mut stream = tb.generate(body);
    stream.extend(map_step(
        &body.local(tb.var()).name,
        &body.local_type(tb.var()),
        &body.local_type(var),
        body.expr_text(operand),
        body.is_reference_to(operand, tb.var()),
    ));
    stream.push("sum", Vec::new());
    let mut rewriter = Rewriter::new(body);
    replace_with_numeric_addition(&mut rewriter, body, tb.main_loop(), var, &stream.to_string(), false)?;
    rewriter.finish()
}

/// Adds `value` to `var`: folded into its zero initializer when possible,
/// `var += value;` otherwise. A `long` count assigned to a narrower
/// integral local gets a cast.
fn replace_with_numeric_addition(
    rewriter: &mut Rewriter<'_>,
    body: &Body,
    loop_stmt: nova_hir::StmtId,
    var: LocalId,
    value: &str,
    long_result: bool,
) -> Result<(), MigrateError> {
    let data = body.local(var);
    let status = initializer_usage_status(body, var, loop_stmt);
    if status != InitializerUsageStatus::Unknown && data.initializer.is_some_and(|init| is_zero(body, init)) {
        let ty = body.local_type(var);
        let value = match ty.as_primitive() {
            Some(p) if long_result && p.is_integral() && ty != JavaType::LONG => {
                format!("({}) {value}", p.keyword())
            }
            _ => value.to_string(),
        };
        return rewriter.replace_initializer(loop_stmt, var, &value, status);
    }
    rewriter.replace_stmt(loop_stmt, format!("{} += {value};", data.name));
    Ok(())
}

pub(crate) fn is_zero(body: &Body, expr: ExprId) -> bool {
    use nova_syntax::LiteralValue;
    match body.constant_value(expr) {
        Some(LiteralValue::Int(0) | LiteralValue::Long(0)) => true,
        Some(LiteralValue::Float(v)) => v == 0.0,
        Some(LiteralValue::Double(v)) => v == 0.0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::test_support::rewrite;
    use crate::MigrationKind;

    #[test]
    fn filtered_increment_becomes_count() {
        let (migration, out) =
            rewrite("int c = 0; for (String s : list) { if (s.isEmpty()) c++; } return c;").expect("migrates");
        assert_eq!(migration.kind, MigrationKind::Count);
        assert_eq!(
            out,
            "int c = (int) list.stream().filter(s -> s.isEmpty()).count(); return c;"
        );
    }

    #[test]
    fn count_keeps_previous_value() {
        let (migration, out) =
            rewrite("long c = 5; for (String s : list) { if (s.isEmpty()) ++c; } return c;").expect("migrates");
        assert_eq!(migration.kind, MigrationKind::Count);
        assert_eq!(
            out,
            "long c = 5; c += list.stream().filter(s -> s.isEmpty()).count(); return c;"
        );
    }

    #[test]
    fn sum_of_lengths() {
        let (migration, out) =
            rewrite("int total = 0; for (String s : list) { total += s.length(); } return total;").expect("migrates");
        assert_eq!(migration.kind, MigrationKind::Sum);
        assert_eq!(
            out,
            "int total = list.stream().mapToInt(s -> s.length()).sum(); return total;"
        );
    }

    #[test]
    fn sum_rejects_narrowing_addend() {
        let kind = rewrite("int total = 0; for (String s : list) { total += s.length() * 2L; } return total;")
            .map(|(migration, _)| migration.kind);
        assert_ne!(kind, Some(MigrationKind::Sum));
    }
}
