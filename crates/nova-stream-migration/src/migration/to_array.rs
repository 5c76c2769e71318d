//! `toArray()`: a counting loop filling a freshly allocated array.

use nova_flow::{initializer_usage_status, InitializerUsageStatus};
use nova_hir::{AssignOp, Body, Expr, ExprId, LocalId, LocalKind, Node};

use crate::edit::TextEdit;
use crate::operation::Operation;
use crate::patterns::{assignment, call_parts};
use crate::pipeline::map_step;
use crate::rewrite::Rewriter;
use crate::source::{SourceKind, StreamSource};
use crate::terminal_block::TerminalBlock;
use crate::{MigrateError, MigrationContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct ArrayFill {
    array: LocalId,
    /// The stored value.
    value: ExprId,
    status: InitializerUsageStatus,
}

/// `arr[i] = value;` over `for (int i = 0; i < n; i++)` where `arr` was
/// allocated as `new T[n]` and `value` does not read `arr`.
pub(super) fn extract_array(cx: MigrationContext<'_>, tb: &TerminalBlock) -> Option<ArrayFill> {
    let body = cx.body;
    let [Operation::Source(StreamSource {
        kind:
            SourceKind::CountingLoop {
                start,
                bound,
                inclusive: false,
            },
        var,
        ..
    })] = tb.operations()
    else {
        return None;
    };
    let start = start.expr()?;
    let bound = body.skip_parens(bound.expr()?);
    if body.constant_int(start) != Some(0) {
        return None;
    }
    let (AssignOp::Assign, lhs, value) = assignment(body, tb.single_expression(body)?)? else {
        return None;
    };
    let Expr::ArrayAccess { array, index, .. } = body.expr(body.skip_parens(lhs)) else {
        return None;
    };
    if !body.is_reference_to(*index, *var) {
        return None;
    }
    let array = body.as_local(*array)?;
    let data = body.local(array);
    if data.kind != LocalKind::Local {
        return None;
    }
    let status = initializer_usage_status(body, array, tb.main_loop());
    if status == InitializerUsageStatus::Unknown {
        return None;
    }
    let Expr::NewArray {
        dims,
        rank: 1,
        initializer: None,
        ..
    } = body.expr(body.skip_parens(data.initializer?))
    else {
        return None;
    };
    let [dimension] = dims.as_slice() else {
        return None;
    };
    if !body.local_type(array).array_component()?.is_stream_eligible()
        || !is_array_length(body, array, body.skip_parens(*dimension), bound)
        || body.is_referenced(array, Node::Expr(value))
    {
        return None;
    }
    Some(ArrayFill {
        array,
        value,
        status,
    })
}

/// Whether a loop up to `bound` visits every index of an array allocated
/// with `dimension`.
fn is_array_length(body: &Body, array: LocalId, dimension: ExprId, bound: ExprId) -> bool {
    if let Expr::FieldAccess { receiver, name, .. } = body.expr(bound) {
        if name == "length" && body.is_reference_to(*receiver, array) {
            return true;
        }
    }
    body.equivalent(dimension, bound) || is_size_of_qualifier(body, dimension, bound) || is_size_of_qualifier(body, bound, dimension)
}

/// `q.size()` next to another call on the same `q`.
fn is_size_of_qualifier(body: &Body, size: ExprId, other: ExprId) -> bool {
    let (Some((Some(a), "size", [])), Some((Some(b), _, _))) = (call_parts(body, size), call_parts(body, other)) else {
        return false;
    };
    body.equivalent(a, b)
}

pub(super) fn migrate(cx: MigrationContext<'_>, tb: &TerminalBlock) -> Result<Vec<TextEdit>, MigrateError> {
    let body = cx.body;
    let fill = extract_array(cx, tb)
        .ok_or_else(|| MigrateError::InvariantViolation("loop no longer fills an array".to_string()))?;
    let array_type = body.local_type(fill.array);
    let component = array_type.array_component().cloned().ok_or_else(|| {
        MigrateError::InvariantViolation(format!("`{}` is not an array", body.local(fill.array).name))
    })?;
    let var = tb.var();
    let mut stream = tb.generate(body);
    stream.extend(map_step(
        &body.local(var).name,
        &body.local_type(var),
        &component,
        body.expr_text(fill.value),
        body.is_reference_to(fill.value, var),
    ));
    let args = if component.is_primitive() {
        Vec::new()
    } else {
        vec![format!("{}::new", array_type.display())]
    };
    stream.push("toArray", args);

    let mut rewriter = Rewriter::new(body);
    rewriter.replace_initializer(tb.main_loop(), fill.array, &stream.to_string(), fill.status)?;
    rewriter.finish()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::test_support::rewrite;
    use crate::MigrationKind;

    #[test]
    fn indexed_fill_becomes_to_array() {
        let (migration, out) = rewrite(
            "int[] a = new int[list.size()]; for (int i = 0; i < list.size(); i++) { a[i] = list.get(i).length(); } return a;",
        )
        .expect("migrates");
        assert_eq!(migration.kind, MigrationKind::ToArray);
        assert_eq!(
            out,
            "int[] a = IntStream.range(0, list.size()).map(i -> list.get(i).length()).toArray(); return a;"
        );
    }

    #[test]
    fn object_array_gets_a_generator() {
        let (_, out) = rewrite(
            "String[] a = new String[10]; for (int i = 0; i < 10; i++) { a[i] = \"#\" + i; } return a;",
        )
        .expect("migrates");
        assert_eq!(
            out,
            "String[] a = IntStream.range(0, 10).mapToObj(i -> \"#\" + i).toArray(String[]::new); return a;"
        );
    }

    #[test]
    fn bound_must_cover_the_array() {
        let kind = rewrite("int[] a = new int[10]; for (int i = 0; i < 5; i++) { a[i] = i * 2; } return a;")
            .map(|(migration, _)| migration.kind);
        assert_ne!(kind, Some(MigrationKind::ToArray));
    }

    #[test]
    fn value_reading_the_array_is_rejected() {
        let kind = rewrite(
            "int[] a = new int[10]; for (int i = 0; i < a.length; i++) { a[i] = i == 0 ? 1 : a[i - 1] * 2; } return a;",
        )
        .map(|(migration, _)| migration.kind);
        assert_ne!(kind, Some(MigrationKind::ToArray));
    }
}
