//! Intermediate stream operations recognized in a loop body.

use nova_hir::{Body, ExprId, LocalId, Node};
use nova_types::JavaType;

use crate::patterns::condition_text;
use crate::pipeline::{lambda, map_step, PipelineCall, PipelineStep};
use crate::source::{Fragment, StreamSource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Source(StreamSource),
    /// `.filter(var -> condition)`, or its negation when `negated`.
    Filter {
        condition: ExprId,
        var: LocalId,
        negated: bool,
    },
    /// `.takeWhile(var -> !condition)`.
    TakeWhile { condition: ExprId, var: LocalId },
    /// A nested loop that searches for a match and breaks:
    /// `.filter(var -> source.anyMatch(inner -> condition))`.
    CompoundFilter {
        source: StreamSource,
        condition: ExprId,
        negated: bool,
        var: LocalId,
    },
    /// `.map(var -> expr)` producing elements of type `ty` named `out`.
    Map {
        expr: Fragment,
        var: LocalId,
        ty: JavaType,
        out: LocalId,
    },
    /// `.flatMap(var -> source)`.
    FlatMap { source: StreamSource, var: LocalId },
    /// `.limit(limit + delta)`.
    Limit {
        var: LocalId,
        /// The compared expression (`count++`, `list.size()`, ...).
        count: ExprId,
        limit: ExprId,
        /// The counter local that disappears with the loop, if any.
        counter: Option<LocalId>,
        delta: i64,
    },
    /// `.distinct()`, optionally replacing a helper set declared for the loop.
    Distinct { var: LocalId, helper: Option<LocalId> },
}

impl Operation {
    /// The stream element variable this operation receives.
    pub fn var(&self) -> LocalId {
        match self {
            Operation::Source(source) => source.var,
            Operation::Filter { var, .. }
            | Operation::TakeWhile { var, .. }
            | Operation::CompoundFilter { var, .. }
            | Operation::Map { var, .. }
            | Operation::FlatMap { var, .. }
            | Operation::Limit { var, .. }
            | Operation::Distinct { var, .. } => *var,
        }
    }

    pub fn as_source(&self) -> Option<&StreamSource> {
        match self {
            Operation::Source(source) => Some(source),
            _ => None,
        }
    }

    pub fn is_filter(&self) -> bool {
        matches!(self, Operation::Filter { .. })
    }

    /// Expressions of the loop the operation copies into the pipeline.
    pub fn expressions(&self) -> Vec<ExprId> {
        match self {
            Operation::Source(source) => source.expressions(),
            Operation::Filter { condition, .. } | Operation::TakeWhile { condition, .. } => {
                vec![*condition]
            }
            Operation::CompoundFilter {
                source, condition, ..
            } => {
                let mut out = vec![*condition];
                out.extend(source.expressions());
                out
            }
            Operation::Map { expr, .. } => expr.expr().into_iter().collect(),
            Operation::FlatMap { source, .. } => source.expressions(),
            Operation::Limit { limit, .. } => vec![*limit],
            Operation::Distinct { .. } => Vec::new(),
        }
    }

    /// Whether `reference`, a write of `local`, disappears with this operation.
    pub fn is_write_allowed(&self, body: &Body, local: LocalId, reference: ExprId) -> bool {
        match self {
            Operation::Source(source)
            | Operation::CompoundFilter { source, .. }
            | Operation::FlatMap { source, .. } => source.is_write_allowed(body, local, reference),
            Operation::Map {
                expr: Fragment::Expr(expr),
                var,
                ..
            } => local == *var && body.expr_parent(reference) == body.expr_parent(*expr),
            Operation::Limit { counter, count, .. } => {
                *counter == Some(local) && body.is_within(Node::Expr(reference), Node::Expr(*count))
            }
            _ => false,
        }
    }

    pub fn can_reassign_variable(&self, local: LocalId) -> bool {
        match self {
            Operation::Source(source) | Operation::FlatMap { source, .. } => {
                source.can_reassign_variable(local)
            }
            _ => true,
        }
    }

    /// Appends this operation to `call`.
    pub fn render(&self, body: &Body, call: &mut PipelineCall) {
        match self {
            Operation::Source(_) => {}
            Operation::Filter {
                condition,
                var,
                negated,
            } => {
                let text = condition_text(body, *condition, *negated);
                call.push("filter", vec![lambda(&body.local(*var).name, &text)]);
            }
            Operation::TakeWhile { condition, var } => {
                let text = condition_text(body, *condition, true);
                call.push("takeWhile", vec![lambda(&body.local(*var).name, &text)]);
            }
            Operation::CompoundFilter {
                source,
                condition,
                negated,
                var,
            } => {
                let matcher = lambda(
                    &body.local(source.var).name,
                    &condition_text(body, *condition, *negated),
                );
                let nested = source.render(body).call("anyMatch", vec![matcher]);
                call.push(
                    "filter",
                    vec![lambda(&body.local(*var).name, &nested.to_string())],
                );
            }
            Operation::Map { expr, var, ty, .. } => {
                let expr_is_var = expr.expr().is_some_and(|e| body.is_reference_to(e, *var));
                call.extend(map_step(
                    &body.local(*var).name,
                    &body.local_type(*var),
                    ty,
                    &expr.text(body),
                    expr_is_var,
                ));
            }
            Operation::FlatMap { source, var } => {
                call.extend(flat_map_steps(body, source, *var));
            }
            Operation::Limit { limit, delta, .. } => {
                call.push("limit", vec![add_constant(body, *limit, *delta)]);
            }
            Operation::Distinct { .. } => call.push("distinct", Vec::new()),
        }
    }
}

fn flat_map_steps(body: &Body, source: &StreamSource, var: LocalId) -> Vec<PipelineStep> {
    let in_ty = body.local_type(var);
    let out_ty = body.local_type(source.var);
    let function = lambda(&body.local(var).name, &source.render(body).to_string());
    let mut operation = "flatMap";
    if out_ty.is_primitive() && !out_ty.same_as(&in_ty) {
        operation = match out_ty.stream_class() {
            "IntStream" => "flatMapToInt",
            "LongStream" => "flatMapToLong",
            "DoubleStream" => "flatMapToDouble",
            _ => "flatMap",
        };
    }
    if in_ty.is_primitive() && !out_ty.same_as(&in_ty) {
        return vec![
            PipelineStep::new("mapToObj", vec![function]),
            PipelineStep::new(operation, vec!["Function.identity()".to_string()]),
        ];
    }
    vec![PipelineStep::new(operation, vec![function])]
}

/// `expr + delta`, folded when `expr` is a constant.
pub(crate) fn add_constant(body: &Body, expr: ExprId, delta: i64) -> String {
    if delta == 0 {
        return body.expr_text(expr).to_string();
    }
    if let Some(value) = body.constant_int(expr).and_then(|v| v.checked_add(delta)) {
        if body.type_of(expr) == JavaType::LONG {
            return format!("{value}L");
        }
        return value.to_string();
    }
    format!("{} + {delta}", body.text_at_precedence(expr, 11))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::test_support::{expr, method};

    use super::*;

    #[test]
    fn limit_folds_constants() {
        let body = method("int n = 3; long m = 4L; for (String s : list) { use(n + 1, m, k); }");
        assert_eq!(add_constant(&body, expr(&body, "3"), 1), "4");
        assert_eq!(add_constant(&body, expr(&body, "n + 1"), 1), "5");
        assert_eq!(add_constant(&body, expr(&body, "m"), 1), "5L");
        assert_eq!(add_constant(&body, expr(&body, "k"), 1), "k + 1");
        assert_eq!(add_constant(&body, expr(&body, "k"), 0), "k");
    }
}
