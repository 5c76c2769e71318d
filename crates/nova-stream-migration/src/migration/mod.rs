//! Choosing the terminal operation for a peeled loop, and performing it.

pub(crate) mod collect;
mod count;
mod find;
mod for_each;
pub(crate) mod joining;
mod reduce;
mod to_array;

use nova_flow::{find_exit_points, used_variables, Cancelled, CheckCancelled};
use nova_hir::{Body, ExprId, LocalId, Node, Stmt};
use serde::Serialize;

use crate::edit::{normalize_text_edits, TextEdit};
use crate::operation::Operation;
use crate::patterns::is_method_ref_candidate;
use crate::rewrite::{deletion, sole_declaration};
use crate::source::{SourceKind, StreamSource};
use crate::terminal_block::TerminalBlock;
use crate::{InspectionOptions, MigrateError, MigrationContext};

pub use reduce::ReductionOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationKind {
    Collect,
    Joining,
    Count,
    Sum,
    Reduction(ReductionOp),
    FindExtremum { max: bool },
    ForEach { ordered: bool },
    Match,
    FindFirst,
    ToArray,
}

/// A terminal that expresses the statements left in a peeled loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Migration {
    pub kind: MigrationKind,
    /// The stream method the loop turns into, as shown to the user.
    pub replacement: String,
    /// `false` when the rewrite does not make the code shorter.
    pub should_warn: bool,
}

impl Migration {
    fn new(kind: MigrationKind, replacement: &str, should_warn: bool) -> Self {
        Self {
            kind,
            replacement: replacement.to_string(),
            should_warn,
        }
    }

    /// The `forEachOrdered` alternative of a `forEach` migration.
    pub fn ordered(&self) -> Option<Migration> {
        match self.kind {
            MigrationKind::ForEach { ordered: false } => Some(Migration::new(
                MigrationKind::ForEach { ordered: true },
                "forEachOrdered",
                self.should_warn,
            )),
            _ => None,
        }
    }

    /// Produces the edits replacing the loop of `tb`.
    ///
    /// The terminal is recognized again from `tb`; a shape that no longer
    /// matches is an [`MigrateError::InvariantViolation`].
    pub fn migrate(&self, cx: MigrationContext<'_>, tb: &TerminalBlock) -> Result<Vec<TextEdit>, MigrateError> {
        let mut edits = match self.kind {
            MigrationKind::Collect => collect::migrate(cx, tb),
            MigrationKind::Joining => joining::migrate(cx, tb),
            MigrationKind::Count => count::migrate_count(cx, tb),
            MigrationKind::Sum => count::migrate_sum(cx, tb),
            MigrationKind::Reduction(op) => reduce::migrate_reduction(cx, tb, op),
            MigrationKind::FindExtremum { .. } => reduce::migrate_extremum(cx, tb),
            MigrationKind::ForEach { ordered } => for_each::migrate(cx, tb, ordered),
            MigrationKind::Match => find::migrate_match(cx, tb),
            MigrationKind::FindFirst => find::migrate_find_first(cx, tb),
            MigrationKind::ToArray => to_array::migrate(cx, tb),
        }?;
        for local in dead_locals(cx.body, tb) {
            edits.push(deletion(cx.body, sole_declaration(cx.body, local)?));
        }
        normalize_text_edits(cx.body.source(), &mut edits)?;
        Ok(edits)
    }
}

/// Locals that only served the loop: a helper set replaced by `distinct()`,
/// a counter replaced by `limit()`, the line variable of a reader loop.
fn dead_locals(body: &Body, tb: &TerminalBlock) -> Vec<LocalId> {
    tb.operations()
        .iter()
        .filter_map(|op| match op {
            Operation::Distinct {
                helper: Some(local),
                ..
            }
            | Operation::Limit {
                counter: Some(local),
                ..
            } => Some(*local),
            Operation::Source(StreamSource {
                kind:
                    SourceKind::BufferedReaderLines {
                        delete_variable: true,
                        ..
                    },
                var,
                ..
            }) => Some(*var),
            _ => None,
        })
        .collect()
}

/// Picks the first terminal, in priority order, that expresses what is left
/// of the loop body in `tb`.
pub fn find_migration(
    cx: MigrationContext<'_>,
    tb: &TerminalBlock,
    options: &InspectionOptions,
    check_cancelled: CheckCancelled<'_>,
) -> Result<Option<Migration>, Cancelled> {
    let body = cx.body;
    let loop_stmt = tb.main_loop();
    let non_final = non_final_variables(body, tb, check_cancelled)?;
    let replace_trivial = options.replace_trivial_foreach;

    if count::is_count_operation(cx, tb, &non_final) {
        return Ok(Some(Migration::new(MigrationKind::Count, "count", true)));
    }
    if let Some(terminal) = collect::extract_collect_terminal(cx, tb, Some(non_final.as_slice())) {
        let add_all = matches!(body.stmt(loop_stmt), Stmt::ForEach { .. })
            && !tb.has_operations()
            && is_add_all_call(body, tb);
        if add_all {
            return Ok(None);
        }
        let should_warn = replace_trivial
            || tb.has_operations()
            || tb.source().is_buffered_reader()
            || !terminal.is_trivial(body, tb);
        return Ok(Some(Migration::new(
            MigrationKind::Collect,
            terminal.method_name(),
            should_warn,
        )));
    }
    if joining::extract_terminal(cx, tb, Some(non_final.as_slice())).is_some() {
        return Ok(Some(Migration::new(MigrationKind::Joining, "collect", true)));
    }
    if tb.count_expression().is_some() || tb.is_empty() {
        return Ok(None);
    }
    if non_final.is_empty() && to_array::extract_array(cx, tb).is_some() {
        return Ok(Some(Migration::new(MigrationKind::ToArray, "toArray", true)));
    }
    if count::sum_accumulator(cx, tb, &non_final).is_some() {
        return Ok(Some(Migration::new(MigrationKind::Sum, "sum", true)));
    }
    if let Some(extremum) = reduce::extract_extremum(cx, tb, &non_final) {
        let name = if extremum.max { "max" } else { "min" };
        return Ok(Some(Migration::new(
            MigrationKind::FindExtremum { max: extremum.max },
            name,
            true,
        )));
    }
    for op in ReductionOp::ALL {
        if reduce::accumulated_variable(cx, tb, &non_final, op).is_some() {
            return Ok(Some(Migration::new(MigrationKind::Reduction(op), "reduce", true)));
        }
    }

    let exits = find_exit_points(body, tb.statements(), check_cancelled)?;
    let only_unlabeled_continue = exits
        .iter()
        .all(|s| matches!(body.stmt(*s), Stmt::Continue { label: None, .. }));
    if only_unlabeled_continue && non_final.is_empty() {
        let should_warn = options.suggest_foreach
            && (replace_trivial
                || tb.has_operations()
                || for_each::map_expression(cx, tb).is_some()
                || !is_trivial(body, tb));
        return Ok(Some(Migration::new(
            MigrationKind::ForEach { ordered: false },
            "forEach",
            should_warn,
        )));
    }
    if non_final.is_empty()
        && tb
            .single_statement()
            .is_some_and(|s| matches!(body.stmt(s), Stmt::Return { .. }))
    {
        return Ok(find::migration_for_return(cx, tb, replace_trivial));
    }
    // The pipeline itself must not read variables the loop mutates.
    if tb
        .intermediate_and_source_expressions()
        .into_iter()
        .any(|e| non_final.iter().any(|l| body.is_referenced(*l, Node::Expr(e))))
    {
        return Ok(None);
    }
    if let [statement, break_stmt] = tb.statements() {
        if nova_flow::statement_breaks_loop(body, *break_stmt, loop_stmt) && exits == [*break_stmt] {
            return Ok(find::migration_for_break(
                cx,
                tb,
                &non_final,
                *statement,
                replace_trivial,
            ));
        }
    }
    Ok(None)
}

/// Locals the loop body uses that are written somewhere no operation
/// accounts for. Fields are never locals, so they never show up here.
fn non_final_variables(
    body: &Body,
    tb: &TerminalBlock,
    check_cancelled: CheckCancelled<'_>,
) -> Result<Vec<LocalId>, Cancelled> {
    let loop_stmt = tb.main_loop();
    let Some(loop_body) = body.stmt(loop_stmt).loop_body() else {
        return Ok(Vec::new());
    };
    let surrounder = body.surrounder(Node::Stmt(loop_stmt));
    let used = used_variables(body, loop_body, check_cancelled)?;
    Ok(used
        .into_iter()
        .filter(|local| body.local(*local).owner == surrounder)
        .filter(|local| !is_variable_suitable_for_stream(body, tb, *local))
        .collect())
}

fn is_variable_suitable_for_stream(body: &Body, tb: &TerminalBlock, local: LocalId) -> bool {
    let writes = body.writes(local, Node::Stmt(body.root));
    writes.iter().all(|reference| {
        tb.operations()
            .iter()
            .any(|op| op.is_write_allowed(body, local, *reference))
    }) || body.is_effectively_final(local)
}

/// `for (T x : src) target.add(x);` is `target.addAll(src)`, not a stream.
fn is_add_all_call(body: &Body, tb: &TerminalBlock) -> bool {
    let Some(call) = tb.single_method_call(body) else {
        return false;
    };
    if body.local_type(tb.var()).is_primitive() {
        return false;
    }
    let Some((receiver, "add", [arg])) = crate::patterns::call_parts(body, call) else {
        return false;
    };
    if !body.is_reference_to(*arg, tb.var()) {
        return false;
    }
    match receiver.map(|r| body.expr(body.skip_parens(r))) {
        None | Some(nova_hir::Expr::This { .. }) => body.owner_name != "addAll",
        Some(nova_hir::Expr::Call { .. }) => false,
        Some(_) => true,
    }
}

/// A single statement that a method reference would express just as well.
fn is_trivial(body: &Body, tb: &TerminalBlock) -> bool {
    !tb
        .single_statement()
        .is_some_and(|s| is_method_ref_candidate(body, s, tb.var()))
}

/// Condition and negation of the last operation, when it is a filter.
pub(crate) fn last_filter(tb: &TerminalBlock) -> Option<(ExprId, bool)> {
    match tb.last_operation() {
        Operation::Filter {
            condition, negated, ..
        } => Some((*condition, *negated)),
        _ => None,
    }
}
