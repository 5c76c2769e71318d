//! Short-circuiting terminals: `anyMatch`/`noneMatch`/`allMatch` and
//! `findFirst`, recognized from a loop that leaves through `return` or
//! `break` on its first matching element.

use nova_flow::{initializer_usage_status, next_return_statement, InitializerUsageStatus};
use nova_hir::{AssignOp, Body, ExprId, LiteralKind, LocalId, LocalKind, Node, Stmt, StmtId};
use nova_types::JavaType;

use crate::edit::TextEdit;
use crate::operation::Operation;
use crate::patterns::{assignment, condition_text, is_safely_recomputable, is_stable_value, statement_expr};
use crate::pipeline::{lambda, map_step, stream_primitive, PipelineCall};
use crate::rewrite::{lambda_body_text, Rewriter};
use crate::terminal_block::TerminalBlock;
use crate::{MigrateError, MigrationContext};

use super::{Migration, MigrationKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchShape {
    /// `return b;` in the loop and `return !b;` right after it.
    ReturnBoolean { value: bool, next: StmtId },
    /// `found = b; break;` folded into the declaration of `found`.
    Flag {
        local: LocalId,
        value: bool,
        status: InitializerUsageStatus,
    },
    /// Any other statement, run once when some element matches.
    Conditional { statement: StmtId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FindFirstShape {
    /// `return e(x);` in the loop, `return fallback;` after it.
    Return { value: ExprId, next: StmtId, fallback: ExprId },
    /// `v = e(x); break;`
    Assign { local: LocalId, value: ExprId },
    /// `use(x); break;`
    IfPresent { statement: StmtId },
}

pub(super) fn migration_for_return(
    cx: MigrationContext<'_>,
    tb: &TerminalBlock,
    replace_trivial: bool,
) -> Option<Migration> {
    let body = cx.body;
    let ret = tb.single_statement()?;
    if let Some(shape) = find_first_on_return(body, tb, ret) {
        let FindFirstShape::Return { fallback, .. } = shape else {
            return None;
        };
        return is_stable_value(body, fallback)
            .then(|| Migration::new(MigrationKind::FindFirst, "findFirst", true));
    }
    match match_on_return(body, tb, ret)? {
        MatchShape::ReturnBoolean { value, .. } => Some(Migration::new(
            MigrationKind::Match,
            match_name(body, tb, !value, true),
            true,
        )),
        _ => conditional_migration(tb, replace_trivial),
    }
}

pub(super) fn migration_for_break(
    cx: MigrationContext<'_>,
    tb: &TerminalBlock,
    non_final: &[LocalId],
    statement: StmtId,
    replace_trivial: bool,
) -> Option<Migration> {
    let body = cx.body;
    if let Some(shape) = find_first_on_break(body, tb, statement) {
        let allowed = match shape {
            FindFirstShape::Assign { local, .. } => non_final == [local],
            _ => non_final.is_empty(),
        };
        return allowed.then(|| Migration::new(MigrationKind::FindFirst, "findFirst", true));
    }
    match match_on_break(body, tb, statement) {
        MatchShape::Flag { local, value, .. } if non_final == [local] => Some(Migration::new(
            MigrationKind::Match,
            match_name(body, tb, !value, true),
            true,
        )),
        _ => conditional_migration(tb, replace_trivial),
    }
}

fn conditional_migration(tb: &TerminalBlock, replace_trivial: bool) -> Option<Migration> {
    if !replace_trivial && !tb.has_operations() {
        return None;
    }
    // A lone filter gives `if (s.anyMatch(x -> c)) ...`, which is no shorter.
    let only_filter = tb.operations().len() == 2 && tb.last_operation().is_filter();
    Some(Migration::new(MigrationKind::Match, "anyMatch", !only_filter))
}

fn return_value(body: &Body, stmt: StmtId) -> Option<Option<ExprId>> {
    match body.stmt(stmt) {
        Stmt::Return { expr, .. } => Some(*expr),
        _ => None,
    }
}

fn match_on_return(body: &Body, tb: &TerminalBlock, ret: StmtId) -> Option<MatchShape> {
    let value = return_value(body, ret)?;
    if let Some(value) = value {
        if tb.depends_on(body, value) {
            return None;
        }
        let next = next_return_statement(body, tb.main_loop());
        let pair = next.and_then(|next| {
            let inner = body.boolean_literal(value)?;
            let after = body.boolean_literal(return_value(body, next)??)?;
            (inner != after).then_some((inner, next))
        });
        if let Some((value, next)) = pair {
            return Some(MatchShape::ReturnBoolean { value, next });
        }
    }
    Some(MatchShape::Conditional { statement: ret })
}

fn find_first_on_return(body: &Body, tb: &TerminalBlock, ret: StmtId) -> Option<FindFirstShape> {
    let value = return_value(body, ret)??;
    if !tb.depends_on(body, value) {
        return None;
    }
    let next = next_return_statement(body, tb.main_loop())?;
    let fallback = return_value(body, next)??;
    Some(FindFirstShape::Return {
        value,
        next,
        fallback,
    })
}

fn match_on_break(body: &Body, tb: &TerminalBlock, statement: StmtId) -> MatchShape {
    let flag = statement_expr(body, statement)
        .and_then(|e| assignment(body, e))
        .and_then(|(op, lhs, rhs)| {
            if op != AssignOp::Assign {
                return None;
            }
            let local = body.as_local(lhs)?;
            let value = body.boolean_literal(rhs)?;
            let data = body.local(local);
            if data.kind != LocalKind::Local {
                return None;
            }
            let init = body.boolean_literal(data.initializer?)?;
            let status = initializer_usage_status(body, local, tb.main_loop());
            (init != value && status != InitializerUsageStatus::Unknown).then_some(MatchShape::Flag {
                local,
                value,
                status,
            })
        });
    flag.unwrap_or(MatchShape::Conditional { statement })
}

fn find_first_on_break(body: &Body, tb: &TerminalBlock, statement: StmtId) -> Option<FindFirstShape> {
    if !depends_in_stmt(body, tb, statement) {
        return None;
    }
    let assigned = statement_expr(body, statement)
        .and_then(|e| assignment(body, e))
        .and_then(|(op, lhs, rhs)| {
            let local = body.as_local(lhs)?;
            (op == AssignOp::Assign
                && body.local(local).kind == LocalKind::Local
                && !body.is_referenced(local, Node::Expr(rhs)))
            .then_some(FindFirstShape::Assign { local, value: rhs })
        });
    Some(assigned.unwrap_or(FindFirstShape::IfPresent { statement }))
}

fn depends_in_stmt(body: &Body, tb: &TerminalBlock, statement: StmtId) -> bool {
    tb.operations()
        .iter()
        .map(Operation::var)
        .chain([tb.var()])
        .any(|var| body.is_referenced(var, Node::Stmt(statement)))
}

/// The name of the match call [`match_call`] renders.
fn match_name(body: &Body, tb: &TerminalBlock, none: bool, allow_all: bool) -> &'static str {
    match tb.last_operation() {
        Operation::Filter {
            condition, negated, ..
        } if allow_all && *negated != body.is_negation(*condition) => "allMatch",
        _ if none => "noneMatch",
        _ => "anyMatch",
    }
}

/// `stream.anyMatch(p)` (or `noneMatch`) testing the last filter. With
/// `allow_all`, a negated predicate is expressed through `allMatch`.
fn match_call(body: &Body, tb: &TerminalBlock, none: bool, allow_all: bool) -> String {
    let Operation::Filter {
        condition,
        var,
        negated,
    } = tb.last_operation()
    else {
        let present = tb
            .generate(body)
            .call("findFirst", Vec::new())
            .call("isPresent", Vec::new());
        return if none { format!("!{present}") } else { present.to_string() };
    };
    let mut stream = tb.without_last_operation().generate(body);
    let name = &body.local(*var).name;
    if allow_all && *negated != body.is_negation(*condition) {
        let positive = condition_text(body, *condition, !*negated);
        stream.push("allMatch", vec![lambda(name, &positive)]);
        return if none {
            stream.to_string()
        } else {
            format!("!{stream}")
        };
    }
    let method = if none { "noneMatch" } else { "anyMatch" };
    stream.push(method, vec![lambda(name, &condition_text(body, *condition, *negated))]);
    stream.to_string()
}

pub(super) fn migrate_match(cx: MigrationContext<'_>, tb: &TerminalBlock) -> Result<Vec<TextEdit>, MigrateError> {
    let body = cx.body;
    let loop_stmt = tb.main_loop();
    let shape = match tb.statements() {
        [ret] => match_on_return(body, tb, *ret),
        [statement, _] => Some(match_on_break(body, tb, *statement)),
        _ => None,
    }
    .ok_or_else(|| MigrateError::InvariantViolation("loop no longer tests for a match".to_string()))?;

    let mut rewriter = Rewriter::new(body);
    match shape {
        MatchShape::ReturnBoolean { value, next } => {
            rewriter.replace_stmt(loop_stmt, format!("return {};", match_call(body, tb, !value, true)));
            if body.next_statement(body.label_wrapped(loop_stmt)) == Some(next) {
                rewriter.delete_stmt(next);
            }
        }
        MatchShape::Flag {
            local,
            value,
            status,
        } => {
            let call = match_call(body, tb, !value, true);
            rewriter.replace_initializer(loop_stmt, local, &call, status)?;
        }
        MatchShape::Conditional { statement } => {
            let call = match_call(body, tb, false, false);
            rewriter.replace_stmt(
                loop_stmt,
                format!("if ({call}) {{\n{}\n}}", body.stmt_text(statement)),
            );
        }
    }
    rewriter.finish()
}

/// The stream mapped to `value`, ready for `findFirst()`.
fn mapped_stream(body: &Body, tb: &TerminalBlock, value: ExprId, target: &JavaType) -> PipelineCall {
    let mut stream = tb.generate(body);
    stream.extend(map_step(
        &body.local(tb.var()).name,
        &body.local_type(tb.var()),
        target,
        body.expr_text(value),
        body.is_reference_to(value, tb.var()),
    ));
    stream
}

/// The element type `findFirst()` should see: a primitive stream cannot
/// fall back to `null`.
fn element_type(body: &Body, value: ExprId, fallback: ExprId) -> JavaType {
    let ty = body.type_of(value);
    let is_null = matches!(
        body.expr(body.skip_parens(fallback)),
        nova_hir::Expr::Literal {
            kind: LiteralKind::Null,
            ..
        }
    );
    if is_null && stream_primitive(&ty).is_some() {
        ty.boxed()
    } else {
        ty
    }
}

pub(super) fn migrate_find_first(
    cx: MigrationContext<'_>,
    tb: &TerminalBlock,
) -> Result<Vec<TextEdit>, MigrateError> {
    let body = cx.body;
    let loop_stmt = tb.main_loop();
    let shape = match tb.statements() {
        [ret] => find_first_on_return(body, tb, *ret),
        [statement, _] => find_first_on_break(body, tb, *statement),
        _ => None,
    }
    .ok_or_else(|| MigrateError::InvariantViolation("loop no longer finds an element".to_string()))?;

    let mut rewriter = Rewriter::new(body);
    match shape {
        FindFirstShape::Return {
            value,
            next,
            fallback,
        } => {
            let stream = mapped_stream(body, tb, value, &element_type(body, value, fallback))
                .call("findFirst", Vec::new())
                .call("orElse", vec![body.expr_text(fallback).to_string()]);
            rewriter.replace_stmt(loop_stmt, format!("return {stream};"));
            if body.next_statement(body.label_wrapped(loop_stmt)) == Some(next) {
                rewriter.delete_stmt(next);
            }
        }
        FindFirstShape::Assign { local, value } => {
            let data = body.local(local);
            let stream = mapped_stream(body, tb, value, &body.local_type(local)).call("findFirst", Vec::new());
            let status = initializer_usage_status(body, local, loop_stmt);
            match data.initializer {
                Some(init) if status != InitializerUsageStatus::Unknown && is_safely_recomputable(body, init) => {
                    let stream = stream.call("orElse", vec![body.expr_text(init).to_string()]);
                    rewriter.replace_initializer(loop_stmt, local, &stream.to_string(), status)?;
                }
                _ => {
                    let stream = stream.call("orElse", vec![data.name.clone()]);
                    rewriter.replace_stmt(loop_stmt, format!("{} = {stream};", data.name));
                }
            }
        }
        FindFirstShape::IfPresent { statement } => {
            let name = &body.local(tb.var()).name;
            let stream = tb
                .generate(body)
                .call("findFirst", Vec::new())
                .call("ifPresent", vec![lambda(name, &lambda_body_text(body, &[statement]))]);
            rewriter.replace_stmt(loop_stmt, format!("{stream};"));
        }
    }
    rewriter.finish()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::test_support::rewrite;
    use crate::MigrationKind;

    #[test]
    fn boolean_return_pair_becomes_any_match() {
        let (migration, out) =
            rewrite("for (String s : list) { if (s.isEmpty()) return true; } return false;").expect("migrates");
        assert_eq!(migration.kind, MigrationKind::Match);
        assert_eq!(migration.replacement, "anyMatch");
        assert_eq!(out, "return list.stream().anyMatch(s -> s.isEmpty());");
    }

    #[test]
    fn negated_return_pair_becomes_all_match() {
        let (migration, out) =
            rewrite("for (String s : list) { if (!s.isEmpty()) return false; } return true;").expect("migrates");
        assert_eq!(migration.replacement, "allMatch");
        assert_eq!(out, "return list.stream().allMatch(s -> s.isEmpty());");
    }

    #[test]
    fn flag_with_break_folds_into_declaration() {
        let (migration, out) = rewrite(
            "boolean found = false; for (String s : list) { if (s.isEmpty()) { found = true; break; } } return found;",
        )
        .expect("migrates");
        assert_eq!(migration.kind, MigrationKind::Match);
        assert_eq!(
            out,
            "boolean found = list.stream().anyMatch(s -> s.isEmpty()); return found;"
        );
    }

    #[test]
    fn returned_element_becomes_find_first() {
        let (migration, out) =
            rewrite("for (String s : list) { if (s.length() > 3) return s.trim(); } return null;").expect("migrates");
        assert_eq!(migration.kind, MigrationKind::FindFirst);
        assert_eq!(
            out,
            "return list.stream().filter(s -> s.length() > 3).map(s -> s.trim()).findFirst().orElse(null);"
        );
    }

    #[test]
    fn assigned_element_folds_into_declaration() {
        let (migration, out) = rewrite(
            "String hit = null; for (String s : list) { if (s.isEmpty()) continue; hit = s; break; } return hit;",
        )
        .expect("migrates");
        assert_eq!(migration.kind, MigrationKind::FindFirst);
        assert_eq!(
            out,
            "String hit = list.stream().filter(s -> !s.isEmpty()).findFirst().orElse(null); return hit;"
        );
    }

    #[test]
    fn side_effect_on_first_match_uses_if_present() {
        let (migration, out) = rewrite(
            "for (String s : list) { if (s.isEmpty()) continue; System.out.println(s); break; } return null;",
        )
        .expect("migrates");
        assert_eq!(migration.kind, MigrationKind::FindFirst);
        assert_eq!(
            out,
            "list.stream().filter(s -> !s.isEmpty()).findFirst().ifPresent(s -> System.out.println(s)); return null;"
        );
    }

    #[test]
    fn find_first_rejects_fallback_with_side_effects() {
        assert_eq!(
            rewrite("for (String s : list) { if (s.isEmpty()) return s; } return list.remove(0);"),
            None
        );
    }

    #[test]
    fn find_first_fallback_must_be_stable() {
        for text in [
            "String last = null; last = list.get(0); \
             for (String s : list) { if (s.isEmpty()) return s; } return last;",
            "for (String s : list) { if (s.isEmpty()) return s; } return list.get(0);",
            "for (String s : list) { if (s.isEmpty()) return s; } return name;",
        ] {
            assert_eq!(rewrite(text), None, "{text}");
        }

        let (_, out) = rewrite(
            "final String none = \"none\"; \
             for (String s : list) { if (s.isEmpty()) return s; } return none + \"!\";",
        )
        .expect("migrates");
        assert_eq!(
            out,
            "final String none = \"none\"; return list.stream().filter(s -> s.isEmpty()).findFirst().orElse(none + \"!\");"
        );
    }
}
