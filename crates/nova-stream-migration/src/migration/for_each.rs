//! `forEach(...)` and `forEachOrdered(...)`: the fallback for loops whose
//! body only has effects.

use nova_hir::{Body, Expr, ExprId, Node, Stmt, StmtId};
use nova_types::Span;

use crate::edit::TextEdit;
use crate::patterns::call_parts;
use crate::pipeline::{lambda, map_step};
use crate::rewrite::Rewriter;
use crate::terminal_block::TerminalBlock;
use crate::{MigrateError, MigrationContext};

/// For `consume(f(x))`, the argument `f(x)`: it can be mapped first so the
/// consumer receives the mapped element.
pub(super) fn map_expression(cx: MigrationContext<'_>, tb: &TerminalBlock) -> Option<ExprId> {
    let body = cx.body;
    let var = tb.var();
    let call = tb.single_method_call(body)?;
    let (receiver, _, [arg]) = call_parts(body, call)? else {
        return None;
    };
    if body.is_reference_to(*arg, var)
        || !body.is_referenced(var, Node::Expr(*arg))
        || receiver.is_some_and(|r| body.is_referenced(var, Node::Expr(r)))
        || !body.type_of(*arg).is_stream_eligible()
    {
        return None;
    }
    Some(*arg)
}

pub(super) fn migrate(cx: MigrationContext<'_>, tb: &TerminalBlock, ordered: bool) -> Result<Vec<TextEdit>, MigrateError> {
    let body = cx.body;
    let var = tb.var();
    let name = &body.local(var).name;
    let mut stream = tb.generate(body);

    let consumer = match map_expression(cx, tb) {
        Some(arg) => {
            stream.extend(map_step(
                name,
                &body.local_type(var),
                &body.type_of(arg),
                body.expr_text(arg),
                false,
            ));
            let call = tb
                .single_method_call(body)
                .ok_or_else(|| MigrateError::InvariantViolation("mapped consumer is not a call".to_string()))?;
            let range = body.expr(call).range();
            body.text_with_replacements(range, &[(body.expr(arg).range(), name.clone())])
        }
        None => consumer_text(body, tb.statements()),
    };
    let method = if ordered { "forEachOrdered" } else { "forEach" };
    stream.push(method, vec![lambda(name, &consumer)]);

    let mut rewriter = Rewriter::new(body);
    rewriter.replace_stmt(tb.main_loop(), format!("{stream};"));
    rewriter.finish()
}

/// The statements as a lambda body. A `continue` of the replaced loop
/// becomes `return;`.
fn consumer_text(body: &Body, statements: &[StmtId]) -> String {
    if let [single] = statements {
        if let Stmt::Expr { expr, .. } = body.stmt(*single) {
            return body.expr_text(*expr).to_string();
        }
    }
    let mut parts = Vec::with_capacity(statements.len());
    for stmt in statements {
        let range = body.stmt(*stmt).range();
        let replacements: Vec<(Span, String)> = loop_continues(body, *stmt)
            .into_iter()
            .map(|c| (body.stmt(c).range(), "return;".to_string()))
            .collect();
        parts.push(body.text_with_replacements(range, &replacements));
    }
    format!("{{\n{}\n}}", parts.join("\n"))
}

/// Unlabeled `continue` statements under `stmt` that continue the replaced loop.
fn loop_continues(body: &Body, stmt: StmtId) -> Vec<StmtId> {
    let mut out = Vec::new();
    body.walk(Node::Stmt(stmt), &mut |node| match node {
        Node::Stmt(id) => match body.stmt(id) {
            Stmt::Continue { label: None, .. } => {
                out.push(id);
                false
            }
            Stmt::LocalClass { .. } | Stmt::Method { .. } => false,
            // A nested loop owns the continues inside it.
            s => !s.is_loop(),
        },
        Node::Expr(id) => !matches!(body.expr(id), Expr::Lambda { .. } | Expr::New { members: Some(_), .. }),
    });
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::test_support::{rewrite, rewrite_with};
    use crate::{InspectionOptions, MigrationKind};

    fn suggesting() -> InspectionOptions {
        InspectionOptions {
            suggest_foreach: true,
            ..InspectionOptions::default()
        }
    }

    #[test]
    fn filtered_print_becomes_for_each() {
        let (migration, out) =
            rewrite_with("for (String s : list) { if (s == null) continue; System.out.println(s); } return null;", &suggesting())
                .expect("migrates");
        assert_eq!(migration.kind, MigrationKind::ForEach { ordered: false });
        assert!(migration.should_warn);
        assert_eq!(
            out,
            "list.stream().filter(s -> s != null).forEach(s -> System.out.println(s)); return null;"
        );
    }

    #[test]
    fn single_argument_is_mapped_first() {
        let (migration, out) =
            rewrite_with("for (String s : list) { System.out.println(s.trim()); } return null;", &suggesting())
                .expect("migrates");
        assert!(migration.should_warn);
        assert_eq!(
            out,
            "list.stream().map(s -> s.trim()).forEach(s -> System.out.println(s)); return null;"
        );
    }

    #[test]
    fn inner_continue_becomes_return() {
        let (_, out) = rewrite(
            "for (String s : list) { System.out.println(s); if (s.isEmpty()) continue; System.out.println(s.length()); } return null;",
        )
        .expect("migrates");
        assert_eq!(
            out,
            "list.stream().forEach(s -> { System.out.println(s); if (s.isEmpty()) return; System.out.println(s.length()); }); return null;"
        );
    }

    #[test]
    fn trivial_loop_is_informational_by_default() {
        let (migration, _) = rewrite("for (String s : list) { System.out.println(s); } return null;").expect("migrates");
        assert_eq!(migration.kind, MigrationKind::ForEach { ordered: false });
        assert!(!migration.should_warn);
    }
}
