//! Collects the text edits of one migration.
//!
//! Every rewrite replaces the loop (or folds the pipeline into an existing
//! declaration) and then deletes declarations and statements the pipeline
//! made dead. Edits are normalized once at the end, so an overlap between
//! them surfaces as [`MigrateError::Edit`] instead of corrupting the file.

use nova_flow::InitializerUsageStatus;
use nova_hir::{Body, ExprId, LocalId, Node, Stmt, StmtId};
use nova_types::Span;

use crate::edit::{normalize_text_edits, TextEdit};
use crate::MigrateError;

pub(crate) struct Rewriter<'a> {
    body: &'a Body,
    edits: Vec<TextEdit>,
}

impl<'a> Rewriter<'a> {
    pub(crate) fn new(body: &'a Body) -> Self {
        Self {
            body,
            edits: Vec::new(),
        }
    }

    pub(crate) fn replace_range(&mut self, range: Span, text: impl Into<String>) {
        self.edits.push(TextEdit::new(range, text));
    }

    pub(crate) fn replace_expr(&mut self, expr: ExprId, text: impl Into<String>) {
        self.edits
            .push(TextEdit::new(self.body.expr(expr).range(), text));
    }

    /// Replaces `stmt` together with the labels wrapping it.
    pub(crate) fn replace_stmt(&mut self, stmt: StmtId, text: impl Into<String>) {
        let stmt = self.body.label_wrapped(stmt);
        self.edits
            .push(TextEdit::new(self.body.stmt(stmt).range(), text));
    }

    /// Deletes `stmt`, taking its whole line when nothing else is on it.
    pub(crate) fn delete_stmt(&mut self, stmt: StmtId) {
        self.edits.push(deletion(self.body, stmt));
    }

    /// Deletes the declaration of `local`, which must be its only declarator.
    pub(crate) fn delete_local(&mut self, local: LocalId) -> Result<(), MigrateError> {
        let decl = sole_declaration(self.body, local)?;
        self.delete_stmt(decl);
        Ok(())
    }

    /// Makes `value` the value of `local` where the loop used to be.
    pub(crate) fn replace_initializer(
        &mut self,
        loop_stmt: StmtId,
        local: LocalId,
        value: &str,
        status: InitializerUsageStatus,
    ) -> Result<(), MigrateError> {
        let data = self.body.local(local);
        match status {
            InitializerUsageStatus::DeclaredJustBefore => {
                let initializer = data.initializer.ok_or_else(|| {
                    MigrateError::InvariantViolation(format!("`{}` has no initializer", data.name))
                })?;
                self.replace_expr(initializer, value);
                self.delete_stmt(loop_stmt);
            }
            InitializerUsageStatus::AtWantedPlaceOnly => {
                let initializer = data.initializer.ok_or_else(|| {
                    MigrateError::InvariantViolation(format!("`{}` has no initializer", data.name))
                })?;
                let range = self.body.expr(initializer).range();
                self.edits.push(TextEdit::delete(Span::new(
                    data.name_range.end,
                    range.end,
                )));
                self.replace_stmt(loop_stmt, format!("{} = {value};", data.name));
            }
            InitializerUsageStatus::AtWantedPlace => {
                self.replace_stmt(loop_stmt, format!("{} = {value};", data.name));
            }
            InitializerUsageStatus::Unknown => {
                return Err(MigrateError::InvariantViolation(format!(
                    "initializer of `{}` cannot be replaced",
                    data.name
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> Result<Vec<TextEdit>, MigrateError> {
        let mut edits = self.edits;
        normalize_text_edits(self.body.source(), &mut edits)?;
        Ok(edits)
    }
}

/// Deletes `stmt` and its labels, taking the whole line when nothing else is
/// on it.
pub(crate) fn deletion(body: &Body, stmt: StmtId) -> TextEdit {
    let stmt = body.label_wrapped(stmt);
    TextEdit::delete(line_range(body.source(), body.stmt(stmt).range()))
}

pub(crate) fn sole_declaration(body: &Body, local: LocalId) -> Result<StmtId, MigrateError> {
    let data = body.local(local);
    match data.decl {
        Some(decl) if matches!(body.stmt(decl), Stmt::LocalVar { locals, .. } if locals.len() == 1) => {
            Ok(decl)
        }
        _ => Err(MigrateError::InvariantViolation(format!(
            "`{}` is not declared alone",
            data.name
        ))),
    }
}

/// Text of a statement block as a lambda body: the single expression of an
/// expression statement, or the braced statements.
pub(crate) fn lambda_body_text(body: &Body, statements: &[StmtId]) -> String {
    if let [single] = statements {
        if let Stmt::Expr { expr, .. } = body.stmt(*single) {
            return body.expr_text(*expr).to_string();
        }
    }
    let inner: Vec<&str> = statements.iter().map(|s| body.stmt_text(*s)).collect();
    format!("{{\n{}\n}}", inner.join("\n"))
}

/// Whether `local` is referenced anywhere outside of `allowed`.
pub(crate) fn is_used_outside(body: &Body, local: LocalId, allowed: &[Node]) -> bool {
    body.all_references(local).into_iter().any(|reference| {
        !allowed
            .iter()
            .any(|node| body.is_within(Node::Expr(reference), *node))
    })
}

fn line_range(text: &str, range: Span) -> Span {
    let bytes = text.as_bytes();
    let mut start = range.start;
    while start > 0 && matches!(bytes[start - 1], b' ' | b'\t') {
        start -= 1;
    }
    if start > 0 && bytes[start - 1] != b'\n' {
        return range;
    }
    let mut end = range.end;
    while end < bytes.len() && matches!(bytes[end], b' ' | b'\t' | b'\r') {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'\n' {
        Span::new(start, end + 1)
    } else if end == bytes.len() {
        Span::new(start, end)
    } else {
        range
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn deletes_whole_lines_only() {
        let text = "a();\n    b();\nc(); d();\n";
        let b = text.find("b()").unwrap();
        assert_eq!(line_range(text, Span::new(b, b + 4)), Span::new(5, 14));
        let d = text.find("d()").unwrap();
        assert_eq!(line_range(text, Span::new(d, d + 4)), Span::new(d, d + 4));
    }
}
