use nova_hir::{Body, Node, Stmt, StmtId};

use crate::{Cancelled, CheckCancelled};

/// The statement an unlabeled or labeled `break` leaves.
///
/// Returns `None` when `stmt` is not a `break` or when its target cannot be
/// found without crossing a lambda or class boundary.
pub fn break_target(body: &Body, stmt: StmtId) -> Option<StmtId> {
    let Stmt::Break { label, .. } = body.stmt(stmt) else {
        return None;
    };
    jump_target(body, stmt, label.as_deref(), |s| {
        s.is_loop() || matches!(s, Stmt::Switch { .. })
    })
}

/// The loop a `continue` proceeds with.
pub fn continue_target(body: &Body, stmt: StmtId) -> Option<StmtId> {
    let Stmt::Continue { label, .. } = body.stmt(stmt) else {
        return None;
    };
    jump_target(body, stmt, label.as_deref(), Stmt::is_loop)
}

fn jump_target(
    body: &Body,
    from: StmtId,
    label: Option<&str>,
    unlabeled: impl Fn(&Stmt) -> bool,
) -> Option<StmtId> {
    let mut current = body.stmt_parent(from);
    while let Some(node) = current {
        // Statements only hang below expressions inside lambdas and
        // anonymous classes, which jumps never leave.
        let Node::Stmt(id) = node else {
            return None;
        };
        let stmt = body.stmt(id);
        match (label, stmt) {
            (
                Some(wanted),
                Stmt::Labeled {
                    label, body: inner, ..
                },
            ) if label == wanted => return Some(unwrap_labels(body, *inner)),
            (None, stmt) if unlabeled(stmt) => return Some(id),
            (_, Stmt::Method { .. } | Stmt::LocalClass { .. }) => return None,
            _ => {}
        }
        current = body.stmt_parent(id);
    }
    None
}

fn unwrap_labels(body: &Body, mut stmt: StmtId) -> StmtId {
    while let Stmt::Labeled { body: inner, .. } = body.stmt(stmt) {
        stmt = *inner;
    }
    stmt
}

/// Whether `stmt` is a `break` that leaves `loop_stmt`.
pub fn statement_breaks_loop(body: &Body, stmt: StmtId, loop_stmt: StmtId) -> bool {
    break_target(body, stmt) == Some(unwrap_labels(body, loop_stmt))
}

/// Jump statements in `statements` that transfer control outside of them:
/// `break` and `continue` whose target lies outside, every `return`, and
/// `throw` statements not enclosed in a `try` with catch clauses.
///
/// Lambda bodies and class members are not entered.
pub fn find_exit_points(
    body: &Body,
    statements: &[StmtId],
    check_cancelled: CheckCancelled<'_>,
) -> Result<Vec<StmtId>, Cancelled> {
    let inside = |target: Option<StmtId>| {
        target.is_some_and(|target| {
            statements
                .iter()
                .any(|s| body.is_within(Node::Stmt(target), Node::Stmt(*s)))
        })
    };

    let mut exits = Vec::new();
    let mut stack: Vec<StmtId> = statements.iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        check_cancelled()?;
        match body.stmt(id) {
            Stmt::Break { .. } if !inside(break_target(body, id)) => exits.push(id),
            Stmt::Continue { .. } if !inside(continue_target(body, id)) => exits.push(id),
            Stmt::Return { .. } => exits.push(id),
            Stmt::Throw { .. } if !is_caught(body, id, statements) => exits.push(id),
            Stmt::LocalClass { .. } | Stmt::Method { .. } => continue,
            _ => {}
        }
        let children = body.children(Node::Stmt(id));
        stack.extend(children.into_iter().rev().filter_map(|child| match child {
            Node::Stmt(stmt) => Some(stmt),
            Node::Expr(_) => None,
        }));
    }
    Ok(exits)
}

fn is_caught(body: &Body, throw: StmtId, range: &[StmtId]) -> bool {
    let mut child = throw;
    while !range.contains(&child) {
        let Some(Node::Stmt(parent)) = body.stmt_parent(child) else {
            return false;
        };
        if let Stmt::Try {
            body: try_body,
            catches,
            ..
        } = body.stmt(parent)
        {
            if *try_body == child && !catches.is_empty() {
                return true;
            }
        }
        child = parent;
    }
    false
}

/// The `return` statement control reaches right after `stmt` completes
/// normally, following trailing positions out of `if` branches.
pub fn next_return_statement(body: &Body, mut stmt: StmtId) -> Option<StmtId> {
    loop {
        if let Some(next) = body.next_statement(stmt) {
            return matches!(body.stmt(next), Stmt::Return { .. }).then_some(next);
        }
        let Some(Node::Stmt(mut parent)) = body.stmt_parent(body.label_wrapped(stmt)) else {
            return None;
        };
        if matches!(body.stmt(parent), Stmt::Block { .. }) {
            let Some(Node::Stmt(grand)) = body.stmt_parent(parent) else {
                return None;
            };
            parent = grand;
        }
        if !matches!(body.stmt(parent), Stmt::If { .. }) {
            return None;
        }
        stmt = parent;
    }
}
