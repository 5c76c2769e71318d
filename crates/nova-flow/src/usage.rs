use nova_hir::{BinaryOp, Body, Expr, ExprId, LocalId, LocalKind, Node, Stmt, StmtId};

use crate::{Cancelled, CheckCancelled};

/// Methods that read a container or string without changing it.
const READ_ONLY_METHODS: &[&str] = &[
    "size",
    "isEmpty",
    "length",
    "contains",
    "containsKey",
    "containsValue",
    "get",
    "getOrDefault",
    "indexOf",
    "equals",
    "hashCode",
    "toString",
];

/// Locals read or written at or below `within`, in order of first use.
pub fn used_variables(
    body: &Body,
    within: StmtId,
    check_cancelled: CheckCancelled<'_>,
) -> Result<Vec<LocalId>, Cancelled> {
    check_cancelled()?;
    Ok(body.referenced_locals(Node::Stmt(within)))
}

/// How the value a local is initialized with relates to the statement that
/// is about to replace it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitializerUsageStatus {
    /// The declaration is the statement immediately before.
    DeclaredJustBefore,
    /// Declared earlier in the same block and untouched in between, so the
    /// initializer is only observed at the wanted place.
    AtWantedPlaceOnly,
    /// Declared earlier; the statements in between read the variable
    /// without changing it.
    AtWantedPlace,
    Unknown,
}

/// Classifies the initializer of `local` with respect to `next`, a
/// statement in the same block as the declaration.
pub fn initializer_usage_status(body: &Body, local: LocalId, next: StmtId) -> InitializerUsageStatus {
    let data = body.local(local);
    if data.kind != LocalKind::Local || data.is_final {
        return InitializerUsageStatus::Unknown;
    }
    let Some(decl) = data.decl else {
        return InitializerUsageStatus::Unknown;
    };
    if !matches!(body.stmt(decl), Stmt::LocalVar { .. }) || body.is_referenced(local, Node::Stmt(decl))
    {
        return InitializerUsageStatus::Unknown;
    }
    let next = body.label_wrapped(next);
    let Some((siblings, decl_idx)) = body.siblings(decl) else {
        return InitializerUsageStatus::Unknown;
    };
    let Some(next_idx) = siblings.iter().position(|s| *s == next) else {
        return InitializerUsageStatus::Unknown;
    };
    if next_idx <= decl_idx {
        return InitializerUsageStatus::Unknown;
    }
    if next_idx == decl_idx + 1 {
        return InitializerUsageStatus::DeclaredJustBefore;
    }

    let mut status = InitializerUsageStatus::AtWantedPlaceOnly;
    for stmt in &siblings[decl_idx + 1..next_idx] {
        for reference in body.references(local, Node::Stmt(*stmt)) {
            if !is_plain_read(body, local, reference) {
                return InitializerUsageStatus::Unknown;
            }
            status = InitializerUsageStatus::AtWantedPlace;
        }
    }
    status
}

/// A read that can neither change the variable nor let its value escape.
fn is_plain_read(body: &Body, local: LocalId, reference: ExprId) -> bool {
    if body.is_write(reference) || body.surrounder(Node::Expr(reference)) != body.local(local).owner
    {
        return false;
    }
    let ty = body.local_type(local);
    if ty.is_primitive() || ty.is_string() {
        return true;
    }
    match body.parent_skip_parens(reference) {
        Some(Node::Expr(parent)) => match body.expr(parent) {
            Expr::Call { receiver, name, .. } => {
                receiver.is_some_and(|r| body.skip_parens(r) == reference)
                    && READ_ONLY_METHODS.contains(&name.as_str())
            }
            Expr::Binary { op, .. } => matches!(op, BinaryOp::Eq | BinaryOp::Ne),
            _ => false,
        },
        _ => false,
    }
}
