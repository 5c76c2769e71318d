//! High-level intermediate representation (HIR) for Java member bodies.
//!
//! Bodies are lowered from the syntax tree into arenas of statements,
//! expressions and locals. Simple names are resolved to locals during
//! lowering; anything else (fields, types, packages) stays an unresolved
//! [`hir::Expr::Name`]. The query methods in [`queries`] answer the questions
//! loop analysis asks about a body: references, writes, types, constants and
//! side effects.

pub mod hir;
mod lowering;
pub mod queries;

pub use hir::{
    AssignOp, BinaryOp, Body, CatchClause, Expr, ExprId, LambdaBody, LiteralKind, Local, LocalId,
    LocalKind, Node, Stmt, StmtId, SwitchGroup, UnaryOp,
};
pub use lowering::lower_bodies;
pub use queries::{lower_file, LoweredFile};

#[cfg(test)]
mod tests;
