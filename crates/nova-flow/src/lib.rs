//! Flow analysis over lowered bodies: loop exit points, jump targets,
//! variable usage and the position of a variable's initializer relative to
//! the statement that wants to consume it.
//!
//! Every analysis that may run long takes a cancellation callback; a
//! [`Cancelled`] result means the caller should give up on the current
//! statement.

mod exits;
mod usage;

pub use crate::exits::{
    break_target, continue_target, find_exit_points, next_return_statement, statement_breaks_loop,
};
pub use crate::usage::{initializer_usage_status, used_variables, InitializerUsageStatus};

/// Signal raised by a cancellation callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("flow analysis was cancelled")]
pub struct Cancelled;

/// Callback polled by long-running analyses.
pub type CheckCancelled<'a> = &'a mut dyn FnMut() -> Result<(), Cancelled>;

/// A callback that never cancels.
pub fn never_cancelled() -> Result<(), Cancelled> {
    Ok(())
}

#[cfg(test)]
mod tests;
