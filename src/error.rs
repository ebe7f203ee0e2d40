//! Caro Engine - Error taxonomy
//!
//! `Cancelled` deliberately has no variant here: cancellation is an internal
//! cooperative signal and the external API never raises it to the caller.

use crate::types::Pos;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("illegal move at ({0}, {1}): {2}", .pos.x, .pos.y, .reason)]
    IllegalMove { pos: Pos, reason: &'static str },

    #[error("no legal move available")]
    NoLegalMove,

    #[error("no move history to undo")]
    NoHistory,

    #[error("invariant violated: {0}")]
    InvariantViolation(&'static str),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Raises an `InvariantViolation`, logging it as a bug before returning it.
#[inline]
pub fn invariant_violation(msg: &'static str) -> EngineError {
    tracing::error!(target: "caro_engine::invariant", message = msg, "invariant violation");
    EngineError::InvariantViolation(msg)
}
