//! Error taxonomy for the event core.

use thiserror::Error;

/// Errors surfaced to callers of the core (everything else is contained and
/// reported through logs only).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown component: {0}")]
    UnknownComponent(String),
    #[error("event bus is closed")]
    BusClosed,
}

/// Convenience result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
