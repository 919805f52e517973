//! Error types for the engine layer.

use bingohall_protocol::PlayerId;

use crate::StoreError;

/// Errors surfaced by the engine to its callers.
///
/// Event-driven paths (draws, marks, disconnects) never return these;
/// they log and carry on. Only startup and request/response operations do.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Loading or creating the round failed at startup.
    #[error("engine initialization failed: {0}")]
    Init(#[source] StoreError),

    /// A store read failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A store read took longer than the configured timeout.
    #[error("store timed out")]
    StoreTimeout,

    /// The player has no progress record.
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    /// The engine task has stopped or its channel is closed.
    #[error("engine is unavailable")]
    Unavailable,
}
