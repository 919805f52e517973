//! Unified error type for the Bingo Hall server.

use bingohall_engine::{EngineError, StoreError};
use bingohall_protocol::ProtocolError;
use bingohall_session::SessionError;
use bingohall_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BingoError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, bad handshake).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The `hello` token was rejected.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The engine failed to start or has stopped.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Opening the record store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
