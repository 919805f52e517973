//! # Bingo Hall
//!
//! A server for one endless, shared game of bingo.
//!
//! Every connected player sits in the same round. The server draws a
//! number every few seconds, players mark their cards, anyone who
//! completes a line wins, and the draw keeps going until all 75 numbers
//! are out. Then it pauses, reshuffles and starts over.
//!
//! This crate wires the layers together: WebSocket transport, JSON
//! events, `hello` authentication, and the engine actor that owns the
//! game.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bingohall::prelude::*;
//!
//! # async fn run() -> Result<(), BingoError> {
//! let server = ServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(DevAuthenticator, Arc::new(MemoryStore::new()))
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::BingoError;
pub use server::{BingoServer, ServerBuilder};

pub use bingohall_engine as engine;
pub use bingohall_protocol as protocol;
pub use bingohall_session as session;
pub use bingohall_tick as tick;
pub use bingohall_transport as transport;

/// Everything needed to stand up a server.
pub mod prelude {
    pub use crate::{BingoError, BingoServer, ServerBuilder};
    pub use bingohall_engine::{
        EngineConfig, EngineError, EngineHandle, JsonFileStore, MemoryStore, Store, StoreError,
    };
    pub use bingohall_protocol::{
        Card, ClientEvent, PlayerId, RoundStatus, ServerEvent, WinPattern, error_code,
    };
    pub use bingohall_session::{
        Authenticator, DevAuthenticator, Identity, SecretDerivation, SessionError,
        TelegramAuthenticator,
    };
    pub use bingohall_tick::{Clock, SystemClock};
}
