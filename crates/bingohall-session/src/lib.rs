//! Player sessions for Bingo Hall.
//!
//! Two jobs live here:
//!
//! 1. **Authentication**: turning the token from a client's `hello` frame
//!    into an [`Identity`] ([`Authenticator`] trait,
//!    [`TelegramAuthenticator`], [`DevAuthenticator`]).
//! 2. **Session tracking**: remembering which connection currently speaks
//!    for each player, telling a fresh join from a reconnect, and expiring
//!    sessions that have been gone for too long ([`SessionRegistry`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Engine (above)    ← asks "new player or reconnect?" and "who is on conn-7?"
//!     ↕
//! Session (this crate)
//!     ↕
//! Protocol (below)  ← PlayerId, ConnectionId
//! ```
//!
//! A session is never deleted when its socket drops. It is flagged
//! disconnected, so a player who comes back finds their card and marks
//! where they left them. Only [`SessionRegistry::cleanup`] removes records,
//! and only ones that have been disconnected for longer than the max age.

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod registry;
mod session;
mod telegram;

pub use auth::{Authenticator, DevAuthenticator, Identity};
pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::Session;
pub use telegram::{SecretDerivation, TelegramAuthenticator};
