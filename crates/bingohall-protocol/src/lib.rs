//! Wire protocol for Bingo Hall.
//!
//! Everything that crosses the socket lives here:
//!
//! - **Ids and status** ([`PlayerId`], [`RoundId`], [`RoundStatus`]).
//! - **Cards** ([`Card`], [`Cell`]) and the [`WinPattern`]s a card can
//!   satisfy.
//! - **Events** ([`ClientEvent`] inbound, [`ServerEvent`] outbound) and the
//!   [`Recipient`] that says where an outbound event goes.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]).
//!
//! Every frame is a JSON object of the form
//! `{"event": "<snake_case name>", "data": {...}}` with camelCase fields:
//!
//! ```text
//! {"event":"number_called","data":{"number":42,"totalCalled":7}}
//! ```
//!
//! The crate knows nothing about timers, sessions or sockets. It only
//! defines shapes and checks that a card is well formed.

mod card;
mod codec;
mod error;
mod event;
mod types;

pub use bingohall_transport::ConnectionId;
pub use card::{CARD_SIZE, Card, Cell, DiagonalDirection, MAX_NUMBER, WinPattern, column_range};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use event::{ClientEvent, ServerEvent, error_code};
pub use types::{PlayerId, Recipient, RoundId, RoundStatus};
