//! The continuous shared-round bingo engine.
//!
//! One round runs forever, cycling
//! `waiting → shuffling → started → completed → (next) waiting`. While it
//! is started a number is drawn every few seconds; players join, mark
//! numbers on their cards and win, possibly several per round. Winning
//! never stops the draw. A round ends when all 75 numbers are out or the
//! host stops it.
//!
//! # Key types
//!
//! - [`DrawEngine`]: the state machine. Owns the round, every player's
//!   progress and the [`SessionRegistry`](bingohall_session::SessionRegistry).
//! - [`spawn_engine`] / [`EngineHandle`]: runs a `DrawEngine` on its own
//!   Tokio task and talks to it over a channel.
//! - [`Store`]: where rounds and players are persisted
//!   ([`MemoryStore`], [`JsonFileStore`]). Writes go through a
//!   [`Persister`] so the draw loop never waits on disk.
//! - [`Broadcaster`]: where outbound events go ([`ChannelBroadcaster`]).
//! - [`evaluate_win`] and [`deal_card`]: the pure game rules.
//!
//! # Concurrency
//!
//! Everything that mutates game state runs on the engine task, one
//! command or timer event at a time. Check-then-draw and
//! check-then-mark therefore never interleave, and nothing needs a lock.

#![allow(async_fn_in_trait)]

mod actor;
mod broadcast;
mod card;
mod config;
mod engine;
mod error;
mod model;
mod persist;
mod store;
mod win;

pub use actor::{EngineHandle, spawn_engine};
pub use broadcast::{Broadcaster, ChannelBroadcaster, Outbox};
pub use card::deal_card;
pub use config::EngineConfig;
pub use engine::{DrawEngine, DrawOutcome, MarkOutcome};
pub use error::EngineError;
pub use model::{GameRound, PlayerProgress, RoundSnapshot};
pub use persist::Persister;
pub use store::{JsonFileStore, MemoryStore, Store, StoreError};
pub use win::evaluate_win;
