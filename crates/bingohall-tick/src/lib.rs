//! Timing primitives for Bingo Hall.
//!
//! Two separate notions of time are in play, and they are kept apart on
//! purpose:
//!
//! - **Scheduling time** drives *when* things happen: the draw loop, the
//!   shuffle delay, the restart cooldown. It comes from Tokio's clock, so
//!   tests can run with `#[tokio::test(start_paused = true)]` and
//!   `tokio::time::advance` and never sleep for real. [`Ticker`] lives here.
//! - **Wall time** stamps records: `createdAt` on a round, `lastSeen` on a
//!   session. It comes from a [`Clock`], so session expiry can be tested
//!   with a [`ManualClock`] instead of waiting 24 hours.

mod clock;
mod ticker;

pub use clock::{Clock, ManualClock, SystemClock, unix_millis};
pub use ticker::{MissedTickPolicy, TickInfo, Ticker, TickerConfig};
