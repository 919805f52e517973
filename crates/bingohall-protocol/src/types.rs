//! Identity and lifecycle types shared by every layer.

use std::fmt;

use bingohall_transport::ConnectionId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's stable identity.
///
/// In production this is the Telegram user id, so it survives reconnects,
/// new devices and server restarts. It is what progress is stored under.
///
/// Serialized as a plain number: `PlayerId(42)` is `42` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player-{}", self.0)
    }
}

/// Identifies the shared round record in the store.
///
/// There is one authoritative round per process, so this is usually the
/// default id; it exists so the store can hold more than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundId(pub u64);

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "round-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RoundStatus
// ---------------------------------------------------------------------------

/// Lifecycle of the shared round.
///
/// ```text
/// Waiting ──► Shuffling ──► Started ──► Completed
///    ▲                                      │
///    └──────────── restart delay ───────────┘
/// ```
///
/// Every status except `Completed` counts as the active round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    #[default]
    Waiting,
    Shuffling,
    Started,
    Completed,
}

impl RoundStatus {
    /// The status that follows this one in the cycle.
    pub fn next(self) -> Self {
        match self {
            Self::Waiting => Self::Shuffling,
            Self::Shuffling => Self::Started,
            Self::Started => Self::Completed,
            Self::Completed => Self::Waiting,
        }
    }

    /// True while the round has not yet completed.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Completed)
    }
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::Shuffling => "shuffling",
            Self::Started => "started",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Where an outbound event should be delivered.
///
/// "Attached" connections are every socket that completed the handshake.
/// "Subscribed" connections are the ones that have joined the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every attached connection, joined or not.
    All,
    /// Every connection subscribed to the round.
    Round,
    /// Every subscribed connection except one.
    RoundExcept(ConnectionId),
    /// A single connection.
    Connection(ConnectionId),
}

// =========================================================================
// Tests
// =========================================================================
