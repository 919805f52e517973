//! The per-player session record.

use std::time::SystemTime;

use bingohall_protocol::{ConnectionId, PlayerId};

/// Which connection currently represents a player, and since when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub player_id: PlayerId,
    /// The most recent connection. Still set after a disconnect so logs
    /// can tell which socket went away.
    pub connection_id: ConnectionId,
    /// Refreshed on register and on disconnect.
    pub last_seen: SystemTime,
    pub connected: bool,
}
