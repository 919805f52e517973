//! Player → connection bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bingohall_protocol::{ConnectionId, PlayerId};
use bingohall_tick::Clock;

use crate::Session;

/// Tracks which connection currently speaks for each player.
///
/// Owned by the engine task and only touched from there, so it needs no
/// locking of its own.
///
/// Two maps are kept in lockstep: `sessions` by player, and
/// `by_connection` holding only *live* bindings. When a player
/// reconnects, the old connection's entry is removed from
/// `by_connection`, which is what makes a late disconnect from the old
/// socket a no-op.
pub struct SessionRegistry {
    sessions: HashMap<PlayerId, Session>,
    by_connection: HashMap<ConnectionId, PlayerId>,
    clock: Arc<dyn Clock>,
}

impl SessionRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: HashMap::new(),
            by_connection: HashMap::new(),
            clock,
        }
    }

    /// Binds `player_id` to `connection_id`.
    ///
    /// Always rebinds and refreshes `last_seen`. Returns `true` only when
    /// the player had no session at all (a fresh join), `false` for a
    /// reconnect, including a reconnect after a disconnect.
    pub fn register(&mut self, player_id: PlayerId, connection_id: ConnectionId) -> bool {
        let now = self.clock.now();

        // The connection may have spoken for someone else before.
        if let Some(previous) = self.by_connection.insert(connection_id, player_id) {
            if previous != player_id {
                if let Some(session) = self.sessions.get_mut(&previous) {
                    session.connected = false;
                    session.last_seen = now;
                }
            }
        }

        match self.sessions.get_mut(&player_id) {
            Some(session) => {
                let old = session.connection_id;
                if old != connection_id && self.by_connection.get(&old) == Some(&player_id) {
                    self.by_connection.remove(&old);
                }
                session.connection_id = connection_id;
                session.last_seen = now;
                session.connected = true;
                tracing::debug!(%player_id, %connection_id, "session rebound");
                false
            }
            None => {
                self.sessions.insert(
                    player_id,
                    Session {
                        player_id,
                        connection_id,
                        last_seen: now,
                        connected: true,
                    },
                );
                tracing::debug!(%player_id, %connection_id, "session created");
                true
            }
        }
    }

    /// Flags the session bound to `connection_id` as disconnected.
    ///
    /// Returns the player it belonged to, or `None` when the connection is
    /// unknown or has already been replaced by a newer one. The record is
    /// kept.
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<PlayerId> {
        let player_id = self.by_connection.remove(&connection_id)?;
        let session = self.sessions.get_mut(&player_id)?;
        session.connected = false;
        session.last_seen = self.clock.now();
        tracing::debug!(%player_id, %connection_id, "session disconnected");
        Some(player_id)
    }

    pub fn is_connected(&self, player_id: PlayerId) -> bool {
        self.sessions
            .get(&player_id)
            .is_some_and(|session| session.connected)
    }

    pub fn connected_count(&self) -> usize {
        self.sessions.values().filter(|s| s.connected).count()
    }

    /// The live connection for `player_id`. `None` when disconnected.
    pub fn socket_for(&self, player_id: PlayerId) -> Option<ConnectionId> {
        self.sessions
            .get(&player_id)
            .filter(|s| s.connected)
            .map(|s| s.connection_id)
    }

    /// The player a live connection speaks for.
    pub fn player_for(&self, connection_id: ConnectionId) -> Option<PlayerId> {
        self.by_connection.get(&connection_id).copied()
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&Session> {
        self.sessions.get(&player_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drops sessions that are disconnected and were last seen more than
    /// `max_age` ago. Connected sessions are never touched, whatever their
    /// age. Returns the removed players.
    pub fn cleanup(&mut self, max_age: Duration) -> Vec<PlayerId> {
        let now = self.clock.now();
        let mut removed = Vec::new();
        self.sessions.retain(|player_id, session| {
            if session.connected {
                return true;
            }
            // A clock that stepped backwards reads as age zero.
            let age = now.duration_since(session.last_seen).unwrap_or_default();
            if age > max_age {
                removed.push(*player_id);
                false
            } else {
                true
            }
        });
        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "expired stale sessions");
        }
        removed
    }
}

// =========================================================================
// Tests
// =========================================================================
