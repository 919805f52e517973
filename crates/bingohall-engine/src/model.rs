//! Round and player records.
//!
//! Both are what the [`Store`](crate::Store) persists, so they derive
//! serde with camelCase fields.

use std::collections::{BTreeSet, HashSet};
use std::time::SystemTime;

use bingohall_protocol::{
    Card, ConnectionId, MAX_NUMBER, PlayerId, RoundId, RoundStatus, ServerEvent,
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// GameRound
// ---------------------------------------------------------------------------

/// The shared round.
///
/// `drawn_numbers` is kept in draw order, holds no duplicates and never
/// grows past 75 entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRound {
    pub id: RoundId,
    pub status: RoundStatus,
    pub drawn_numbers: Vec<u8>,
    pub current_number: Option<u8>,
    pub created_at: SystemTime,
    /// Bumped every time a new cycle starts.
    #[serde(default)]
    pub cycle: u64,
}

impl GameRound {
    /// A fresh round in `Waiting`.
    pub fn new(id: RoundId, created_at: SystemTime) -> Self {
        Self {
            id,
            status: RoundStatus::Waiting,
            drawn_numbers: Vec::new(),
            current_number: None,
            created_at,
            cycle: 0,
        }
    }

    pub fn is_drawn(&self, number: u8) -> bool {
        self.drawn_numbers.contains(&number)
    }

    /// Undrawn numbers, ascending.
    pub fn remaining(&self) -> Vec<u8> {
        (1..=MAX_NUMBER).filter(|n| !self.is_drawn(*n)).collect()
    }

    /// True once every number has been drawn.
    pub fn is_exhausted(&self) -> bool {
        self.drawn_numbers.len() >= usize::from(MAX_NUMBER)
    }

    /// Appends a draw and returns the new total.
    pub(crate) fn record_draw(&mut self, number: u8) -> usize {
        debug_assert!(!self.is_drawn(number), "{number} drawn twice");
        self.drawn_numbers.push(number);
        self.current_number = Some(number);
        self.drawn_numbers.len()
    }

    /// Clears the draw state for a new cycle.
    pub(crate) fn reset_draws(&mut self) {
        self.drawn_numbers.clear();
        self.current_number = None;
    }

    /// Drops out-of-range and repeated draws (first occurrence wins) and
    /// re-points `current_number` at the last survivor. Returns how many
    /// entries were dropped.
    pub fn sanitize(&mut self) -> usize {
        let before = self.drawn_numbers.len();
        let mut seen = HashSet::new();
        self.drawn_numbers
            .retain(|n| (1..=MAX_NUMBER).contains(n) && seen.insert(*n));
        let dropped = before - self.drawn_numbers.len();
        if dropped > 0 || self.current_number.is_some_and(|n| !self.is_drawn(n)) {
            self.current_number = self.drawn_numbers.last().copied();
        }
        dropped
    }
}

// ---------------------------------------------------------------------------
// PlayerProgress
// ---------------------------------------------------------------------------

/// A player's card and where they are on it.
///
/// Created on first join or registration and kept across rounds. The card
/// is dealt once and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProgress {
    pub player_id: PlayerId,
    #[serde(default)]
    pub name: String,
    pub card: Card,
    pub marked_numbers: BTreeSet<u8>,
    pub has_won: bool,
    /// The round cycle `marked_numbers` and `has_won` belong to.
    #[serde(default)]
    pub cycle: u64,
    /// Runtime only.
    #[serde(skip)]
    pub connection_id: Option<ConnectionId>,
}

impl PlayerProgress {
    pub fn new(player_id: PlayerId, name: String, card: Card, cycle: u64) -> Self {
        Self {
            player_id,
            name,
            card,
            marked_numbers: BTreeSet::new(),
            has_won: false,
            cycle,
            connection_id: None,
        }
    }

    /// Clears marks and the win flag and moves to `cycle`.
    pub(crate) fn reset_for_cycle(&mut self, cycle: u64) {
        self.marked_numbers.clear();
        self.has_won = false;
        self.cycle = cycle;
    }

    /// `drawn ∪ marked`: what counts as covered on this player's card.
    pub fn covered(&self, drawn: &[u8]) -> HashSet<u8> {
        drawn
            .iter()
            .copied()
            .chain(self.marked_numbers.iter().copied())
            .collect()
    }

    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::PlayerProgress {
            player_id: self.player_id,
            card: self.card.clone(),
            marked_numbers: self.marked_numbers.iter().copied().collect(),
            has_won: self.has_won,
        }
    }
}

// ---------------------------------------------------------------------------
// RoundSnapshot
// ---------------------------------------------------------------------------

/// Read-only view of the round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSnapshot {
    pub round_id: RoundId,
    pub status: RoundStatus,
    pub drawn_numbers: Vec<u8>,
    pub current_number: Option<u8>,
    pub cycle: u64,
    pub connected_players: usize,
}

impl RoundSnapshot {
    /// The `game_state_update` a joining client receives.
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::GameStateUpdate {
            status: self.status,
            called_numbers: self.drawn_numbers.clone(),
            current_number: self.current_number,
        }
    }
}
