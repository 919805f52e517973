//! The round state machine.
//!
//! [`DrawEngine`] is plain owned state with `&mut self` methods. It never
//! spawns a timer of its own: the repeating draw lives in a [`Ticker`] and
//! the one-shot phase transitions (shuffle → started, completed → next
//! cycle) are a single pending deadline. Whoever owns the engine (the
//! actor in `actor.rs`, or a test) waits on both and calls back in. That
//! keeps every state change on one task and makes every timer observable.
//!
//! ```text
//!            initialize
//!                │
//!                ▼
//!   ┌──► Shuffling ──(shuffle_delay)──► Started ──(75th draw / stop)──► Completed
//!   │                                                                      │
//!   └───────────────────────────(restart_delay)────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;

use bingohall_protocol::{
    Card, ConnectionId, MAX_NUMBER, PlayerId, Recipient, RoundStatus, ServerEvent, WinPattern,
};
use bingohall_session::SessionRegistry;
use bingohall_tick::{Clock, TickInfo, Ticker, TickerConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    Broadcaster, EngineConfig, EngineError, GameRound, Persister, PlayerProgress, RoundSnapshot,
    Store, deal_card, evaluate_win,
};

/// What one draw tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// A number was drawn and the round keeps going.
    Drawn { number: u8, total_called: usize },
    /// The 75th number was drawn; the round completed in the same step.
    DrawnFinal { number: u8 },
    /// Nothing was left to draw, so the round was completed instead.
    Exhausted,
    /// The round is not started. The ticker has been cancelled.
    Idle,
}

impl DrawOutcome {
    pub fn number(&self) -> Option<u8> {
        match self {
            Self::Drawn { number, .. } | Self::DrawnFinal { number } => Some(*number),
            Self::Exhausted | Self::Idle => None,
        }
    }
}

/// What a mark did. Everything except `Marked` and `Won` is a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Marked,
    /// The mark completed a pattern; carries the one that was announced.
    Won(WinPattern),
    AlreadyWon,
    AlreadyMarked,
    OutOfRange,
    UnknownPlayer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    BeginDrawing,
    NewCycle,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    phase: Phase,
    at: Instant,
}

/// Owns the shared round and everyone's progress on it.
pub struct DrawEngine<S: Store, B: Broadcaster> {
    config: EngineConfig,
    round: GameRound,
    players: HashMap<PlayerId, PlayerProgress>,
    /// Players in memory without a session (registered but never joined),
    /// with when they were last asked for.
    unjoined: HashMap<PlayerId, SystemTime>,
    sessions: SessionRegistry,
    store: Arc<S>,
    persister: Persister,
    broadcaster: B,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    ticker: Ticker,
    pending: Option<Pending>,
}

impl<S: Store, B: Broadcaster> DrawEngine<S, B> {
    /// Builds an engine around a placeholder `Waiting` round. Call
    /// [`initialize`](Self::initialize) before anything else.
    ///
    /// Spawns the persistence task, so this must run inside a Tokio
    /// runtime.
    pub fn new(config: EngineConfig, store: Arc<S>, broadcaster: B, clock: Arc<dyn Clock>) -> Self {
        let (persister, _task) = Persister::spawn(Arc::clone(&store));
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            round: GameRound::new(config.round_id, clock.now()),
            players: HashMap::new(),
            unjoined: HashMap::new(),
            sessions: SessionRegistry::new(Arc::clone(&clock)),
            store,
            persister,
            broadcaster,
            ticker: Ticker::new(TickerConfig::new(config.draw_interval)),
            clock,
            rng,
            pending: None,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Loads the persisted round, or creates one, and gets it moving.
    ///
    /// A `Started` round resumes drawing where it left off; anything else
    /// starts a fresh cycle.
    ///
    /// # Errors
    /// [`EngineError::Init`] or [`EngineError::StoreTimeout`] if the store
    /// can't be read or the new round can't be written. This is the only
    /// fatal failure the engine has.
    pub async fn initialize(&mut self) -> Result<(), EngineError> {
        let round_id = self.config.round_id;
        let loaded = tokio::time::timeout(self.config.store_timeout, self.store.find_round(round_id))
            .await
            .map_err(|_| EngineError::StoreTimeout)?
            .map_err(EngineError::Init)?;

        match loaded {
            Some(mut round) => {
                let dropped = round.sanitize();
                if dropped > 0 {
                    warn!(%round_id, dropped, "discarded invalid draws from stored round");
                }
                round.id = round_id;
                info!(
                    %round_id,
                    status = %round.status,
                    drawn = round.drawn_numbers.len(),
                    cycle = round.cycle,
                    "loaded round"
                );
                self.round = round;
                if self.round.status == RoundStatus::Started {
                    self.resume_drawing();
                } else {
                    self.start_cycle();
                }
            }
            None => {
                self.round = GameRound::new(round_id, self.clock.now());
                self.store
                    .save_round(&self.round)
                    .await
                    .map_err(EngineError::Init)?;
                info!(%round_id, "created round");
                self.start_cycle();
            }
        }
        Ok(())
    }

    /// Starts a new cycle: clears the draws, enters `Shuffling` and
    /// schedules drawing to begin after the shuffle delay.
    pub fn start_cycle(&mut self) {
        self.ticker.cancel();
        self.round.reset_draws();
        self.round.cycle += 1;
        self.round.created_at = self.clock.now();
        let cycle = self.round.cycle;

        if self.config.reset_progress_on_new_round {
            for progress in self.players.values_mut() {
                progress.reset_for_cycle(cycle);
                self.persister.save_player(progress.clone());
            }
        }

        self.set_status(RoundStatus::Shuffling);
        self.schedule(Phase::BeginDrawing, self.config.shuffle_delay);
        info!(round_id = %self.round.id, cycle, "new cycle, shuffling");
    }

    /// Flips to `Started` and starts the draw loop. The first number is
    /// drawn right away when none have been drawn yet.
    pub fn begin_drawing(&mut self) {
        self.pending = None;
        self.set_status(RoundStatus::Started);
        info!(round_id = %self.round.id, cycle = self.round.cycle, "round started");
        self.resume_drawing();
    }

    fn resume_drawing(&mut self) {
        if self.round.is_exhausted() {
            self.complete_round();
            return;
        }
        self.ticker.start();
        if self.round.drawn_numbers.is_empty() {
            self.draw_tick();
        }
    }

    /// One tick of the draw loop.
    ///
    /// Outside `Started` this cancels the ticker and does nothing else.
    /// Otherwise it draws uniformly from the undrawn numbers, persists,
    /// broadcasts `number_called` and, on the 75th number, completes the
    /// round in the same step.
    pub fn draw_tick(&mut self) -> DrawOutcome {
        if self.round.status != RoundStatus::Started {
            self.ticker.cancel();
            debug!(status = %self.round.status, "draw skipped, round not started");
            return DrawOutcome::Idle;
        }

        let remaining = self.round.remaining();
        if remaining.is_empty() {
            self.complete_round();
            return DrawOutcome::Exhausted;
        }

        let number = remaining[self.rng.random_range(0..remaining.len())];
        let total_called = self.round.record_draw(number);
        self.persister.save_round(self.round.clone());
        self.broadcaster.publish(
            Recipient::All,
            ServerEvent::NumberCalled {
                number,
                total_called,
            },
        );
        info!(number, total_called, "number drawn");

        if self.round.is_exhausted() {
            self.complete_round();
            DrawOutcome::DrawnFinal { number }
        } else {
            DrawOutcome::Drawn {
                number,
                total_called,
            }
        }
    }

    /// Ends the round and schedules the next cycle. Returns `false` (and
    /// does nothing) if the round is already completed.
    pub fn complete_round(&mut self) -> bool {
        if self.round.status == RoundStatus::Completed {
            debug!("round already completed");
            return false;
        }
        self.ticker.cancel();
        self.set_status(RoundStatus::Completed);
        self.schedule(Phase::NewCycle, self.config.restart_delay);
        info!(
            round_id = %self.round.id,
            cycle = self.round.cycle,
            drawn = self.round.drawn_numbers.len(),
            "round completed"
        );
        true
    }

    /// Draws one number now, outside the timer. Same rules as a tick.
    pub fn call_number(&mut self) -> Option<u8> {
        let outcome = self.draw_tick();
        debug!(?outcome, "manual draw");
        outcome.number()
    }

    /// Host stop: completes the round early.
    pub fn stop_round(&mut self) -> bool {
        let stopped = self.complete_round();
        if stopped {
            info!("round stopped by host");
        }
        stopped
    }

    /// Cancels every timer and waits for queued writes to land.
    pub async fn shutdown(&mut self) {
        self.ticker.cancel();
        self.pending = None;
        self.persister.flush().await;
        info!(round_id = %self.round.id, "engine shut down");
    }

    // -----------------------------------------------------------------------
    // Players
    // -----------------------------------------------------------------------

    /// Puts `player_id` on `connection_id` and into the round.
    ///
    /// The joining connection gets a `game_state_update` and its own
    /// `player_progress`. Everyone else hears `player_joined`, but only the
    /// first time; reconnects are silent. A previous connection of the same
    /// player stops receiving round events.
    ///
    /// Returns whether this was a fresh join.
    ///
    /// # Errors
    /// A store failure or timeout while loading the player.
    pub async fn join(
        &mut self,
        connection_id: ConnectionId,
        player_id: PlayerId,
        name: &str,
    ) -> Result<bool, EngineError> {
        self.ensure_loaded(player_id, name).await?;
        self.join_loaded(connection_id, player_id, name)
    }

    /// The second half of [`join`](Self::join), for a player that is
    /// already in memory.
    ///
    /// # Errors
    /// [`EngineError::PlayerNotFound`] if the player was never loaded.
    pub fn join_loaded(
        &mut self,
        connection_id: ConnectionId,
        player_id: PlayerId,
        name: &str,
    ) -> Result<bool, EngineError> {
        self.rename(player_id, name)?;
        self.unjoined.remove(&player_id);

        if let Some(previous) = self.sessions.socket_for(player_id) {
            if previous != connection_id {
                self.broadcaster.unsubscribe(previous);
                debug!(%player_id, %previous, "replaced previous connection");
            }
        }
        let is_new = self.sessions.register(player_id, connection_id);
        self.broadcaster.subscribe(connection_id);

        let progress = self
            .players
            .get_mut(&player_id)
            .ok_or(EngineError::PlayerNotFound(player_id))?;
        progress.connection_id = Some(connection_id);
        let progress_event = progress.to_event();
        let player_name = progress.name.clone();

        let target = Recipient::Connection(connection_id);
        self.broadcaster.publish(target, self.snapshot().to_event());
        self.broadcaster.publish(target, progress_event);

        if is_new {
            self.broadcaster.publish(
                Recipient::RoundExcept(connection_id),
                ServerEvent::PlayerJoined {
                    player_id,
                    player_name,
                },
            );
            info!(%player_id, %connection_id, "player joined");
        } else {
            info!(%player_id, %connection_id, "player rejoined");
        }
        Ok(is_new)
    }

    /// Returns the player's card, creating the player if needed, and sends
    /// `player_registered` to the asking connection.
    ///
    /// # Errors
    /// A store failure or timeout while loading the player.
    pub async fn register_player(
        &mut self,
        connection_id: ConnectionId,
        player_id: PlayerId,
        name: &str,
    ) -> Result<Card, EngineError> {
        self.ensure_loaded(player_id, name).await?;
        self.register_loaded(connection_id, player_id, name)
    }

    /// The second half of [`register_player`](Self::register_player), for
    /// a player that is already in memory.
    ///
    /// # Errors
    /// [`EngineError::PlayerNotFound`] if the player was never loaded.
    pub fn register_loaded(
        &mut self,
        connection_id: ConnectionId,
        player_id: PlayerId,
        name: &str,
    ) -> Result<Card, EngineError> {
        self.rename(player_id, name)?;
        let now = self.clock.now();
        if let Some(since) = self.unjoined.get_mut(&player_id) {
            *since = now;
        }
        let card = self
            .players
            .get(&player_id)
            .map(|p| p.card.clone())
            .ok_or(EngineError::PlayerNotFound(player_id))?;
        self.broadcaster.publish(
            Recipient::Connection(connection_id),
            ServerEvent::PlayerRegistered {
                player_id,
                player_card: card.clone(),
            },
        );
        debug!(%player_id, "player registered");
        Ok(card)
    }

    /// Marks `number` on the player's card.
    ///
    /// No-op for numbers outside 1–75, unknown players, repeats, and
    /// players who already won. Otherwise persists the mark, broadcasts
    /// `player_marked` and, if the mark completes a pattern, sets the win
    /// flag and broadcasts `player_won` with the first pattern.
    pub fn mark(&mut self, player_id: PlayerId, number: u8) -> MarkOutcome {
        if !(1..=MAX_NUMBER).contains(&number) {
            debug!(%player_id, number, "mark out of range, ignored");
            return MarkOutcome::OutOfRange;
        }
        let known_session = self.sessions.get(player_id).is_some();
        let Some(progress) = self.players.get_mut(&player_id).filter(|_| known_session) else {
            debug!(%player_id, number, "mark from unknown player, ignored");
            return MarkOutcome::UnknownPlayer;
        };
        if progress.has_won {
            debug!(%player_id, number, "mark after win, ignored");
            return MarkOutcome::AlreadyWon;
        }
        if !progress.marked_numbers.insert(number) {
            debug!(%player_id, number, "duplicate mark, ignored");
            return MarkOutcome::AlreadyMarked;
        }

        self.persister.update_marks(player_id, number);
        let covered = progress.covered(&self.round.drawn_numbers);
        let winning_line = evaluate_win(&progress.card, &covered).into_iter().next();

        self.broadcaster
            .publish(Recipient::Round, ServerEvent::PlayerMarked { player_id, number });

        match winning_line {
            Some(winning_line) => {
                progress.has_won = true;
                self.persister.save_player(progress.clone());
                self.broadcaster.publish(
                    Recipient::Round,
                    ServerEvent::PlayerWon {
                        player_id,
                        winning_line,
                    },
                );
                info!(%player_id, ?winning_line, "player won");
                MarkOutcome::Won(winning_line)
            }
            None => MarkOutcome::Marked,
        }
    }

    /// The connection went away. Its session is flagged disconnected but
    /// kept, and the player's progress stays in memory.
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<PlayerId> {
        self.broadcaster.unsubscribe(connection_id);
        let player_id = self.sessions.disconnect(connection_id)?;
        if let Some(progress) = self.players.get_mut(&player_id) {
            if progress.connection_id == Some(connection_id) {
                progress.connection_id = None;
            }
        }
        info!(%player_id, %connection_id, "player disconnected");
        Some(player_id)
    }

    /// Expires old disconnected sessions and evicts their progress from
    /// memory, along with players who registered but have not joined
    /// within `session_max_age`. The stored record stays and is reloaded
    /// on the next join.
    pub fn sweep(&mut self) -> Vec<PlayerId> {
        let max_age = self.config.session_max_age;
        let now = self.clock.now();
        let mut removed = self.sessions.cleanup(max_age);
        self.unjoined.retain(|player_id, since| {
            let age = now.duration_since(*since).unwrap_or_default();
            if age > max_age {
                removed.push(*player_id);
                false
            } else {
                true
            }
        });
        for player_id in &removed {
            if let Some(progress) = self.players.remove(player_id) {
                self.persister.save_player(progress);
            }
        }
        if !removed.is_empty() {
            info!(evicted = removed.len(), "evicted stale players");
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            round_id: self.round.id,
            status: self.round.status,
            drawn_numbers: self.round.drawn_numbers.clone(),
            current_number: self.round.current_number,
            cycle: self.round.cycle,
            connected_players: self.sessions.connected_count(),
        }
    }

    pub fn round(&self) -> &GameRound {
        &self.round
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&PlayerProgress> {
        self.players.get(&player_id)
    }

    /// Whether the player's progress is in memory.
    pub fn is_loaded(&self, player_id: PlayerId) -> bool {
        self.players.contains_key(&player_id)
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn is_drawing(&self) -> bool {
        self.ticker.is_running()
    }

    /// Waits until every write queued so far has reached the store.
    pub async fn flush(&self) {
        self.persister.flush().await;
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    /// Resolves on the next draw tick; pends forever while not drawing.
    /// Cancel-safe.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        self.ticker.wait_for_tick().await
    }

    /// When the pending phase transition is due, if one is scheduled.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.at)
    }

    /// Runs the pending phase transition if its deadline has passed.
    pub fn fire_due(&mut self) {
        let Some(pending) = self.pending else {
            return;
        };
        if Instant::now() < pending.at {
            return;
        }
        self.pending = None;
        match pending.phase {
            Phase::BeginDrawing => self.begin_drawing(),
            Phase::NewCycle => self.start_cycle(),
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn set_status(&mut self, status: RoundStatus) {
        self.round.status = status;
        self.persister.save_round(self.round.clone());
        self.broadcaster
            .publish(Recipient::All, ServerEvent::GameStatusChange { status });
    }

    fn schedule(&mut self, phase: Phase, after: std::time::Duration) {
        self.pending = Some(Pending {
            phase,
            at: Instant::now() + after,
        });
    }

    async fn ensure_loaded(&mut self, player_id: PlayerId, name: &str) -> Result<(), EngineError> {
        if !self.is_loaded(player_id) {
            let loaded = self.load_player(player_id).await?;
            self.admit_player(player_id, name, loaded);
        }
        Ok(())
    }

    /// Reads a player from the store without touching the engine.
    ///
    /// The returned future owns everything it needs, so the actor can run
    /// it on another task while draws continue. Writes already queued are
    /// flushed first so the read sees them. Bounded by `store_timeout`.
    pub fn load_player(
        &self,
        player_id: PlayerId,
    ) -> impl Future<Output = Result<Option<PlayerProgress>, EngineError>> + Send + 'static {
        let store = Arc::clone(&self.store);
        let persister = self.persister.clone();
        let limit = self.config.store_timeout;
        async move {
            let read = async {
                persister.flush().await;
                store.find_player(player_id).await
            };
            tokio::time::timeout(limit, read)
                .await
                .map_err(|_| EngineError::StoreTimeout)?
                .map_err(EngineError::from)
        }
    }

    /// Puts the result of [`load_player`](Self::load_player) into memory,
    /// dealing a new card when nothing was stored. Does nothing if the
    /// player is already loaded.
    pub fn admit_player(&mut self, player_id: PlayerId, name: &str, loaded: Option<PlayerProgress>) {
        if self.is_loaded(player_id) {
            return;
        }
        let mut dirty = false;
        let progress = match loaded {
            Some(mut progress) => {
                progress.connection_id = None;
                if progress.cycle != self.round.cycle && self.config.reset_progress_on_new_round {
                    progress.reset_for_cycle(self.round.cycle);
                    dirty = true;
                }
                debug!(%player_id, "loaded player");
                progress
            }
            None => {
                dirty = true;
                let card = deal_card(&mut self.rng);
                debug!(%player_id, "dealt new card");
                PlayerProgress::new(player_id, name.to_string(), card, self.round.cycle)
            }
        };
        if dirty {
            self.persister.save_player(progress.clone());
        }
        if self.sessions.get(player_id).is_none() {
            self.unjoined.insert(player_id, self.clock.now());
        }
        self.players.insert(player_id, progress);
    }

    /// A non-empty `name` replaces the stored one.
    fn rename(&mut self, player_id: PlayerId, name: &str) -> Result<(), EngineError> {
        let progress = self
            .players
            .get_mut(&player_id)
            .ok_or(EngineError::PlayerNotFound(player_id))?;
        if !name.is_empty() && progress.name != name {
            progress.name = name.to_string();
            self.persister.save_player(progress.clone());
        }
        Ok(())
    }
}
