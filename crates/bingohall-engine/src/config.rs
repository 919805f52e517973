//! Engine configuration.

use std::time::Duration;

use bingohall_protocol::RoundId;

/// Timings and policies for a [`DrawEngine`](crate::DrawEngine).
///
/// The defaults are the production values. Tests usually keep them and
/// drive time with `tokio::time::advance`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Store key of the shared round.
    pub round_id: RoundId,
    /// Time between draws while the round is started.
    pub draw_interval: Duration,
    /// How long the shuffling phase lasts before drawing starts.
    pub shuffle_delay: Duration,
    /// Cooldown between a completed round and the next cycle.
    pub restart_delay: Duration,
    /// Disconnected sessions older than this are swept.
    pub session_max_age: Duration,
    /// How often the session sweep runs.
    pub sweep_interval: Duration,
    /// Upper bound on a store read during `join`/`register_player`.
    pub store_timeout: Duration,
    /// Capacity of the engine's command channel.
    pub channel_size: usize,
    /// Clear every player's marks and win flag when a new cycle starts.
    /// Cards are never regenerated either way.
    pub reset_progress_on_new_round: bool,
    /// Seeds the draw/deal RNG. `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            round_id: RoundId::default(),
            draw_interval: Duration::from_secs(5),
            shuffle_delay: Duration::from_secs(9),
            restart_delay: Duration::from_secs(10),
            session_max_age: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
            store_timeout: Duration::from_secs(5),
            channel_size: 256,
            reset_progress_on_new_round: true,
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn with_round_id(mut self, round_id: RoundId) -> Self {
        self.round_id = round_id;
        self
    }

    pub fn with_draw_interval(mut self, interval: Duration) -> Self {
        self.draw_interval = interval;
        self
    }

    pub fn with_shuffle_delay(mut self, delay: Duration) -> Self {
        self.shuffle_delay = delay;
        self
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    pub fn with_session_max_age(mut self, max_age: Duration) -> Self {
        self.session_max_age = max_age;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_channel_size(mut self, size: usize) -> Self {
        self.channel_size = size;
        self
    }

    pub fn with_reset_progress_on_new_round(mut self, reset: bool) -> Self {
        self.reset_progress_on_new_round = reset;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}
