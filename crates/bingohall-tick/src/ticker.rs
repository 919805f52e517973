//! A cancellable repeating timer.
//!
//! [`Ticker`] is not a task. It is a piece of state the owner polls with
//! [`Ticker::wait_for_tick`], usually as one arm of a `tokio::select!`:
//!
//! ```text
//! loop {
//!     tokio::select! {
//!         Some(cmd) = rx.recv() => handle(cmd),
//!         _ = ticker.wait_for_tick() => draw(),
//!     }
//! }
//! ```
//!
//! A stopped ticker's future never resolves, so the `select!` simply stops
//! picking that arm. Cancelling is a plain `&mut self` call from inside
//! the same loop, which is why there can never be two live timers.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// What to do when a tick fires late (the owning task was busy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissedTickPolicy {
    /// Stay on the initial grid. Slots that were missed entirely are
    /// dropped, the next tick lands on the next grid slot.
    #[default]
    Skip,
    /// Restart the grid from the moment the late tick fired.
    Delay,
}

/// Configuration for a [`Ticker`].
#[derive(Debug, Clone)]
pub struct TickerConfig {
    pub interval: Duration,
    pub policy: MissedTickPolicy,
}

impl TickerConfig {
    /// Shortest interval accepted. Anything below is clamped up.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            policy: MissedTickPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MissedTickPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Clamps the interval to [`Self::MIN_INTERVAL`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_secs_f64() * 1000.0,
                "ticker interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

/// Reported each time a tick fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// 1-based count of ticks since the ticker was created.
    pub tick: u64,
    /// How late the tick fired relative to its slot.
    pub late_by: Duration,
    /// Whole slots dropped because of lateness.
    pub ticks_skipped: u64,
}

/// A repeating timer that can be started and cancelled from its owner's
/// event loop.
#[derive(Debug)]
pub struct Ticker {
    config: TickerConfig,
    next_tick: Option<Instant>,
    tick_count: u64,
}

impl Ticker {
    /// Creates a stopped ticker.
    pub fn new(config: TickerConfig) -> Self {
        let config = config.validated();
        debug!(
            interval_ms = config.interval.as_millis() as u64,
            policy = ?config.policy,
            "ticker created"
        );
        Self {
            config,
            next_tick: None,
            tick_count: 0,
        }
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self::new(TickerConfig::new(interval))
    }

    /// Starts ticking; the first tick fires one interval from now.
    /// Restarting a running ticker resets its schedule.
    pub fn start(&mut self) {
        self.next_tick = Some(Instant::now() + self.config.interval);
        trace!("ticker started");
    }

    /// Starts ticking with the first tick due immediately.
    pub fn start_immediately(&mut self) {
        self.next_tick = Some(Instant::now());
        trace!("ticker started (immediate)");
    }

    /// Stops the ticker. Idempotent.
    pub fn cancel(&mut self) {
        if self.next_tick.take().is_some() {
            trace!(tick = self.tick_count, "ticker cancelled");
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// When the next tick is due, if running.
    pub fn deadline(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Waits for the next tick. Pends forever while stopped.
    ///
    /// Cancel-safe: if the future is dropped before it resolves, no state
    /// has changed and the same slot is still pending.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let Some(scheduled) = self.next_tick else {
            return std::future::pending().await;
        };

        time::sleep_until(scheduled).await;

        let now = Instant::now();
        let interval = self.config.interval;
        let late_by = now.saturating_duration_since(scheduled);
        let missed = (late_by.as_nanos() / interval.as_nanos()) as u64;
        self.tick_count += 1;

        let (next, ticks_skipped) = match self.config.policy {
            MissedTickPolicy::Skip => {
                let slots = u32::try_from(missed + 1).unwrap_or(u32::MAX);
                (scheduled + interval.saturating_mul(slots), missed)
            }
            MissedTickPolicy::Delay => (now + interval, 0),
        };
        self.next_tick = Some(next);

        if missed > 0 {
            warn!(
                tick = self.tick_count,
                late_ms = late_by.as_secs_f64() * 1000.0,
                missed,
                policy = ?self.config.policy,
                "ticker fell behind"
            );
        }
        trace!(tick = self.tick_count, "tick fired");

        TickInfo {
            tick: self.tick_count,
            late_by,
            ticks_skipped,
        }
    }
}
