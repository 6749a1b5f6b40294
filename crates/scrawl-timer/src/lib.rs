//! Per-room deadline countdowns for Scrawl.
//!
//! A [`Countdown`] runs at most one countdown at a time. Starting a new one
//! supersedes whatever was running, and cancelling is always safe. While
//! active it yields [`CountdownEvent::Tick`] every `tick_interval` and
//! exactly one [`CountdownEvent::Expired`] once the deadline passes.
//!
//! Remaining time is always derived from the wall-clock deadline, never by
//! decrementing a counter, so a late tick reports the true remaining time
//! instead of drifting.
//!
//! # Integration
//!
//! The countdown is owned by the room it times and polled from the room
//! actor's `tokio::select!` loop, so expiry is handled on the same task as
//! player actions:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         event = countdown.wait() => { /* tick or expiry */ }
//!     }
//! }
//! ```

use std::fmt;
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a [`Countdown`].
#[derive(Debug, Clone)]
pub struct CountdownConfig {
    /// How often an active countdown reports its remaining time.
    pub tick_interval: Duration,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(250),
        }
    }
}

impl CountdownConfig {
    /// Shortest accepted tick interval.
    pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(10);
    /// Longest accepted tick interval.
    pub const MAX_TICK_INTERVAL: Duration = Duration::from_secs(5);

    /// Creates a config with the given tick interval.
    pub fn with_tick_interval(tick_interval: Duration) -> Self {
        Self { tick_interval }
    }

    /// Clamps the tick interval into
    /// [`MIN_TICK_INTERVAL`](Self::MIN_TICK_INTERVAL)..=[`MAX_TICK_INTERVAL`](Self::MAX_TICK_INTERVAL).
    ///
    /// Called automatically by [`Countdown::new`].
    pub fn validated(mut self) -> Self {
        let clamped = self
            .tick_interval
            .clamp(Self::MIN_TICK_INTERVAL, Self::MAX_TICK_INTERVAL);
        if clamped != self.tick_interval {
            warn!(
                requested_ms = self.tick_interval.as_millis() as u64,
                clamped_ms = clamped.as_millis() as u64,
                "tick_interval out of range, clamping"
            );
            self.tick_interval = clamped;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Identifies one started countdown. A fresh id is issued by every
/// [`Countdown::start`], so stale ids never match the running countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CountdownId(u64);

impl fmt::Display for CountdownId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cd-{}", self.0)
    }
}

/// What an active countdown produced, returned by [`Countdown::wait`].
#[derive(Debug, Clone, PartialEq)]
pub enum CountdownEvent<P> {
    /// Periodic progress report.
    Tick {
        id: CountdownId,
        phase: P,
        remaining: Duration,
        elapsed: Duration,
        total: Duration,
    },
    /// The deadline passed. The countdown has already cleared itself.
    Expired {
        id: CountdownId,
        phase: P,
        total: Duration,
    },
}

impl<P: Copy> CountdownEvent<P> {
    /// The phase the countdown was started for.
    pub fn phase(&self) -> P {
        match self {
            Self::Tick { phase, .. } | Self::Expired { phase, .. } => *phase,
        }
    }

    /// The id of the countdown that produced this event.
    pub fn id(&self) -> CountdownId {
        match self {
            Self::Tick { id, .. } | Self::Expired { id, .. } => *id,
        }
    }

    /// Remaining whole seconds, rounded up (0 on expiry).
    pub fn remaining_secs(&self) -> u64 {
        match self {
            Self::Tick { remaining, .. } => ceil_secs(*remaining),
            Self::Expired { .. } => 0,
        }
    }
}

/// Rounds a duration up to whole seconds, so "0.2 s left" displays as 1.
pub fn ceil_secs(d: Duration) -> u64 {
    let millis = d.as_millis() as u64;
    millis.div_ceil(1000)
}

// ---------------------------------------------------------------------------
// Countdown
// ---------------------------------------------------------------------------

struct Active<P> {
    id: CountdownId,
    phase: P,
    started: Instant,
    deadline: Instant,
    total: Duration,
    next_tick: Instant,
}

/// A single-flight countdown, generic over the phase tag `P` it carries.
pub struct Countdown<P> {
    config: CountdownConfig,
    active: Option<Active<P>>,
    next_id: u64,
}

impl<P: Copy + fmt::Debug> Countdown<P> {
    /// Creates an idle countdown.
    pub fn new(config: CountdownConfig) -> Self {
        Self {
            config: config.validated(),
            active: None,
            next_id: 1,
        }
    }

    /// Creates an idle countdown with the given tick interval.
    pub fn with_tick_interval(tick_interval: Duration) -> Self {
        Self::new(CountdownConfig::with_tick_interval(tick_interval))
    }

    /// Starts a countdown of `duration` for `phase`, superseding any
    /// countdown that was already running.
    pub fn start(&mut self, phase: P, duration: Duration) -> CountdownId {
        if let Some(prev) = self.active.take() {
            debug!(id = %prev.id, phase = ?prev.phase, "countdown superseded");
        }

        let id = CountdownId(self.next_id);
        self.next_id += 1;

        let now = Instant::now();
        self.active = Some(Active {
            id,
            phase,
            started: now,
            deadline: now + duration,
            total: duration,
            next_tick: now + self.config.tick_interval,
        });
        debug!(%id, ?phase, secs = duration.as_secs_f64(), "countdown started");
        id
    }

    /// Stops the running countdown, if any. Returns `true` if one was
    /// running. No tick or expiry is reported for it afterwards.
    pub fn cancel(&mut self) -> bool {
        match self.active.take() {
            Some(prev) => {
                debug!(id = %prev.id, phase = ?prev.phase, "countdown cancelled");
                true
            }
            None => false,
        }
    }

    /// Waits for the next tick or the expiry of the running countdown.
    ///
    /// Pends forever while no countdown is active, so it is safe to poll
    /// from `tokio::select!` unconditionally. Cancel-safe: state is only
    /// touched after the sleep completes, so dropping the future loses
    /// nothing.
    pub async fn wait(&mut self) -> CountdownEvent<P> {
        let wake = match &self.active {
            Some(active) => active.next_tick.min(active.deadline),
            None => return std::future::pending().await,
        };

        time::sleep_until(wake).await;

        let now = Instant::now();
        let Some(active) = self.active.as_mut() else {
            return std::future::pending().await;
        };

        let remaining = active.deadline.saturating_duration_since(now);
        if remaining.is_zero() {
            let Some(done) = self.active.take() else {
                return std::future::pending().await;
            };
            debug!(id = %done.id, phase = ?done.phase, "countdown expired");
            return CountdownEvent::Expired {
                id: done.id,
                phase: done.phase,
                total: done.total,
            };
        }

        // Schedule from now rather than from the missed tick so a slow
        // wake-up never produces a burst of ticks.
        active.next_tick = now + self.config.tick_interval;

        let elapsed = now.saturating_duration_since(active.started);
        trace!(id = %active.id, remaining_ms = remaining.as_millis() as u64, "countdown tick");
        CountdownEvent::Tick {
            id: active.id,
            phase: active.phase,
            remaining,
            elapsed,
            total: active.total,
        }
    }

    /// Whether a countdown is running.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// The phase of the running countdown.
    pub fn phase(&self) -> Option<P> {
        self.active.as_ref().map(|a| a.phase)
    }

    /// Time left on the running countdown, measured now.
    pub fn remaining(&self) -> Option<Duration> {
        self.active
            .as_ref()
            .map(|a| a.deadline.saturating_duration_since(Instant::now()))
    }

    /// The full duration the running countdown was started with.
    pub fn total(&self) -> Option<Duration> {
        self.active.as_ref().map(|a| a.total)
    }

    /// The configured tick interval.
    pub fn tick_interval(&self) -> Duration {
        self.config.tick_interval
    }
}

impl<P: Copy + fmt::Debug> Default for Countdown<P> {
    fn default() -> Self {
        Self::new(CountdownConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceil_secs_rounds_up() {
        assert_eq!(ceil_secs(Duration::ZERO), 0);
        assert_eq!(ceil_secs(Duration::from_millis(1)), 1);
        assert_eq!(ceil_secs(Duration::from_millis(1000)), 1);
        assert_eq!(ceil_secs(Duration::from_millis(1001)), 2);
    }

    #[test]
    fn test_config_clamps_tick_interval() {
        let cfg = CountdownConfig::with_tick_interval(Duration::ZERO).validated();
        assert_eq!(cfg.tick_interval, CountdownConfig::MIN_TICK_INTERVAL);

        let cfg = CountdownConfig::with_tick_interval(Duration::from_secs(60)).validated();
        assert_eq!(cfg.tick_interval, CountdownConfig::MAX_TICK_INTERVAL);
    }

    #[test]
    fn test_default_tick_interval() {
        assert_eq!(
            CountdownConfig::default().tick_interval,
            Duration::from_millis(250)
        );
    }
}
