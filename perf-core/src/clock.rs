//! Time sources used by every tracker.
//!
//! All monotonic readings are nanoseconds from a fixed anchor; wall-clock
//! readings are microseconds since the Unix epoch.

use std::{
    fmt,
    sync::{
        LazyLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use chrono::Utc;

/// Process-wide anchor for [`MonotonicClock`].
static PROCESS_ANCHOR: LazyLock<Instant> = LazyLock::new(Instant::now);

/// A source of high-resolution monotonic time plus wall-clock time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Monotonic nanoseconds. Never decreases.
    fn now_nanos(&self) -> u64;

    /// Wall-clock microseconds since the Unix epoch.
    fn wall_micros(&self) -> u64;
}

/// Production clock backed by [`std::time::Instant`].
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    #[inline]
    fn now_nanos(&self) -> u64 {
        PROCESS_ANCHOR.elapsed().as_nanos() as u64
    }

    fn wall_micros(&self) -> u64 {
        Utc::now().timestamp_micros().max(0) as u64
    }
}

/// Clock backed by tokio's time source.
///
/// Outside of a paused runtime this reads the same as [`MonotonicClock`];
/// under `tokio::time::pause` it follows the simulated time, which lets timer
/// driven components be tested deterministically.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    anchor: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    #[inline]
    fn now_nanos(&self) -> u64 {
        tokio::time::Instant::now()
            .duration_since(self.anchor)
            .as_nanos() as u64
    }

    fn wall_micros(&self) -> u64 {
        Utc::now().timestamp_micros().max(0) as u64
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
    wall_micros: AtomicU64,
}

impl ManualClock {
    pub fn new(start_nanos: u64) -> Self {
        Self {
            nanos: AtomicU64::new(start_nanos),
            wall_micros: AtomicU64::new(0),
        }
    }

    /// Move monotonic time forward.
    pub fn advance(&self, by: Duration) {
        self.nanos
            .fetch_add(by.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Jump to an absolute monotonic reading. Callers keep it non-decreasing.
    pub fn set_nanos(&self, nanos: u64) {
        self.nanos.store(nanos, Ordering::Relaxed);
    }

    pub fn set_wall_micros(&self, micros: u64) {
        self.wall_micros.store(micros, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::Relaxed)
    }

    fn wall_micros(&self) -> u64 {
        self.wall_micros.load(Ordering::Relaxed)
    }
}
