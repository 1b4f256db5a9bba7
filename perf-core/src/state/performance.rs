//! Per-runtime performance state: the shared region plus the clock and time
//! origin every tracker measures against.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::{
    clock::Clock,
    constants::Milestone,
    error::PerfResult,
    state::region::SharedStateRegion,
};

const NANOS_PER_MILLIS: f64 = 1e6;
const MICROS_PER_MILLIS: f64 = 1e3;

/// Reference point for relative performance timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeOrigin {
    /// Monotonic reading at construction, nanoseconds.
    pub nanos: u64,

    /// Wall-clock reading at construction, microseconds since the epoch.
    pub timestamp_micros: u64,
}

impl TimeOrigin {
    pub fn capture(clock: &dyn Clock) -> Self {
        Self {
            nanos: clock.now_nanos(),
            timestamp_micros: clock.wall_micros(),
        }
    }

    /// Monotonic origin in milliseconds.
    pub fn millis(&self) -> f64 {
        self.nanos as f64 / NANOS_PER_MILLIS
    }

    /// Wall-clock origin in milliseconds since the epoch.
    pub fn timestamp_millis(&self) -> f64 {
        self.timestamp_micros as f64 / MICROS_PER_MILLIS
    }
}

/// One instance per runtime context, shared explicitly by every component.
#[derive(Debug)]
pub struct PerformanceState {
    region: SharedStateRegion,
    clock: Arc<dyn Clock>,
    time_origin: TimeOrigin,
}

impl PerformanceState {
    /// Wrap a freshly allocated region and mark the origin milestones.
    pub fn new(region: SharedStateRegion, clock: Arc<dyn Clock>) -> Self {
        let time_origin = TimeOrigin::capture(clock.as_ref());
        let state = Self {
            region,
            clock,
            time_origin,
        };
        state.mark_origin();
        state
    }

    /// Rebuild from a saved block. Restored milestones are reset before the
    /// origin milestones of this process are written.
    pub fn restore(bytes: &[u8], clock: Arc<dyn Clock>) -> PerfResult<Self> {
        let region = SharedStateRegion::deserialize(bytes)?;
        region.reset_milestones();
        debug!(layout = ?region.layout(), "restored performance state region");
        Ok(Self::new(region, clock))
    }

    fn mark_origin(&self) {
        self.region
            .mark(Milestone::TimeOrigin.index(), self.time_origin.nanos);
        self.region.mark(
            Milestone::TimeOriginTimestamp.index(),
            self.time_origin.timestamp_micros,
        );
        self.region
            .mark(Milestone::Environment.index(), self.clock.now_nanos());
    }

    #[inline]
    pub fn region(&self) -> &SharedStateRegion {
        &self.region
    }

    #[inline]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn clock_handle(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    #[inline]
    pub fn now_nanos(&self) -> u64 {
        self.clock.now_nanos()
    }

    #[inline]
    pub fn time_origin(&self) -> TimeOrigin {
        self.time_origin
    }
}
