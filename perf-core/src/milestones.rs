//! Lifecycle milestone recording.

use std::sync::Arc;

use tracing::trace;

use crate::{constants::Milestone, state::PerformanceState};

/// Writes milestone timestamps into the shared region and instant-logs them
/// under the `perf::bootstrap` target.
#[derive(Debug, Clone)]
pub struct MilestoneTracker {
    state: Arc<PerformanceState>,
}

impl MilestoneTracker {
    pub fn new(state: Arc<PerformanceState>) -> Self {
        Self { state }
    }

    /// Record `milestone` at the current monotonic time.
    #[inline]
    pub fn mark(&self, milestone: Milestone) {
        self.mark_at(milestone.index(), self.state.now_nanos());
    }

    /// Record a raw identifier. `INVALID` and out-of-range ids are ignored.
    pub fn mark_id(&self, milestone: usize) {
        if milestone >= self.state.region().layout().milestone_count {
            return;
        }
        self.mark_at(milestone, self.state.now_nanos());
    }

    /// Record an explicit timestamp (nanoseconds) for a raw identifier.
    pub fn mark_at(&self, milestone: usize, timestamp_ns: u64) {
        if milestone >= self.state.region().layout().milestone_count {
            return;
        }
        self.state.region().mark(milestone, timestamp_ns);

        let name = Milestone::from_index(milestone).map_or("custom", Milestone::name);
        trace!(
            target: "perf::bootstrap",
            milestone = name,
            ts_us = timestamp_ns / 1000,
            "milestone"
        );
    }

    /// Stored value for `milestone`; the `-1` sentinel when unset.
    pub fn get(&self, milestone: Milestone) -> Option<f64> {
        self.state.region().milestone(milestone.index())
    }
}
