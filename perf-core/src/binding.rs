//! ``src/binding.rs``
//! ============================================================================
//! # PerformanceCore: the binding surface
//!
//! One core per runtime context. It owns the shared state region and wires
//! the trackers to each other and to the host adapters:
//!
//! - [`MilestoneTracker`] writes lifecycle timestamps into the region
//! - [`GcTracker`] turns collector hooks into deferred `"gc"` entries
//! - [`NotificationDispatch`] routes entries to the observer callback
//! - [`IntervalHistogram`]s sample timer drift on the host runtime
//!
//! Methods are named after the scripting-layer bindings they back.
//!
//! ## Example
//! ```rust,ignore
//! let core = PerformanceCore::builder()
//!     .collector(collector)
//!     .idle_source(probe)
//!     .build()?;
//! core.setup_observers(|entry| println!("{entry:?}"));
//! core.install_gc_tracking()?;
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    clock::{Clock, MonotonicClock},
    config::PerfConfig,
    constants::{Constants, Milestone, constants},
    dispatch::NotificationDispatch,
    entry::PerformanceEntry,
    error::PerfResult,
    gc::{CollectorHooks, GcTracker},
    histogram::HistogramSample,
    idle::{IdleTimeSource, loop_idle_time},
    immediate::ImmediateQueue,
    interval::IntervalHistogram,
    milestones::MilestoneTracker,
    state::{
        PerformanceState,
        region::{MilestonesView, ObserverCountsView, SharedStateRegion},
    },
};

#[derive(Default)]
pub struct PerformanceCoreBuilder {
    config: PerfConfig,
    clock: Option<Arc<dyn Clock>>,
    collector: Option<Arc<dyn CollectorHooks>>,
    idle: Option<Arc<dyn IdleTimeSource>>,
    immediates: Option<Arc<ImmediateQueue>>,
    snapshot: Option<Vec<u8>>,
}

impl PerformanceCoreBuilder {
    #[must_use]
    pub fn config(mut self, config: PerfConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn collector(mut self, collector: Arc<dyn CollectorHooks>) -> Self {
        self.collector = Some(collector);
        self
    }

    #[must_use]
    pub fn idle_source(mut self, idle: Arc<dyn IdleTimeSource>) -> Self {
        self.idle = Some(idle);
        self
    }

    /// Share the host's deferred-task queue instead of creating one.
    #[must_use]
    pub fn immediates(mut self, immediates: Arc<ImmediateQueue>) -> Self {
        self.immediates = Some(immediates);
        self
    }

    /// Restore the region from a block produced by
    /// [`PerformanceCore::serialize_state`].
    #[must_use]
    pub fn restore_from(mut self, snapshot: Vec<u8>) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn build(self) -> PerfResult<PerformanceCore> {
        self.config.validate()?;

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock) as Arc<dyn Clock>);
        let state = match &self.snapshot {
            Some(bytes) => PerformanceState::restore(bytes, clock)?,
            None => PerformanceState::new(SharedStateRegion::with_defaults(), clock),
        };
        let state = Arc::new(state);

        let immediates = self.immediates.unwrap_or_default();
        let dispatch = Arc::new(NotificationDispatch::new(Arc::clone(&state)));
        let gc = GcTracker::new(
            Arc::clone(&state),
            Arc::clone(&dispatch),
            Arc::clone(&immediates),
            self.collector,
        );

        let core = PerformanceCore {
            config: self.config,
            milestones: MilestoneTracker::new(Arc::clone(&state)),
            state,
            dispatch,
            immediates,
            gc,
            idle: self.idle,
        };

        if core.config.gc.track_on_start {
            core.install_gc_tracking()?;
        }

        info!(
            layout = ?core.state.region().layout(),
            restored = self.snapshot.is_some(),
            "performance core ready"
        );
        Ok(core)
    }
}

pub struct PerformanceCore {
    config: PerfConfig,
    state: Arc<PerformanceState>,
    milestones: MilestoneTracker,
    dispatch: Arc<NotificationDispatch>,
    immediates: Arc<ImmediateQueue>,
    gc: GcTracker,
    idle: Option<Arc<dyn IdleTimeSource>>,
}

impl PerformanceCore {
    pub fn builder() -> PerformanceCoreBuilder {
        PerformanceCoreBuilder::default()
    }

    pub fn config(&self) -> &PerfConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<PerformanceState> {
        &self.state
    }

    /// `markMilestone(id)`. Out-of-range ids are ignored.
    pub fn mark_milestone(&self, milestone: usize) {
        self.milestones.mark_id(milestone);
    }

    pub fn mark_bootstrap_complete(&self) {
        self.milestones.mark(Milestone::BootstrapComplete);
    }

    pub fn milestone_tracker(&self) -> &MilestoneTracker {
        &self.milestones
    }

    /// `setupObservers(callback)`. The last registration wins.
    pub fn setup_observers<F>(&self, callback: F)
    where
        F: Fn(&PerformanceEntry) + Send + Sync + 'static,
    {
        self.dispatch.set_callback(callback);
    }

    /// `notify(entryTypeName, entry)`. Returns whether the callback ran.
    pub fn notify(&self, entry_type: &str, entry: &PerformanceEntry) -> bool {
        self.dispatch.notify_named(entry_type, entry)
    }

    pub fn install_gc_tracking(&self) -> PerfResult<()> {
        self.gc.install()
    }

    pub fn remove_gc_tracking(&self) {
        self.gc.uninstall();
    }

    pub fn gc_tracker(&self) -> &GcTracker {
        &self.gc
    }

    /// Accumulated idle time of the host loop, in seconds.
    pub fn loop_idle_time(&self) -> PerfResult<f64> {
        loop_idle_time(self.idle.as_deref())
    }

    /// Monotonic time origin in milliseconds.
    pub fn get_time_origin(&self) -> f64 {
        self.state.time_origin().millis()
    }

    /// Wall-clock time origin in milliseconds since the epoch.
    pub fn get_time_origin_timestamp(&self) -> f64 {
        self.state.time_origin().timestamp_millis()
    }

    /// Histogram sampled every `interval_ms` with the configured bounds.
    pub fn create_interval_histogram<F>(
        &self,
        interval_ms: i64,
        on_sample: F,
    ) -> PerfResult<IntervalHistogram>
    where
        F: Fn(&HistogramSample) + Send + Sync + 'static,
    {
        IntervalHistogram::create(
            interval_ms,
            self.config.histogram,
            self.state.clock_handle(),
            on_sample,
        )
    }

    /// Event-loop delay monitor using the `[event_loop]` settings.
    pub fn monitor_event_loop_delay(&self) -> PerfResult<IntervalHistogram> {
        IntervalHistogram::event_loop_delay(
            self.config.event_loop_interval_ms(),
            self.config.event_loop.histogram,
            self.state.clock_handle(),
        )
    }

    pub fn milestones(&self) -> MilestonesView<'_> {
        self.state.region().milestones()
    }

    pub fn observer_counts(&self) -> ObserverCountsView<'_> {
        self.state.region().observer_counts()
    }

    pub fn constants(&self) -> Constants {
        constants()
    }

    pub fn immediates(&self) -> &Arc<ImmediateQueue> {
        &self.immediates
    }

    /// Drain deferred deliveries on the calling (host) context.
    pub fn run_immediates(&self) -> usize {
        self.immediates.run_immediates()
    }

    pub fn serialize_state(&self) -> Vec<u8> {
        self.state.region().serialize()
    }
}

impl Drop for PerformanceCore {
    fn drop(&mut self) {
        self.gc.uninstall();
        debug!("performance core torn down");
    }
}

impl std::fmt::Debug for PerformanceCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceCore")
            .field("layout", &self.state.region().layout())
            .field("gc", &self.gc)
            .field("dispatch", &self.dispatch)
            .field("immediates", &self.immediates)
            .finish()
    }
}
