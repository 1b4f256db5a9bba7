//! ``src/gc.rs``
//! ============================================================================
//! # Garbage-collection cycle tracking
//!
//! The collector reports each cycle through two synchronous hooks, a prologue
//! (cycle starting) and an epilogue (cycle ending). Both run on the
//! collector's own stack, possibly in the middle of an allocation, so the
//! handlers here only touch atomics and never call back into the host: a
//! finished cycle is turned into a `"gc"` entry and handed to the host's
//! [`ImmediateQueue`] for delivery once the collector has unwound.
//!
//! ## State machine
//! - start while a cycle is in progress: ignored (no nested starts)
//! - end whose kind differs from the in-progress kind: ignored
//! - matched end: back to idle; entry built only if someone observes `gc`

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
};

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    constants::{EntryType, GcFlags, GcKind},
    dispatch::NotificationDispatch,
    entry::PerformanceEntry,
    error::{PerfError, PerfResult},
    immediate::{CallbackFlags, ImmediateQueue},
    state::PerformanceState,
};

const NANOS_PER_MILLIS: f64 = 1e6;

/// Collector prologue hook: receives the kind of the starting cycle.
pub type PrologueHook = Arc<dyn Fn(GcKind) + Send + Sync>;

/// Collector epilogue hook: receives the kind and flags of the ending cycle.
pub type EpilogueHook = Arc<dyn Fn(GcKind, GcFlags) + Send + Sync>;

static NEXT_HOOK_KEY: AtomicU64 = AtomicU64::new(1);

/// Identifies one registrant's hooks so they can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookKey(u64);

impl HookKey {
    pub fn next() -> Self {
        Self(NEXT_HOOK_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

/// Hook registration surface of a garbage collector.
pub trait CollectorHooks: Send + Sync {
    fn add_prologue_hook(&self, key: HookKey, hook: PrologueHook);
    fn add_epilogue_hook(&self, key: HookKey, hook: EpilogueHook);
    fn remove_prologue_hook(&self, key: HookKey);
    fn remove_epilogue_hook(&self, key: HookKey);
}

/// Transient per-cycle state. `current_gc_type == 0` means idle.
#[derive(Debug, Default)]
pub struct GcCycleState {
    current_gc_type: AtomicU32,
    last_gc_start_mark: AtomicU64,
}

impl GcCycleState {
    pub fn current_gc_type(&self) -> GcKind {
        GcKind(self.current_gc_type.load(Ordering::Relaxed))
    }

    pub fn last_gc_start_mark(&self) -> u64 {
        self.last_gc_start_mark.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.current_gc_type.store(0, Ordering::Relaxed);
    }
}

struct GcSignals {
    cycle: GcCycleState,
    state: Arc<PerformanceState>,
    dispatch: Arc<NotificationDispatch>,
    immediates: Arc<ImmediateQueue>,
}

impl GcSignals {
    fn on_cycle_start(&self, kind: GcKind) {
        if kind.is_none() {
            return;
        }

        let current = self.cycle.current_gc_type();
        if !current.is_none() {
            debug!(
                target: "perf::gc",
                current = current.bits(),
                ignored = kind.bits(),
                "nested collector start ignored"
            );
            return;
        }

        self.cycle
            .last_gc_start_mark
            .store(self.state.now_nanos(), Ordering::Relaxed);
        self.cycle
            .current_gc_type
            .store(kind.bits(), Ordering::Relaxed);
    }

    fn on_cycle_end(&self, kind: GcKind, flags: GcFlags) {
        let current = self.cycle.current_gc_type();
        if kind.is_none() || kind != current {
            debug!(
                target: "perf::gc",
                current = current.bits(),
                ignored = kind.bits(),
                "mismatched collector end ignored"
            );
            return;
        }
        self.cycle.reset();

        if self.state.region().observer_count(EntryType::Gc.index()) == 0 {
            return;
        }

        let start_mark = self.cycle.last_gc_start_mark();
        let origin = self.state.time_origin().nanos;
        let start_time = (start_mark as f64 - origin as f64) / NANOS_PER_MILLIS;
        let duration = self.state.now_nanos() as f64 / NANOS_PER_MILLIS
            - start_mark as f64 / NANOS_PER_MILLIS;

        let entry = PerformanceEntry::gc(start_time, duration, kind, flags);
        let dispatch = Arc::clone(&self.dispatch);
        self.immediates.set_immediate(
            move || {
                dispatch.notify(EntryType::Gc, &entry);
            },
            CallbackFlags::Unrefed,
        );
    }
}

/// Pairs collector start/end signals and emits `"gc"` entries.
pub struct GcTracker {
    signals: Arc<GcSignals>,
    collector: Option<Arc<dyn CollectorHooks>>,
    key: HookKey,
    installed: AtomicBool,
}

impl GcTracker {
    pub fn new(
        state: Arc<PerformanceState>,
        dispatch: Arc<NotificationDispatch>,
        immediates: Arc<ImmediateQueue>,
        collector: Option<Arc<dyn CollectorHooks>>,
    ) -> Self {
        Self {
            signals: Arc::new(GcSignals {
                cycle: GcCycleState::default(),
                state,
                dispatch,
                immediates,
            }),
            collector,
            key: HookKey::next(),
            installed: AtomicBool::new(false),
        }
    }

    /// Register the prologue and epilogue hooks with the collector.
    ///
    /// Installing again only resets the cycle state; hooks are registered
    /// once.
    pub fn install(&self) -> PerfResult<()> {
        let Some(collector) = &self.collector else {
            return Err(PerfError::unavailable("garbage collector"));
        };

        self.signals.cycle.reset();
        if self.installed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let signals = Arc::clone(&self.signals);
        collector.add_prologue_hook(
            self.key,
            Arc::new(move |kind: GcKind| signals.on_cycle_start(kind)),
        );
        let signals = Arc::clone(&self.signals);
        collector.add_epilogue_hook(
            self.key,
            Arc::new(move |kind: GcKind, flags: GcFlags| signals.on_cycle_end(kind, flags)),
        );

        debug!(target: "perf::gc", "garbage collection tracking installed");
        Ok(())
    }

    /// Deregister the hooks. Entries already queued are still delivered.
    pub fn uninstall(&self) {
        self.signals.cycle.reset();
        if !self.installed.swap(false, Ordering::AcqRel) {
            return;
        }

        if let Some(collector) = &self.collector {
            collector.remove_prologue_hook(self.key);
            collector.remove_epilogue_hook(self.key);
        }
        debug!(target: "perf::gc", "garbage collection tracking removed");
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }

    /// Feed a cycle-start signal directly, bypassing hook registration.
    pub fn on_cycle_start(&self, kind: GcKind) {
        self.signals.on_cycle_start(kind);
    }

    /// Feed a cycle-end signal directly, bypassing hook registration.
    pub fn on_cycle_end(&self, kind: GcKind, flags: GcFlags) {
        self.signals.on_cycle_end(kind, flags);
    }

    pub fn cycle(&self) -> &GcCycleState {
        &self.signals.cycle
    }
}

impl Drop for GcTracker {
    fn drop(&mut self) {
        self.uninstall();
    }
}

impl std::fmt::Debug for GcTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcTracker")
            .field("key", &self.key)
            .field("installed", &self.is_installed())
            .field("cycle", &self.signals.cycle)
            .finish()
    }
}

/// In-process collector that fires registered hooks on demand.
#[derive(Default)]
pub struct SimulatedCollector {
    prologue: Mutex<Vec<(HookKey, PrologueHook)>>,
    epilogue: Mutex<Vec<(HookKey, EpilogueHook)>>,
}

impl SimulatedCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire every prologue hook for `kind`.
    pub fn begin_cycle(&self, kind: GcKind) {
        let hooks: Vec<PrologueHook> = self
            .prologue
            .lock()
            .iter()
            .map(|(_, hook)| Arc::clone(hook))
            .collect();
        for hook in hooks {
            hook(kind);
        }
    }

    /// Fire every epilogue hook for `kind`.
    pub fn end_cycle(&self, kind: GcKind, flags: GcFlags) {
        let hooks: Vec<EpilogueHook> = self
            .epilogue
            .lock()
            .iter()
            .map(|(_, hook)| Arc::clone(hook))
            .collect();
        for hook in hooks {
            hook(kind, flags);
        }
    }

    /// A complete start/end pair.
    pub fn collect(&self, kind: GcKind, flags: GcFlags) {
        self.begin_cycle(kind);
        self.end_cycle(kind, flags);
    }

    /// Registered (prologue, epilogue) hook counts.
    pub fn hook_counts(&self) -> (usize, usize) {
        (self.prologue.lock().len(), self.epilogue.lock().len())
    }
}

impl CollectorHooks for SimulatedCollector {
    fn add_prologue_hook(&self, key: HookKey, hook: PrologueHook) {
        self.prologue.lock().push((key, hook));
    }

    fn add_epilogue_hook(&self, key: HookKey, hook: EpilogueHook) {
        self.epilogue.lock().push((key, hook));
    }

    fn remove_prologue_hook(&self, key: HookKey) {
        self.prologue.lock().retain(|(k, _)| *k != key);
    }

    fn remove_epilogue_hook(&self, key: HookKey) {
        self.epilogue.lock().retain(|(k, _)| *k != key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, entry::EntryDetail, state::region::SharedStateRegion};
    use std::time::Duration;

    struct Harness {
        clock: Arc<ManualClock>,
        state: Arc<PerformanceState>,
        immediates: Arc<ImmediateQueue>,
        collector: Arc<SimulatedCollector>,
        tracker: GcTracker,
        seen: Arc<Mutex<Vec<PerformanceEntry>>>,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(0));
        let state = Arc::new(PerformanceState::new(
            SharedStateRegion::with_defaults(),
            Arc::clone(&clock) as Arc<dyn crate::clock::Clock>,
        ));
        let dispatch = Arc::new(NotificationDispatch::new(Arc::clone(&state)));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        dispatch.set_callback(move |entry| sink.lock().push(entry.clone()));

        let immediates = Arc::new(ImmediateQueue::new());
        let collector = Arc::new(SimulatedCollector::new());
        let tracker = GcTracker::new(
            Arc::clone(&state),
            dispatch,
            Arc::clone(&immediates),
            Some(Arc::clone(&collector) as Arc<dyn CollectorHooks>),
        );

        Harness {
            clock,
            state,
            immediates,
            collector,
            tracker,
            seen,
        }
    }

    fn observe_gc(h: &Harness) {
        h.state.region().set_observer_count(EntryType::Gc.index(), 1);
    }

    #[test]
    fn test_nested_start_ignored() {
        let h = harness();
        h.tracker.on_cycle_start(GcKind::MAJOR);
        let mark = h.tracker.cycle().last_gc_start_mark();

        h.clock.advance(Duration::from_millis(3));
        h.tracker.on_cycle_start(GcKind::MINOR);
        assert_eq!(h.tracker.cycle().current_gc_type(), GcKind::MAJOR);
        assert_eq!(h.tracker.cycle().last_gc_start_mark(), mark);

        h.tracker.on_cycle_end(GcKind::MAJOR, GcFlags::NO);
        assert_eq!(h.tracker.cycle().current_gc_type(), GcKind::NONE);

        h.tracker.on_cycle_end(GcKind::MINOR, GcFlags::NO);
        assert_eq!(h.tracker.cycle().current_gc_type(), GcKind::NONE);
    }

    #[test]
    fn test_mismatched_end_keeps_cycle_open() {
        let h = harness();
        observe_gc(&h);
        h.tracker.on_cycle_start(GcKind::MAJOR);
        h.tracker.on_cycle_end(GcKind::MINOR, GcFlags::NO);

        assert_eq!(h.tracker.cycle().current_gc_type(), GcKind::MAJOR);
        assert!(h.immediates.is_empty());
    }

    #[test]
    fn test_no_entry_without_observers() {
        let h = harness();
        h.tracker.on_cycle_start(GcKind::MINOR);
        h.clock.advance(Duration::from_millis(1));
        h.tracker.on_cycle_end(GcKind::MINOR, GcFlags::NO);
        assert!(h.immediates.is_empty());

        observe_gc(&h);
        h.tracker.on_cycle_start(GcKind::MINOR);
        h.clock.advance(Duration::from_millis(1));
        h.tracker.on_cycle_end(GcKind::MINOR, GcFlags::FORCED);
        assert_eq!(h.immediates.len(), 1);

        assert_eq!(h.immediates.run_immediates(), 1);
        let seen = h.seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].duration() >= 0.0);
    }

    #[test]
    fn test_entry_delivered_after_end_returns() {
        let h = harness();
        observe_gc(&h);

        h.tracker.on_cycle_start(GcKind::MINOR);
        h.clock.set_nanos(50_000_000);
        h.tracker.on_cycle_end(GcKind::MINOR, GcFlags::SCHEDULE_IDLE);
        assert!(h.seen.lock().is_empty());

        h.immediates.run_immediates();
        let seen = h.seen.lock();
        assert_eq!(seen.len(), 1);
        let entry = &seen[0];
        assert_eq!(entry.name(), "gc");
        assert_eq!(entry.start_time(), 0.0);
        assert!((entry.duration() - 50.0).abs() < 1e-9);
        assert_eq!(
            entry.detail(),
            Some(&EntryDetail::Gc {
                kind: GcKind::MINOR,
                flags: GcFlags::SCHEDULE_IDLE
            })
        );
    }

    #[test]
    fn test_install_twice_registers_once() {
        let h = harness();
        observe_gc(&h);
        h.tracker.install().unwrap();
        h.tracker.install().unwrap();
        assert_eq!(h.collector.hook_counts(), (1, 1));

        h.collector.collect(GcKind::MAJOR, GcFlags::NO);
        h.immediates.run_immediates();
        assert_eq!(h.seen.lock().len(), 1);
    }

    #[test]
    fn test_uninstall_is_idempotent_and_keeps_queued_entries() {
        let h = harness();
        observe_gc(&h);
        h.tracker.uninstall();
        h.tracker.install().unwrap();

        h.collector.collect(GcKind::INCREMENTAL, GcFlags::NO);
        h.collector.begin_cycle(GcKind::MAJOR);
        h.tracker.uninstall();
        h.tracker.uninstall();

        assert_eq!(h.collector.hook_counts(), (0, 0));
        assert_eq!(h.tracker.cycle().current_gc_type(), GcKind::NONE);

        h.collector.collect(GcKind::MINOR, GcFlags::NO);
        h.immediates.run_immediates();
        assert_eq!(h.seen.lock().len(), 1);
    }

    #[test]
    fn test_install_without_collector_is_unavailable() {
        let state = Arc::new(PerformanceState::new(
            SharedStateRegion::with_defaults(),
            Arc::new(ManualClock::new(0)),
        ));
        let dispatch = Arc::new(NotificationDispatch::new(Arc::clone(&state)));
        let tracker = GcTracker::new(state, dispatch, Arc::new(ImmediateQueue::new()), None);

        assert!(matches!(
            tracker.install(),
            Err(PerfError::Unavailable { .. })
        ));
        tracker.uninstall();
    }

    #[test]
    fn test_drop_deregisters_hooks() {
        let h = harness();
        h.tracker.install().unwrap();
        let collector = Arc::clone(&h.collector);
        drop(h);
        assert_eq!(collector.hook_counts(), (0, 0));
    }
}
