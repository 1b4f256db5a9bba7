//! ``src/interval.rs``
//! ============================================================================
//! # Timer-driven interval histograms
//!
//! An [`IntervalHistogram`] arms a recurring tokio timer. Every tick records
//! the nanoseconds elapsed since the previous tick, emits the running
//! statistics as trace counters and hands them to the sample callback.
//!
//! When the host loop is busy, ticks arrive late and the recorded deltas grow
//! past the interval; the event-loop delay monitor is exactly this histogram
//! with the counters emitted under `perf::event_loop`.
//!
//! ## Lifecycle
//! - `create` validates the interval, then arms the timer
//! - `start` / `stop` re-arm and cancel it; both are idempotent
//! - dropping the handle cancels the timer

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{
    runtime::Handle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    clock::Clock,
    error::{PerfError, PerfResult},
    histogram::{Histogram, HistogramOptions, HistogramSample},
};

/// Callback receiving the read view after every tick.
pub type SampleCallback = Box<dyn Fn(&HistogramSample) + Send + Sync>;

/// Trace target the tick counters are emitted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleTarget {
    /// `perf::histogram`
    Histogram,
    /// `perf::event_loop`
    EventLoop,
}

struct IntervalSampler {
    histogram: Mutex<Histogram>,
    clock: Arc<dyn Clock>,
    target: SampleTarget,
    on_sample: Option<SampleCallback>,
}

impl IntervalSampler {
    fn tick(&self) -> HistogramSample {
        let sample = {
            let mut histogram = self.histogram.lock();
            let delta = histogram.record_delta(self.clock.now_nanos());
            histogram.sample(delta)
        };

        match self.target {
            SampleTarget::EventLoop => trace!(
                target: "perf::event_loop",
                delay = sample.delta,
                min = sample.min,
                max = sample.max,
                mean = sample.mean,
                stddev = sample.stddev,
                "delay sample"
            ),
            SampleTarget::Histogram => trace!(
                target: "perf::histogram",
                delta = sample.delta,
                min = sample.min,
                max = sample.max,
                mean = sample.mean,
                stddev = sample.stddev,
                "interval sample"
            ),
        }

        if let Some(on_sample) = &self.on_sample {
            on_sample(&sample);
        }
        sample
    }
}

pub struct IntervalHistogram {
    sampler: Arc<IntervalSampler>,
    interval: Duration,
    runtime: Handle,
    timer: Mutex<Option<CancellationToken>>,
}

impl IntervalHistogram {
    /// Create a histogram sampled every `interval_ms` and arm its timer.
    ///
    /// Must be called from within a tokio runtime; the timer task is spawned
    /// on the current one.
    pub fn create<F>(
        interval_ms: i64,
        options: HistogramOptions,
        clock: Arc<dyn Clock>,
        on_sample: F,
    ) -> PerfResult<Self>
    where
        F: Fn(&HistogramSample) + Send + Sync + 'static,
    {
        Self::build(
            interval_ms,
            options,
            clock,
            SampleTarget::Histogram,
            Some(Box::new(on_sample)),
        )
    }

    /// Event-loop delay monitor: counters go to `perf::event_loop`.
    pub fn event_loop_delay(
        interval_ms: i64,
        options: HistogramOptions,
        clock: Arc<dyn Clock>,
    ) -> PerfResult<Self> {
        Self::build(interval_ms, options, clock, SampleTarget::EventLoop, None)
    }

    fn build(
        interval_ms: i64,
        options: HistogramOptions,
        clock: Arc<dyn Clock>,
        target: SampleTarget,
        on_sample: Option<SampleCallback>,
    ) -> PerfResult<Self> {
        if interval_ms <= 0 {
            return Err(PerfError::invalid_argument(
                "interval",
                format!("must be positive, got {interval_ms}"),
            ));
        }
        let runtime = Handle::try_current().map_err(|_| PerfError::unavailable("timer"))?;
        let histogram = Histogram::new(options)?;

        let handle = Self {
            sampler: Arc::new(IntervalSampler {
                histogram: Mutex::new(histogram),
                clock,
                target,
                on_sample,
            }),
            interval: Duration::from_millis(interval_ms as u64),
            runtime,
            timer: Mutex::new(None),
        };
        handle.start(false);
        Ok(handle)
    }

    /// Arm the timer. Returns `false` if it was already running.
    pub fn start(&self, reset_on_start: bool) -> bool {
        let mut timer = self.timer.lock();
        if timer.is_some() {
            return false;
        }
        if reset_on_start {
            self.reset();
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let sampler = Arc::clone(&self.sampler);
        let period = self.interval;

        self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        sampler.tick();
                    }
                }
            }
        });

        debug!(interval = ?self.interval, "interval histogram started");
        *timer = Some(token);
        true
    }

    /// Cancel the timer. Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        let Some(token) = self.timer.lock().take() else {
            return false;
        };
        token.cancel();
        debug!(interval = ?self.interval, "interval histogram stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.timer.lock().is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Clear the statistics; the timer keeps running.
    pub fn reset(&self) {
        self.sampler.histogram.lock().reset();
    }

    /// Take one sample immediately, outside the timer.
    pub fn tick(&self) -> HistogramSample {
        self.sampler.tick()
    }

    /// Current statistics with a zero delta.
    pub fn snapshot(&self) -> HistogramSample {
        self.sampler.histogram.lock().sample(0)
    }

    /// Run `f` against the underlying histogram, e.g. for percentiles.
    pub fn with_histogram<R>(&self, f: impl FnOnce(&Histogram) -> R) -> R {
        f(&self.sampler.histogram.lock())
    }
}

impl Drop for IntervalHistogram {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for IntervalHistogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntervalHistogram")
            .field("interval", &self.interval)
            .field("target", &self.sampler.target)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, TokioClock};

    #[test]
    fn test_create_requires_runtime() {
        let result = IntervalHistogram::create(
            10,
            HistogramOptions::default(),
            Arc::new(ManualClock::new(0)),
            |_| {},
        );
        assert!(matches!(result, Err(PerfError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_non_positive_interval_rejected() {
        for interval in [0, -5] {
            let result = IntervalHistogram::create(
                interval,
                HistogramOptions::default(),
                Arc::new(ManualClock::new(0)),
                |_| {},
            );
            assert!(matches!(result, Err(PerfError::InvalidArgument { .. })));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_mean_tracks_interval() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let histogram = IntervalHistogram::create(
            10,
            HistogramOptions::default(),
            Arc::new(TokioClock::new()),
            move |sample| {
                let _ = tx.send(*sample);
            },
        )
        .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.delta, 0);
        assert_eq!(first.count, 0);

        for _ in 0..9 {
            let sample = rx.recv().await.unwrap();
            assert!(sample.delta >= 10_000_000);
        }

        let stats = histogram.snapshot();
        assert_eq!(stats.count, 9);
        drop(rx);
        let target = 10_000_000.0;
        assert!((stats.mean - target).abs() / target < 0.01);
        assert!(stats.min <= stats.max);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_keeps_timer_running() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let histogram = IntervalHistogram::create(
            5,
            HistogramOptions::default(),
            Arc::new(TokioClock::new()),
            move |sample| {
                let _ = tx.send(*sample);
            },
        )
        .unwrap();

        for _ in 0..4 {
            rx.recv().await.unwrap();
        }
        histogram.reset();
        let stats = histogram.snapshot();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.min, 0);
        assert_eq!(stats.max, 0);
        assert_eq!(stats.mean, 0.0);
        assert!(histogram.is_running());

        for _ in 0..3 {
            rx.recv().await.unwrap();
        }
        assert!(histogram.snapshot().count > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_idempotent() {
        let histogram = IntervalHistogram::event_loop_delay(
            10,
            HistogramOptions::EVENT_LOOP_DELAY,
            Arc::new(TokioClock::new()),
        )
        .unwrap();

        assert!(histogram.is_running());
        assert!(!histogram.start(false));

        assert!(histogram.stop());
        assert!(!histogram.stop());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(histogram.snapshot().count, 0);

        assert!(histogram.start(true));
        tokio::time::sleep(Duration::from_millis(35)).await;
        assert!(histogram.snapshot().count >= 1);
    }

    #[tokio::test]
    async fn test_manual_tick_with_manual_clock() {
        let clock = Arc::new(ManualClock::new(0));
        let histogram = IntervalHistogram::create(
            60_000,
            HistogramOptions::default(),
            Arc::clone(&clock) as Arc<dyn Clock>,
            |_| {},
        )
        .unwrap();

        assert_eq!(histogram.tick().delta, 0);
        clock.advance(Duration::from_millis(7));
        let sample = histogram.tick();
        assert_eq!(sample.delta, 7_000_000);
        assert_eq!(sample.count, 1);

        let p = histogram.with_histogram(|h| h.percentile(100.0)).unwrap();
        assert!(p >= 7_000_000);
    }
}
