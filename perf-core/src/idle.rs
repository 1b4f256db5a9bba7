//! Event-loop idle time.
//!
//! The host loop is a tokio runtime: a worker is idle while it is parked
//! waiting for work. [`IdleTimeProbe`] accumulates that parked time through
//! the runtime builder's park/unpark hooks.

use std::{
    cell::Cell,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use crate::error::{PerfError, PerfResult};

/// Something that knows how long the host loop has been idle.
pub trait IdleTimeSource: Send + Sync {
    /// Total idle time since the loop was created.
    fn idle_time(&self) -> Duration;
}

thread_local! {
    static PARKED_AT: Cell<Option<Instant>> = const { Cell::new(None) };
}

/// Park-time accumulator for a tokio runtime.
///
/// With several worker threads the reported time is the sum over workers.
#[derive(Debug, Default)]
pub struct IdleTimeProbe {
    idle_nanos: AtomicU64,
}

impl IdleTimeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire a new probe into `builder`'s park hooks.
    pub fn install(builder: &mut tokio::runtime::Builder) -> Arc<Self> {
        let probe = Arc::new(Self::new());

        let on_park = Arc::clone(&probe);
        let on_unpark = Arc::clone(&probe);
        builder
            .on_thread_park(move || on_park.on_park())
            .on_thread_unpark(move || on_unpark.on_unpark());

        probe
    }

    pub fn on_park(&self) {
        PARKED_AT.with(|parked| parked.set(Some(Instant::now())));
    }

    pub fn on_unpark(&self) {
        if let Some(parked_at) = PARKED_AT.with(Cell::take) {
            self.add_idle(parked_at.elapsed());
        }
    }

    pub fn add_idle(&self, idle: Duration) {
        self.idle_nanos
            .fetch_add(idle.as_nanos() as u64, Ordering::Relaxed);
    }
}

impl IdleTimeSource for IdleTimeProbe {
    fn idle_time(&self) -> Duration {
        Duration::from_nanos(self.idle_nanos.load(Ordering::Relaxed))
    }
}

/// Accumulated idle time of the host loop, in seconds.
pub fn loop_idle_time(source: Option<&dyn IdleTimeSource>) -> PerfResult<f64> {
    let source = source.ok_or_else(|| PerfError::unavailable("event loop"))?;
    Ok(source.idle_time().as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_loop_is_unavailable() {
        assert!(matches!(
            loop_idle_time(None),
            Err(PerfError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_seconds_from_accumulated_idle() {
        let probe = IdleTimeProbe::new();
        assert_eq!(loop_idle_time(Some(&probe)).unwrap(), 0.0);

        probe.add_idle(Duration::from_millis(1_500));
        assert_eq!(loop_idle_time(Some(&probe)).unwrap(), 1.5);
    }

    #[test]
    fn test_unpark_without_park_is_ignored() {
        let probe = IdleTimeProbe::new();
        probe.on_unpark();
        assert_eq!(probe.idle_time(), Duration::ZERO);

        probe.on_park();
        std::thread::sleep(Duration::from_millis(2));
        probe.on_unpark();
        assert!(probe.idle_time() >= Duration::from_millis(2));
    }

    #[test]
    fn test_runtime_parks_accumulate() {
        let mut builder = tokio::runtime::Builder::new_current_thread();
        builder.enable_time();
        let probe = IdleTimeProbe::install(&mut builder);
        let runtime = builder.build().unwrap();

        runtime.block_on(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
        });

        assert!(probe.idle_time() > Duration::ZERO);
    }
}
