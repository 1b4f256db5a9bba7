//! src/main.rs
//! Demo host: runs the instrumentation core on a tokio runtime, drives a few
//! simulated collector cycles and prints what the observer received.
//!
//! Usage: `perf-demo [config.toml]`

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::info;

use perf_core::{
    EntryType, GcFlags, GcKind, IdleTimeProbe, ImmediateQueue, Milestone, PerformanceCore,
    SimulatedCollector, config::PerfConfig, gc::CollectorHooks, logging::LoggerBuilder,
};

fn main() -> Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(PerfConfig::default_path);

    let mut builder = tokio::runtime::Builder::new_current_thread();
    builder.enable_all();
    let probe = IdleTimeProbe::install(&mut builder);
    let runtime = builder.build().context("Failed to build tokio runtime")?;

    runtime.block_on(run(config_path, probe))
}

async fn run(config_path: Option<PathBuf>, probe: Arc<IdleTimeProbe>) -> Result<()> {
    let config = match &config_path {
        Some(path) => PerfConfig::load_from(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PerfConfig::default(),
    };

    let _guard = LoggerBuilder::new()
        .with_config(config.logging.clone())
        .build()
        .await
        .context("Failed to initialize logging")?;
    info!("Starting perf-demo");

    let collector = Arc::new(SimulatedCollector::new());
    let immediates = Arc::new(ImmediateQueue::new());
    let pump = immediates.spawn_pump(&Handle::current());

    let core = PerformanceCore::builder()
        .config(config)
        .collector(Arc::clone(&collector) as Arc<dyn CollectorHooks>)
        .idle_source(probe)
        .immediates(Arc::clone(&immediates))
        .build()
        .context("Failed to build performance core")?;
    core.mark_milestone(Milestone::LoopStart.index());

    let entries = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&entries);
    core.setup_observers(move |entry| sink.lock().push(entry.clone()));
    core.observer_counts().increment(EntryType::Gc.index());
    core.install_gc_tracking()
        .context("Failed to install GC tracking")?;

    let monitor = if core.config().event_loop.enabled {
        Some(core.monitor_event_loop_delay()?)
    } else {
        None
    };

    let cycles = [
        (GcKind::MINOR, GcFlags::NO, 2),
        (GcKind::MAJOR, GcFlags::FORCED, 12),
        (GcKind::INCREMENTAL, GcFlags::SCHEDULE_IDLE, 5),
    ];
    for (kind, flags, pause_ms) in cycles {
        collector.begin_cycle(kind);
        // A collection pauses the loop.
        std::thread::sleep(Duration::from_millis(pause_ms));
        collector.end_cycle(kind, flags);
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    core.mark_bootstrap_complete();
    core.remove_gc_tracking();
    pump.cancel();
    core.run_immediates();

    println!("== entries");
    for entry in entries.lock().iter() {
        println!("{}", serde_json::to_string(entry)?);
    }

    if let Some(monitor) = &monitor {
        monitor.stop();
        println!("== event loop delay (ns)");
        println!("{}", serde_json::to_string_pretty(&monitor.snapshot())?);
        for (percentile, value) in monitor.with_histogram(|h| h.percentiles()) {
            println!("p{percentile:<8.3} {value}");
        }
    }

    println!("== milestones (ns)");
    core.mark_milestone(Milestone::LoopExit.index());
    for milestone in Milestone::ALL {
        let value = core.milestones().get(milestone.index()).unwrap_or_default();
        println!("{:<20} {value}", milestone.name());
    }

    println!("== loop idle: {:.3}s", core.loop_idle_time()?);
    println!("== time origin: {:.3}ms", core.get_time_origin_timestamp());
    Ok(())
}
