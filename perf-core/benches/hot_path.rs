use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

use perf_core::{
    EntryType, GcFlags, GcKind, Histogram, HistogramOptions, Milestone, PerformanceCore,
    SimulatedCollector, gc::CollectorHooks,
};

fn core_with_collector() -> (PerformanceCore, Arc<SimulatedCollector>) {
    let collector = Arc::new(SimulatedCollector::new());
    let core = PerformanceCore::builder()
        .collector(Arc::clone(&collector) as Arc<dyn CollectorHooks>)
        .build()
        .unwrap();
    core.install_gc_tracking().unwrap();
    (core, collector)
}

fn bench_mark(c: &mut Criterion) {
    let (core, _) = core_with_collector();
    let mut group = c.benchmark_group("milestones");

    group.bench_function("mark_bootstrap_complete", |b| {
        b.iter(|| core.mark_bootstrap_complete())
    });

    group.bench_function("mark_invalid_id", |b| {
        b.iter(|| core.mark_milestone(black_box(Milestone::INVALID)))
    });

    group.finish();
}

fn bench_gc_pair(c: &mut Criterion) {
    let (core, collector) = core_with_collector();
    let mut group = c.benchmark_group("gc_cycle");
    group.throughput(Throughput::Elements(1));

    group.bench_function("no_observers", |b| {
        b.iter(|| collector.collect(black_box(GcKind::MINOR), GcFlags::NO))
    });

    core.observer_counts().increment(EntryType::Gc.index());
    core.setup_observers(|entry| {
        black_box(entry.duration());
    });
    group.bench_function("observed_and_drained", |b| {
        b.iter(|| {
            collector.collect(black_box(GcKind::MAJOR), GcFlags::NO);
            core.run_immediates()
        })
    });

    group.finish();
}

fn bench_record_delta(c: &mut Criterion) {
    let mut group = c.benchmark_group("histogram");

    for figures in [1u8, 3, 5] {
        let options = HistogramOptions {
            significant_figures: figures,
            ..HistogramOptions::EVENT_LOOP_DELAY
        };
        let mut histogram = Histogram::new(options).unwrap();
        let mut now = 0u64;

        group.bench_with_input(
            BenchmarkId::new("record_delta", figures),
            &figures,
            |b, _| {
                b.iter(|| {
                    now += 10_000_000 + (now % 7) * 1_000;
                    black_box(histogram.record_delta(now))
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_mark, bench_gc_pair, bench_record_delta);
criterion_main!(benches);
