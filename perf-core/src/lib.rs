pub mod error;

pub mod config;

pub mod logging;

pub mod clock;

pub mod constants;
pub use constants::{EntryType, GcFlags, GcKind, Milestone, constants};

pub mod state {
    pub mod region;
    pub use region::{MILESTONE_UNSET, RegionLayout, SharedStateRegion};

    pub mod performance;
    pub use performance::{PerformanceState, TimeOrigin};
}

pub mod entry;
pub use entry::{EntryDetail, PerformanceEntry};

pub mod dispatch;

pub mod immediate;
pub use immediate::{CallbackFlags, ImmediateQueue};

pub mod milestones;

pub mod gc;
pub use gc::{CollectorHooks, GcTracker, SimulatedCollector};

pub mod histogram;
pub use histogram::{Histogram, HistogramOptions, HistogramSample};

pub mod interval;
pub use interval::IntervalHistogram;

pub mod idle;
pub use idle::{IdleTimeProbe, IdleTimeSource};

pub mod binding;
pub use binding::{PerformanceCore, PerformanceCoreBuilder};

pub use error::{PerfError, PerfResult};
