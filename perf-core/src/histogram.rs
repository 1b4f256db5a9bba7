//! ``src/histogram.rs``
//! ============================================================================
//! # HDR histogram with delta recording
//!
//! Wraps [`hdrhistogram::Histogram`] with the bookkeeping the interval
//! sampler needs: the previous timestamp for [`Histogram::record_delta`] and
//! a count of values that fell outside the trackable range.
//!
//! All statistics read as `0` while the histogram is empty.

use hdrhistogram::Histogram as HdrHistogram;
use serde::{Deserialize, Serialize};

use crate::error::{PerfError, PerfResult};

/// Bounds and precision of a histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramOptions {
    /// Smallest discernible value. At least 1.
    pub lowest: u64,

    /// Largest trackable value. At least twice `lowest`.
    pub highest: u64,

    /// Significant decimal digits kept, 1 through 5.
    pub significant_figures: u8,
}

impl HistogramOptions {
    /// Bounds used by the event-loop delay monitor (values are nanoseconds).
    pub const EVENT_LOOP_DELAY: Self = Self {
        lowest: 1_000,
        highest: i64::MAX as u64,
        significant_figures: 3,
    };

    pub fn validate(&self) -> PerfResult<()> {
        if self.lowest < 1 {
            return Err(PerfError::invalid_argument("lowest", "must be at least 1"));
        }
        if self.highest < self.lowest.saturating_mul(2) {
            return Err(PerfError::invalid_argument(
                "highest",
                format!("must be at least twice lowest ({})", self.lowest),
            ));
        }
        if !(1..=5).contains(&self.significant_figures) {
            return Err(PerfError::invalid_argument(
                "significant_figures",
                "must be between 1 and 5",
            ));
        }
        Ok(())
    }
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self {
            lowest: 1,
            highest: i64::MAX as u64,
            significant_figures: 3,
        }
    }
}

/// Read view handed to sample callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramSample {
    /// Nanoseconds since the previous sample, `0` on the first.
    pub delta: u64,
    pub count: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub stddev: f64,
    pub exceeds: u64,
}

#[derive(Debug, Clone)]
pub struct Histogram {
    inner: HdrHistogram<u64>,
    options: HistogramOptions,
    prev: Option<u64>,
    exceeds: u64,
}

impl Histogram {
    pub fn new(options: HistogramOptions) -> PerfResult<Self> {
        options.validate()?;
        let inner = HdrHistogram::new_with_bounds(
            options.lowest,
            options.highest,
            options.significant_figures,
        )
        .map_err(|e| PerfError::invalid_argument("histogram", format!("{e:?}")))?;

        Ok(Self {
            inner,
            options,
            prev: None,
            exceeds: 0,
        })
    }

    pub fn options(&self) -> HistogramOptions {
        self.options
    }

    /// Record one value. Out-of-range values bump [`Self::exceeds`] instead.
    pub fn record(&mut self, value: u64) -> bool {
        match self.inner.record(value) {
            Ok(()) => true,
            Err(_) => {
                self.exceeds += 1;
                false
            }
        }
    }

    /// Record the time elapsed since the previous call.
    ///
    /// The first call after creation or [`Self::reset`] only stores `now`
    /// and returns `0`. A zero delta is not recorded.
    pub fn record_delta(&mut self, now: u64) -> u64 {
        let delta = match self.prev {
            Some(prev) => now.saturating_sub(prev),
            None => 0,
        };
        if delta > 0 {
            self.record(delta);
        }
        self.prev = Some(now);
        delta
    }

    pub fn count(&self) -> u64 {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn min(&self) -> u64 {
        if self.is_empty() { 0 } else { self.inner.min() }
    }

    pub fn max(&self) -> u64 {
        if self.is_empty() { 0 } else { self.inner.max() }
    }

    pub fn mean(&self) -> f64 {
        if self.is_empty() { 0.0 } else { self.inner.mean() }
    }

    pub fn stddev(&self) -> f64 {
        if self.is_empty() { 0.0 } else { self.inner.stdev() }
    }

    /// Number of values rejected as outside the trackable range.
    pub fn exceeds(&self) -> u64 {
        self.exceeds
    }

    /// Value at `percentile`, which must lie in `(0, 100]`.
    pub fn percentile(&self, percentile: f64) -> PerfResult<u64> {
        if !(percentile > 0.0 && percentile <= 100.0) {
            return Err(PerfError::invalid_argument(
                "percentile",
                format!("{percentile} is outside (0, 100]"),
            ));
        }
        Ok(self.inner.value_at_percentile(percentile))
    }

    /// `(percentile, value)` pairs in ascending percentile order, halving the
    /// remaining distance to 100 at each step.
    pub fn percentiles(&self) -> Vec<(f64, u64)> {
        if self.is_empty() {
            return vec![(100.0, 0)];
        }
        self.inner
            .iter_quantiles(1)
            .map(|v| (v.quantile_iterated_to() * 100.0, v.value_iterated_to()))
            .collect()
    }

    /// Merge `other` into this histogram.
    pub fn add(&mut self, other: &Histogram) -> PerfResult<()> {
        self.inner
            .add(&other.inner)
            .map_err(|e| PerfError::invalid_argument("histogram", format!("{e:?}")))?;
        self.exceeds += other.exceeds;
        Ok(())
    }

    /// Clear every statistic and forget the previous timestamp.
    pub fn reset(&mut self) {
        self.inner.reset();
        self.prev = None;
        self.exceeds = 0;
    }

    pub fn sample(&self, delta: u64) -> HistogramSample {
        HistogramSample {
            delta,
            count: self.count(),
            min: self.min(),
            max: self.max(),
            mean: self.mean(),
            stddev: self.stddev(),
            exceeds: self.exceeds,
        }
    }
}
