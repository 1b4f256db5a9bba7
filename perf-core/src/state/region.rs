//! `region.rs`
//!
//! Fixed-layout shared state region: milestone timestamps plus per-entry-type
//! observer counters.
//!
//! Architecture:
//! - single native writer, any number of readers, no locks
//! - every slot is an individual atomic so a reader never observes undefined
//!   memory; cross-slot consistency is not guaranteed and not needed
//! - views hand out the backing slices directly so external readers poll the
//!   values without going through per-field calls
//! - out-of-range identifiers (including `INVALID`) are silent no-ops

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{EntryType, Milestone},
    error::{PerfError, PerfResult},
};

/// Sentinel stored in unset milestone slots.
pub const MILESTONE_UNSET: f64 = -1.0;

const REGION_MAGIC: u32 = 0x4652_4550; // "PERF"
const REGION_VERSION: u32 = 1;
const HEADER_LEN: usize = std::mem::size_of::<RegionHeader>();

/// Root marker written at the front of every saved block.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct RegionHeader {
    magic: u32,
    version: u32,
    milestone_count: u32,
    observer_count: u32,
}

impl RegionHeader {
    fn for_layout(layout: RegionLayout) -> Self {
        Self {
            magic: REGION_MAGIC.to_le(),
            version: REGION_VERSION.to_le(),
            milestone_count: (layout.milestone_count as u32).to_le(),
            observer_count: (layout.observer_count as u32).to_le(),
        }
    }

    fn from_le(self) -> Self {
        Self {
            magic: u32::from_le(self.magic),
            version: u32::from_le(self.version),
            milestone_count: u32::from_le(self.milestone_count),
            observer_count: u32::from_le(self.observer_count),
        }
    }
}

/// Lengths of the two arrays and the size of a saved block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionLayout {
    pub milestone_count: usize,
    pub observer_count: usize,
}

impl RegionLayout {
    /// Size in bytes of the serialized block for this layout.
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        HEADER_LEN
            + self.milestone_count * std::mem::size_of::<u64>()
            + self.observer_count * std::mem::size_of::<u32>()
    }
}

/// Lock-free shared state region.
#[derive(Debug)]
pub struct SharedStateRegion {
    /// Milestone timestamps in nanoseconds, stored as `f64` bit patterns.
    milestones: Box<[AtomicU64]>,

    /// Observer-interest counters, one per entry type.
    observers: Box<[AtomicU32]>,
}

impl SharedStateRegion {
    /// Allocate a region with every milestone unset and every counter at zero.
    pub fn new(milestone_count: usize, entry_type_count: usize) -> Self {
        let milestones = (0..milestone_count)
            .map(|_| AtomicU64::new(MILESTONE_UNSET.to_bits()))
            .collect();
        let observers = (0..entry_type_count).map(|_| AtomicU32::new(0)).collect();

        Self {
            milestones,
            observers,
        }
    }

    /// Region sized for the built-in milestone and entry-type tables.
    pub fn with_defaults() -> Self {
        Self::new(Milestone::COUNT, EntryType::COUNT)
    }

    pub fn layout(&self) -> RegionLayout {
        RegionLayout {
            milestone_count: self.milestones.len(),
            observer_count: self.observers.len(),
        }
    }

    /// Store a timestamp. Last write wins.
    #[inline]
    pub fn mark(&self, milestone: usize, timestamp_ns: u64) {
        if let Some(slot) = self.milestones.get(milestone) {
            slot.store((timestamp_ns as f64).to_bits(), Ordering::Relaxed);
        }
    }

    /// Stored timestamp, or `None` for an out-of-range identifier.
    #[inline]
    pub fn milestone(&self, milestone: usize) -> Option<f64> {
        self.milestones
            .get(milestone)
            .map(|slot| f64::from_bits(slot.load(Ordering::Relaxed)))
    }

    /// Observer count for an entry type; `0` for out-of-range identifiers.
    #[inline]
    pub fn observer_count(&self, entry_type: usize) -> u32 {
        self.observers
            .get(entry_type)
            .map_or(0, |slot| slot.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_observer_count(&self, entry_type: usize, count: u32) {
        if let Some(slot) = self.observers.get(entry_type) {
            slot.store(count, Ordering::Relaxed);
        }
    }

    /// Reset every milestone to the sentinel.
    ///
    /// Must run after [`Self::deserialize`]: timestamps from another process
    /// are meaningless against this process's monotonic clock.
    pub fn reset_milestones(&self) {
        for slot in self.milestones.iter() {
            slot.store(MILESTONE_UNSET.to_bits(), Ordering::Relaxed);
        }
    }

    pub fn milestones(&self) -> MilestonesView<'_> {
        MilestonesView(&self.milestones)
    }

    pub fn observer_counts(&self) -> ObserverCountsView<'_> {
        ObserverCountsView(&self.observers)
    }

    /// Save the raw block: header, milestone bits, observer counters.
    pub fn serialize(&self) -> Vec<u8> {
        let layout = self.layout();
        let mut out = Vec::with_capacity(layout.byte_len());

        out.extend_from_slice(bytemuck::bytes_of(&RegionHeader::for_layout(layout)));

        let milestones: Vec<u64> = self
            .milestones
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed).to_le())
            .collect();
        out.extend_from_slice(bytemuck::cast_slice(milestones.as_slice()));

        let observers: Vec<u32> = self
            .observers
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed).to_le())
            .collect();
        out.extend_from_slice(bytemuck::cast_slice(observers.as_slice()));

        out
    }

    /// Restore a block produced by [`Self::serialize`].
    ///
    /// Milestone values are restored verbatim; the owner is expected to call
    /// [`Self::reset_milestones`] before using them.
    pub fn deserialize(bytes: &[u8]) -> PerfResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(PerfError::snapshot(format!(
                "block of {} bytes is shorter than the {HEADER_LEN}-byte header",
                bytes.len()
            )));
        }

        let header = bytemuck::pod_read_unaligned::<RegionHeader>(&bytes[..HEADER_LEN]).from_le();
        if header.magic != REGION_MAGIC {
            return Err(PerfError::snapshot(format!(
                "bad root marker {:#010x}",
                header.magic
            )));
        }
        if header.version != REGION_VERSION {
            return Err(PerfError::snapshot(format!(
                "unsupported layout version {}",
                header.version
            )));
        }

        let layout = RegionLayout {
            milestone_count: header.milestone_count as usize,
            observer_count: header.observer_count as usize,
        };
        if bytes.len() != layout.byte_len() {
            return Err(PerfError::snapshot(format!(
                "expected {} bytes for {layout:?}, got {}",
                layout.byte_len(),
                bytes.len()
            )));
        }

        let (milestone_bytes, observer_bytes) =
            bytes[HEADER_LEN..].split_at(layout.milestone_count * std::mem::size_of::<u64>());

        let milestones = milestone_bytes
            .chunks_exact(std::mem::size_of::<u64>())
            .map(|chunk| AtomicU64::new(u64::from_le(bytemuck::pod_read_unaligned(chunk))))
            .collect();
        let observers = observer_bytes
            .chunks_exact(std::mem::size_of::<u32>())
            .map(|chunk| AtomicU32::new(u32::from_le(bytemuck::pod_read_unaligned(chunk))))
            .collect();

        Ok(Self {
            milestones,
            observers,
        })
    }
}

impl Default for SharedStateRegion {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Zero-copy read view over the milestone array.
#[derive(Debug, Clone, Copy)]
pub struct MilestonesView<'a>(&'a [AtomicU64]);

impl MilestonesView<'_> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.0
            .get(index)
            .map(|slot| f64::from_bits(slot.load(Ordering::Relaxed)))
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.0
            .iter()
            .map(|slot| f64::from_bits(slot.load(Ordering::Relaxed)))
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().collect()
    }
}

/// Zero-copy view over the observer counters.
///
/// The external layer owns subscription bookkeeping, so this view is
/// writable.
#[derive(Debug, Clone, Copy)]
pub struct ObserverCountsView<'a>(&'a [AtomicU32]);

impl ObserverCountsView<'_> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        self.0.get(index).map(|slot| slot.load(Ordering::Relaxed))
    }

    pub fn set(&self, index: usize, count: u32) {
        if let Some(slot) = self.0.get(index) {
            slot.store(count, Ordering::Relaxed);
        }
    }

    pub fn increment(&self, index: usize) {
        if let Some(slot) = self.0.get(index) {
            slot.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Saturates at zero.
    pub fn decrement(&self, index: usize) {
        if let Some(slot) = self.0.get(index) {
            let _ = slot.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        }
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.0.iter().map(|slot| slot.load(Ordering::Relaxed)).collect()
    }
}
