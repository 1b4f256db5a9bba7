//! Closed identifier tables shared with the binding layer.
//!
//! Milestone and entry-type identifiers index the shared state region
//! directly, so their numeric values are part of the external contract.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Named, one-shot lifecycle timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u32)]
pub enum Milestone {
    TimeOrigin = 0,
    TimeOriginTimestamp = 1,
    Environment = 2,
    ProcessStart = 3,
    EngineStart = 4,
    LoopStart = 5,
    LoopExit = 6,
    BootstrapComplete = 7,
}

impl Milestone {
    /// Number of defined milestones; also the `INVALID` identifier.
    pub const COUNT: usize = 8;
    pub const INVALID: usize = Self::COUNT;

    pub const ALL: [Self; Self::COUNT] = [
        Self::TimeOrigin,
        Self::TimeOriginTimestamp,
        Self::Environment,
        Self::ProcessStart,
        Self::EngineStart,
        Self::LoopStart,
        Self::LoopExit,
        Self::BootstrapComplete,
    ];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Symbolic name used in trace events.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TimeOrigin => "timeOrigin",
            Self::TimeOriginTimestamp => "timeOriginTimestamp",
            Self::Environment => "environment",
            Self::ProcessStart => "processStart",
            Self::EngineStart => "engineStart",
            Self::LoopStart => "loopStart",
            Self::LoopExit => "loopExit",
            Self::BootstrapComplete => "bootstrapComplete",
        }
    }

    const fn constant_name(self) -> &'static str {
        match self {
            Self::TimeOrigin => "PERFORMANCE_MILESTONE_TIME_ORIGIN",
            Self::TimeOriginTimestamp => "PERFORMANCE_MILESTONE_TIME_ORIGIN_TIMESTAMP",
            Self::Environment => "PERFORMANCE_MILESTONE_ENVIRONMENT",
            Self::ProcessStart => "PERFORMANCE_MILESTONE_PROCESS_START",
            Self::EngineStart => "PERFORMANCE_MILESTONE_ENGINE_START",
            Self::LoopStart => "PERFORMANCE_MILESTONE_LOOP_START",
            Self::LoopExit => "PERFORMANCE_MILESTONE_LOOP_EXIT",
            Self::BootstrapComplete => "PERFORMANCE_MILESTONE_BOOTSTRAP_COMPLETE",
        }
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Categories of performance entries external code can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum EntryType {
    Gc = 0,
    Http = 1,
    Http2 = 2,
    Net = 3,
    Dns = 4,
}

impl EntryType {
    /// Number of defined entry types; also the `INVALID` identifier.
    pub const COUNT: usize = 5;
    pub const INVALID: usize = Self::COUNT;

    pub const ALL: [Self; Self::COUNT] = [Self::Gc, Self::Http, Self::Http2, Self::Net, Self::Dns];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gc => "gc",
            Self::Http => "http",
            Self::Http2 => "http2",
            Self::Net => "net",
            Self::Dns => "dns",
        }
    }

    /// Unknown names map to `None`, which callers treat as `INVALID`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    const fn constant_name(self) -> &'static str {
        match self {
            Self::Gc => "PERFORMANCE_ENTRY_TYPE_GC",
            Self::Http => "PERFORMANCE_ENTRY_TYPE_HTTP",
            Self::Http2 => "PERFORMANCE_ENTRY_TYPE_HTTP2",
            Self::Net => "PERFORMANCE_ENTRY_TYPE_NET",
            Self::Dns => "PERFORMANCE_ENTRY_TYPE_DNS",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Collector cycle kind as reported by the collector's hooks.
///
/// `0` is reserved for "no cycle in progress" and is never a valid kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GcKind(pub u32);

impl GcKind {
    pub const NONE: Self = Self(0);
    pub const MINOR: Self = Self(1);
    pub const MAJOR: Self = Self(4);
    pub const INCREMENTAL: Self = Self(8);
    pub const WEAKCB: Self = Self(16);

    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// Collector callback flags attached to the end of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GcFlags(pub u32);

impl GcFlags {
    pub const NO: Self = Self(0);
    pub const CONSTRUCT_RETAINED: Self = Self(1 << 1);
    pub const FORCED: Self = Self(1 << 2);
    pub const SYNCHRONOUS_PHANTOM_PROCESSING: Self = Self(1 << 3);
    pub const ALL_AVAILABLE_GARBAGE: Self = Self(1 << 4);
    pub const ALL_EXTERNAL_MEMORY: Self = Self(1 << 5);
    pub const SCHEDULE_IDLE: Self = Self(1 << 6);

    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for GcFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Constants table handed to the binding layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Constants {
    pub gc_kinds: BTreeMap<&'static str, u32>,
    pub gc_flags: BTreeMap<&'static str, u32>,
    pub entry_types: BTreeMap<&'static str, u32>,
    pub milestones: BTreeMap<&'static str, u32>,
}

/// Build the full constants table.
#[must_use]
pub fn constants() -> Constants {
    let gc_kinds = BTreeMap::from([
        ("PERFORMANCE_GC_MAJOR", GcKind::MAJOR.bits()),
        ("PERFORMANCE_GC_MINOR", GcKind::MINOR.bits()),
        ("PERFORMANCE_GC_INCREMENTAL", GcKind::INCREMENTAL.bits()),
        ("PERFORMANCE_GC_WEAKCB", GcKind::WEAKCB.bits()),
    ]);

    let gc_flags = BTreeMap::from([
        ("PERFORMANCE_GC_FLAGS_NO", GcFlags::NO.bits()),
        (
            "PERFORMANCE_GC_FLAGS_CONSTRUCT_RETAINED",
            GcFlags::CONSTRUCT_RETAINED.bits(),
        ),
        ("PERFORMANCE_GC_FLAGS_FORCED", GcFlags::FORCED.bits()),
        (
            "PERFORMANCE_GC_FLAGS_SYNCHRONOUS_PHANTOM_PROCESSING",
            GcFlags::SYNCHRONOUS_PHANTOM_PROCESSING.bits(),
        ),
        (
            "PERFORMANCE_GC_FLAGS_ALL_AVAILABLE_GARBAGE",
            GcFlags::ALL_AVAILABLE_GARBAGE.bits(),
        ),
        (
            "PERFORMANCE_GC_FLAGS_ALL_EXTERNAL_MEMORY",
            GcFlags::ALL_EXTERNAL_MEMORY.bits(),
        ),
        (
            "PERFORMANCE_GC_FLAGS_SCHEDULE_IDLE",
            GcFlags::SCHEDULE_IDLE.bits(),
        ),
    ]);

    let mut entry_types: BTreeMap<&'static str, u32> = EntryType::ALL
        .into_iter()
        .map(|t| (t.constant_name(), t.index() as u32))
        .collect();
    entry_types.insert("PERFORMANCE_ENTRY_TYPE_INVALID", EntryType::INVALID as u32);

    let mut milestones: BTreeMap<&'static str, u32> = Milestone::ALL
        .into_iter()
        .map(|m| (m.constant_name(), m.index() as u32))
        .collect();
    milestones.insert("PERFORMANCE_MILESTONE_INVALID", Milestone::INVALID as u32);

    Constants {
        gc_kinds,
        gc_flags,
        entry_types,
        milestones,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_milestone_indices_are_dense() {
        for (i, m) in Milestone::ALL.into_iter().enumerate() {
            assert_eq!(m.index(), i);
            assert_eq!(Milestone::from_index(i), Some(m));
        }
        assert_eq!(Milestone::from_index(Milestone::INVALID), None);
    }

    #[test]
    fn test_entry_type_name_lookup() {
        assert_eq!(EntryType::from_name("gc"), Some(EntryType::Gc));
        assert_eq!(EntryType::from_name("http2"), Some(EntryType::Http2));
        assert_eq!(EntryType::from_name("function"), None);
    }

    #[test]
    fn test_gc_flags_contains() {
        let flags = GcFlags::FORCED | GcFlags::SCHEDULE_IDLE;
        assert!(flags.contains(GcFlags::FORCED));
        assert!(!flags.contains(GcFlags::CONSTRUCT_RETAINED));
        assert_eq!(flags.bits(), 68);
    }

    #[test]
    fn test_constants_table() {
        let table = constants();
        assert_eq!(table.gc_kinds["PERFORMANCE_GC_MAJOR"], 4);
        assert_eq!(table.gc_kinds["PERFORMANCE_GC_MINOR"], 1);
        assert_eq!(table.gc_flags.len(), 7);
        assert_eq!(table.entry_types["PERFORMANCE_ENTRY_TYPE_GC"], 0);
        assert_eq!(table.entry_types["PERFORMANCE_ENTRY_TYPE_INVALID"], 5);
        assert_eq!(
            table.milestones["PERFORMANCE_MILESTONE_BOOTSTRAP_COMPLETE"],
            Milestone::BootstrapComplete as u32
        );
    }
}
