//! Performance entries handed to the observer callback.

use compact_str::CompactString;
use serde::Serialize;

use crate::constants::{EntryType, GcFlags, GcKind};

/// Type-specific payload of an entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntryDetail {
    Gc { kind: GcKind, flags: GcFlags },
    Custom(serde_json::Value),
}

/// Immutable record describing one measured event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEntry {
    name: CompactString,
    entry_type: EntryType,
    start_time: f64,
    duration: f64,
    detail: Option<EntryDetail>,
}

impl PerformanceEntry {
    /// `start_time` is milliseconds relative to the time origin, `duration`
    /// is milliseconds.
    pub fn new(
        name: impl Into<CompactString>,
        entry_type: EntryType,
        start_time: f64,
        duration: f64,
    ) -> Self {
        Self {
            name: name.into(),
            entry_type,
            start_time,
            duration,
            detail: None,
        }
    }

    /// A `"gc"` entry carrying the collector kind and flags.
    pub fn gc(start_time: f64, duration: f64, kind: GcKind, flags: GcFlags) -> Self {
        Self::new(CompactString::const_new("gc"), EntryType::Gc, start_time, duration)
            .with_detail(EntryDetail::Gc { kind, flags })
    }

    #[must_use]
    pub fn with_detail(mut self, detail: EntryDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn detail(&self) -> Option<&EntryDetail> {
        self.detail.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gc_entry_serializes_detail() {
        let entry = PerformanceEntry::gc(1.5, 0.25, GcKind::MAJOR, GcFlags::FORCED);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["name"], "gc");
        assert_eq!(json["entryType"], "gc");
        assert_eq!(json["startTime"], 1.5);
        assert_eq!(json["detail"]["kind"], 4);
        assert_eq!(json["detail"]["flags"], 4);
    }

    #[test]
    fn test_custom_detail() {
        let entry = PerformanceEntry::new("lookup", EntryType::Dns, 0.0, 3.0)
            .with_detail(EntryDetail::Custom(serde_json::json!({ "host": "localhost" })));
        assert_eq!(entry.entry_type(), EntryType::Dns);
        assert!(matches!(entry.detail(), Some(EntryDetail::Custom(_))));
    }
}
