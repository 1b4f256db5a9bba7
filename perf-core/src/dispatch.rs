//! Routes performance entries to the single registered observer callback,
//! gated by the observer-interest counters in the shared region.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::trace;

use crate::{constants::EntryType, entry::PerformanceEntry, state::PerformanceState};

/// Callback invoked with every delivered entry.
pub type EntryCallback = Box<dyn Fn(&PerformanceEntry) + Send + Sync>;

pub struct NotificationDispatch {
    state: Arc<PerformanceState>,
    callback: ArcSwapOption<EntryCallback>,
}

impl NotificationDispatch {
    pub fn new(state: Arc<PerformanceState>) -> Self {
        Self {
            state,
            callback: ArcSwapOption::empty(),
        }
    }

    /// Register the observer callback. Replaces any previous one.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(&PerformanceEntry) + Send + Sync + 'static,
    {
        let callback: EntryCallback = Box::new(callback);
        self.callback.store(Some(Arc::new(callback)));
    }

    pub fn clear_callback(&self) {
        self.callback.store(None);
    }

    pub fn has_callback(&self) -> bool {
        self.callback.load().is_some()
    }

    /// Deliver `entry` if the counter for `entry_type` is nonzero.
    ///
    /// Returns whether the callback ran. Out-of-range identifiers and a
    /// missing callback drop the entry.
    pub fn notify_id(&self, entry_type: usize, entry: &PerformanceEntry) -> bool {
        if self.state.region().observer_count(entry_type) == 0 {
            return false;
        }

        // Loaded in full so the callback may replace itself while running.
        let Some(callback) = self.callback.load_full() else {
            trace!(entry_type, "no observer callback registered, dropping entry");
            return false;
        };

        callback(entry);
        true
    }

    pub fn notify(&self, entry_type: EntryType, entry: &PerformanceEntry) -> bool {
        self.notify_id(entry_type.index(), entry)
    }

    /// Binding-layer form keyed by entry-type name.
    pub fn notify_named(&self, entry_type: &str, entry: &PerformanceEntry) -> bool {
        match EntryType::from_name(entry_type) {
            Some(entry_type) => self.notify(entry_type, entry),
            None => false,
        }
    }
}

impl std::fmt::Debug for NotificationDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatch")
            .field("has_callback", &self.has_callback())
            .finish()
    }
}
