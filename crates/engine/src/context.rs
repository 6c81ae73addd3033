//! Shared state of one backup run.
//!
//! Every thread of the object capture stage holds a reference to the same
//! [`BackupContext`]. It carries the incremental base, the timestamp map that
//! becomes the new manifest, and the fail-fast abort signal.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tsvault_core::{Error, ObjectKey};
use tsvault_durability::IncrementalIndex;

/// State shared by the scanner, the fetch workers and the writer.
#[derive(Debug, Default)]
pub struct BackupContext {
    incremental: Option<IncrementalIndex>,
    timestamps: Mutex<HashMap<ObjectKey, i64>>,
    unchanged: AtomicU64,
    aborted: AtomicBool,
    first_error: Mutex<Option<Error>>,
}

impl BackupContext {
    /// Create a context, optionally comparing against a previous archive.
    pub fn new(incremental: Option<IncrementalIndex>) -> Self {
        BackupContext {
            incremental,
            ..Default::default()
        }
    }

    /// Whether this run is incremental
    pub fn is_incremental(&self) -> bool {
        self.incremental.is_some()
    }

    /// Whether the previous archive holds `key` with this exact mod time.
    pub fn is_unchanged(&self, key: &ObjectKey, mod_time_nanos: i64) -> bool {
        self.incremental
            .as_ref()
            .map_or(false, |index| index.is_unchanged(key, mod_time_nanos))
    }

    /// Count an object skipped as unchanged.
    pub fn note_unchanged(&self) {
        self.unchanged.fetch_add(1, Ordering::Relaxed);
    }

    /// Objects skipped as unchanged so far
    pub fn unchanged_count(&self) -> u64 {
        self.unchanged.load(Ordering::Relaxed)
    }

    /// Record the mod time of an object captured by this run.
    pub fn record_timestamp(&self, key: ObjectKey, mod_time_nanos: i64) {
        self.timestamps.lock().insert(key, mod_time_nanos);
    }

    /// Drain the recorded timestamps.
    pub fn take_timestamps(&self) -> HashMap<ObjectKey, i64> {
        std::mem::take(&mut *self.timestamps.lock())
    }

    /// Stop the run. The first error reported is the one returned.
    pub fn fail(&self, error: Error) {
        let mut slot = self.first_error.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
        self.aborted.store(true, Ordering::SeqCst);
    }

    /// Whether any stage has failed
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Take the first reported error, if any.
    pub fn take_error(&self) -> Option<Error> {
        self.first_error.lock().take()
    }
}
