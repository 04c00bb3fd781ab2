//! Activity Tracker: process-wide per-function request counters and
//! last-seen timestamps, guarded by a single lock that never crosses an
//! I/O call (§4.6).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// Per-function counters as observed at a point in time.
#[derive(Debug, Clone, Copy)]
pub struct FunctionStats {
    pub request_count: u64,
    pub last_request: Instant,
}

#[derive(Default)]
pub struct ActivityTracker {
    stats: Mutex<HashMap<String, FunctionStats>>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the entry if absent, bumps `request_count`, and refreshes
    /// `last_request` to now.
    pub fn increment(&self, external_id: &str) {
        let mut stats = self.stats.lock().unwrap();
        let entry = stats.entry(external_id.to_string()).or_insert(FunctionStats {
            request_count: 0,
            last_request: Instant::now(),
        });
        entry.request_count += 1;
        entry.last_request = Instant::now();
    }

    /// Zeroes `request_count`, preserving `last_request`. A no-op if the
    /// function has no entry yet.
    pub fn reset(&self, external_id: &str) {
        let mut stats = self.stats.lock().unwrap();
        if let Some(entry) = stats.get_mut(external_id) {
            entry.request_count = 0;
        }
    }

    /// Deep copy of the map; callers must not observe live entries.
    pub fn snapshot(&self) -> HashMap<String, FunctionStats> {
        self.stats.lock().unwrap().clone()
    }
}
