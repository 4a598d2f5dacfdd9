//! Human-readable activity feed

use std::collections::VecDeque;

use shared::ActivityEntry;

/// Number of entries kept in the displayed window
pub const ACTIVITY_WINDOW: usize = 10;

/// Newest-first window of recent studio events
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(ACTIVITY_WINDOW)
    }
}

impl ActivityLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Restore a persisted window, newest first
    pub fn from_entries(entries: Vec<ActivityEntry>) -> Self {
        let mut log = Self::default();
        log.entries = entries.into_iter().take(log.capacity).collect();
        log
    }

    pub fn record(&mut self, message: impl Into<String>) -> ActivityEntry {
        let entry = ActivityEntry::new(message);
        self.entries.push_front(entry.clone());
        self.entries.truncate(self.capacity);
        entry
    }

    /// Entries newest first
    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
