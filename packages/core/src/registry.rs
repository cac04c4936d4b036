//! In-memory registry of recent errors.
//!
//! `ErrorRegistry` keeps the most recent [`AppError`] values for the
//! running session. When full, the oldest entry is evicted before the new
//! one is inserted (ring-buffer semantics backed by `VecDeque`).
//!
//! The registry itself is not `Sync`; [`ErrorHandler`](crate::handler::ErrorHandler)
//! wraps it in a mutex so retries and form handlers can share it.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::failure::AppError;

/// Number of errors retained per session.
pub const DEFAULT_CAPACITY: usize = 10;

/// Capacity-bounded history of recent errors.
#[derive(Debug)]
pub struct ErrorRegistry {
    entries: VecDeque<AppError>,
    capacity: usize,
}

impl Default for ErrorRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ErrorRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an error, evicting the oldest when at capacity.
    pub fn record(&mut self, error: AppError) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(error);
    }

    /// All retained errors in insertion order, oldest first.
    pub fn list(&self) -> Vec<AppError> {
        self.entries.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&AppError> {
        self.entries.back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Remove the entry created at `timestamp`. No-op when absent.
    pub fn clear_one(&mut self, timestamp: DateTime<Utc>) {
        self.entries.retain(|e| e.timestamp() != timestamp);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
