//! Fixed-capacity window of recent response statuses.

use std::collections::VecDeque;

/// Lowest status counted as a failure unless configured otherwise
pub const DEFAULT_ERROR_STATUS: u16 = 500;

/// FIFO window over the most recent status codes.
///
/// Keeps a running failure count so the rate is O(1).
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    entries: VecDeque<u16>,
    capacity: usize,
    error_status: u16,
    error_count: usize,
}

impl SlidingWindow {
    /// Window that counts statuses >= 500 as failures
    pub fn new(capacity: usize) -> Self {
        Self::with_error_status(capacity, DEFAULT_ERROR_STATUS)
    }

    /// Window with a custom failure boundary. A zero capacity is raised to one.
    pub fn with_error_status(capacity: usize, error_status: u16) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            error_status,
            error_count: 0,
        }
    }

    /// Append a status, evicting the oldest entry when full
    pub fn record(&mut self, status: u16) {
        if self.entries.len() == self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                if self.is_error(evicted) {
                    self.error_count -= 1;
                }
            }
        }

        if self.is_error(status) {
            self.error_count += 1;
        }
        self.entries.push_back(status);
    }

    /// Percentage of failures in the window, 0.0 when empty
    pub fn error_rate(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.error_count as f64 / self.entries.len() as f64 * 100.0
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() == self.capacity
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

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    fn is_error(&self, status: u16) -> bool {
        status >= self.error_status
    }
}
