//! Progress tracking utilities
//!
//! The demultiplexer is a sequential pipeline, so the tracker is a plain counter owned by the
//! engine. It logs a message each time the count crosses a multiple of the interval.

use log::info;

use crate::logging::format_count;

/// Default number of records between progress messages.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1_000_000;

/// Progress tracker for logging progress at regular intervals.
///
/// # Example
/// ```
/// use fgdemux_lib::progress::ProgressTracker;
///
/// let mut tracker = ProgressTracker::new("Processed records").with_interval(100);
/// for _ in 0..5 {
///     tracker.log_if_needed(50); // Logs at 100, 200
/// }
/// tracker.log_final(); // Logs "Processed records 250 (complete)"
/// ```
#[derive(Debug)]
pub struct ProgressTracker {
    interval: u64,
    message: String,
    count: u64,
}

impl ProgressTracker {
    /// Create a new progress tracker with the specified message and an interval of
    /// [`DEFAULT_PROGRESS_INTERVAL`].
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { interval: DEFAULT_PROGRESS_INTERVAL, message: message.into(), count: 0 }
    }

    /// Set the logging interval; an interval of 0 is treated as 1.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Add to the count and log once for every interval boundary crossed.
    ///
    /// Returns `true` if the count now sits exactly on a boundary.
    pub fn log_if_needed(&mut self, additional: u64) -> bool {
        let prev = self.count;
        self.count += additional;

        for i in (prev / self.interval + 1)..=(self.count / self.interval) {
            info!("{} {}", self.message, format_count(i * self.interval));
        }

        self.count > 0 && self.count.is_multiple_of(self.interval)
    }

    /// Log the final count unless the last boundary message already reported it.
    pub fn log_final(&self) {
        if self.count > 0 && !self.count.is_multiple_of(self.interval) {
            info!("{} {} (complete)", self.message, format_count(self.count));
        }
    }

    /// The current count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }
}
