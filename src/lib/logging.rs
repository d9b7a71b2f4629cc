//! Logging utilities for formatted output.
//!
//! Count, duration and rate formatting, the operation timer, and the end-of-run barcode count
//! report.

use std::time::{Duration, Instant};

use log::info;

use crate::barcode::CATCH_ALL_NAME;
use crate::demux::DemuxReport;

/// Formats a count with thousands separators.
///
/// ```
/// use fgdemux_lib::logging::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(1_048_576), "1,048,576");
/// ```
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Formats a fraction (0.0-1.0) as a percentage with `decimals` decimal places.
///
/// ```
/// use fgdemux_lib::logging::format_percent;
///
/// assert_eq!(format_percent(0.9543, 2), "95.43%");
/// ```
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", value * 100.0, decimals = decimals)
}

/// Formats a duration in human-readable form (e.g., "45s", "2m 15s", "1h 30m").
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        if remaining_secs == 0 { format!("{mins}m") } else { format!("{mins}m {remaining_secs}s") }
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins == 0 { format!("{hours}h") } else { format!("{hours}h {mins}m") }
    }
}

/// Formats a processing rate in records per second.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_rate(count: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} records/s", format_count(count));
    }
    format!("{} records/s", format_count((count as f64 / secs) as u64))
}

/// Logs the per-barcode counts and a filtering summary.
///
/// # Examples
///
/// ```no_run
/// use fgdemux_lib::demux::DemuxReport;
/// use fgdemux_lib::logging::log_barcode_report;
///
/// log_barcode_report(&DemuxReport::default());
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn log_barcode_report(report: &DemuxReport) {
    info!("Barcode count report:");
    for count in &report.counts {
        info!("  {}: {}", count.barcode, format_count(count.count));
    }
    info!("  {} (catch-all): {}", CATCH_ALL_NAME, format_count(report.catch_all));

    info!("Records read: {}", format_count(report.records_read));
    info!(
        "Filtered out {} records with mapping quality below the minimum.",
        format_count(report.rejected_mapping_quality)
    );
    info!(
        "Filtered out {} records carrying a forbidden tag.",
        format_count(report.rejected_forbidden_tag)
    );
    if report.records_accepted() > 0 {
        let matched = report.records_written() - report.catch_all;
        let fraction = matched as f64 / report.records_accepted() as f64;
        info!("Records matching a target barcode: {}", format_percent(fraction, 2));
    }
}

/// Operation timing helper.
///
/// ```no_run
/// use fgdemux_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Demultiplexing");
/// // ... do work ...
/// timer.log_completion(10_000);
/// ```
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    /// Creates a new operation timer and logs the start.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Logs the completion with record count and rate.
    pub fn log_completion(&self, count: u64) {
        let duration = self.start_time.elapsed();
        info!(
            "{} completed: {} records in {} ({})",
            self.operation,
            format_count(count),
            format_duration(duration),
            format_rate(count, duration)
        );
    }
}
