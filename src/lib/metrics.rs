//! Per-barcode record counts written as a TSV metrics file.
//!
//! One row per catalog barcode in catalog order, followed by a `noise` row holding the
//! catch-all count.

use std::path::Path;

use anyhow::{Context, Result};
use fgoxide::io::DelimFile;
use serde::{Deserialize, Serialize};

use crate::barcode::CATCH_ALL_NAME;
use crate::demux::DemuxReport;

/// Records routed to one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeCountMetric {
    /// Canonical barcode, or `noise` for the catch-all
    pub barcode: String,
    /// Records written to the bucket
    pub records: u64,
}

impl BarcodeCountMetric {
    /// Builds the metric rows for a report, catch-all last.
    #[must_use]
    pub fn from_report(report: &DemuxReport) -> Vec<Self> {
        report
            .counts
            .iter()
            .map(|c| Self { barcode: c.barcode.clone(), records: c.count })
            .chain(std::iter::once(Self {
                barcode: CATCH_ALL_NAME.to_string(),
                records: report.catch_all,
            }))
            .collect()
    }
}

/// Write barcode count metrics to a TSV file with a header row.
///
/// # Errors
/// Returns an error if the file cannot be created or written to
pub fn write_metrics<P: AsRef<Path>>(path: P, metrics: &[BarcodeCountMetric]) -> Result<()> {
    let path_ref = path.as_ref();
    DelimFile::default()
        .write_tsv(&path_ref, metrics)
        .with_context(|| format!("Failed to write barcode count metrics: {}", path_ref.display()))
}
