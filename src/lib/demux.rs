//! The demultiplexing engine.
//!
//! [`DemuxEngine`] drives a run through the states of [`EngineState`]:
//!
//! ```text
//! Initializing -> Streaming -> Draining -> Reporting -> Done
//!       \______________\___________\___________\______-> Failed
//! ```
//!
//! While streaming, the engine reads up to `batch_size` records from a [`RecordSource`],
//! classifies each one, collects accepted records into one pending group per destination, and
//! then writes every non-empty group to its bucket. Groups are keyed in a `BTreeMap`, so within
//! a batch they are flushed in catalog order followed by the catch-all. Records within a group
//! keep their source order, and since one batch is fully flushed before the next is read, every
//! bucket receives its records in source order whatever the batch size.
//!
//! The pipeline is strictly sequential: there is one reader, one classifier and one writer per
//! bucket, and nothing runs concurrently.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, error, info};
use noodles::sam::Header;
use noodles::sam::alignment::RecordBuf;

use crate::bam_io::{AlignmentFormat, AlignmentReader, create_alignment_reader};
use crate::bucket::{BucketStore, Destination, KeyCount};
use crate::catalog::KeyCatalog;
use crate::classifier::{Outcome, RecordClassifier, RejectReason};
use crate::errors::{DemuxError, IoContext, Result};
use crate::progress::{DEFAULT_PROGRESS_INTERVAL, ProgressTracker};

/// Default number of records read per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1_048_576;

/// A source of alignment records read in batches.
pub trait RecordSource {
    /// Appends up to `max_records` records to `records` and returns how many were appended.
    ///
    /// Returning fewer than `max_records`, including zero, is allowed; zero means the source is
    /// exhausted.
    ///
    /// # Errors
    /// Returns an error if the source cannot be read.
    fn read_batch(&mut self, max_records: usize, records: &mut Vec<RecordBuf>) -> Result<usize>;
}

/// A SAM or BAM file opened as a record source.
pub struct AlignmentSource {
    path: PathBuf,
    reader: AlignmentReader,
    header: Header,
}

impl AlignmentSource {
    /// Opens `path` and reads its header.
    ///
    /// # Arguments
    /// * `path` - SAM or BAM file
    /// * `threads` - BGZF decompression threads (BAM only)
    ///
    /// # Errors
    /// Returns an error if the format is unsupported or the file cannot be opened.
    pub fn open(path: &Path, threads: usize) -> Result<Self> {
        let (reader, header) = create_alignment_reader(path, threads)?;
        Ok(Self { path: path.to_path_buf(), reader, header })
    }

    /// The source header.
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The source format; outputs are written in the same format.
    #[must_use]
    pub fn format(&self) -> AlignmentFormat {
        self.reader.format()
    }
}

impl RecordSource for AlignmentSource {
    fn read_batch(&mut self, max_records: usize, records: &mut Vec<RecordBuf>) -> Result<usize> {
        self.reader
            .read_batch(&self.header, max_records, records)
            .io_context(|| format!("Failed to read records from: {}", self.path.display()))
    }
}

/// An in-memory record source.
pub struct IterSource<I> {
    records: I,
}

impl<I: Iterator<Item = RecordBuf>> IterSource<I> {
    /// Wraps any collection or iterator of records.
    pub fn new<T: IntoIterator<IntoIter = I>>(records: T) -> Self {
        Self { records: records.into_iter() }
    }
}

impl<I: Iterator<Item = RecordBuf>> RecordSource for IterSource<I> {
    fn read_batch(&mut self, max_records: usize, records: &mut Vec<RecordBuf>) -> Result<usize> {
        let before = records.len();
        records.extend(self.records.by_ref().take(max_records));
        Ok(records.len() - before)
    }
}

/// Lifecycle of a demultiplexing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Catalog and buckets ready, nothing read yet
    Initializing,
    /// Reading, classifying and writing batches
    Streaming,
    /// Source exhausted, finishing outputs
    Draining,
    /// Building the final report
    Reporting,
    /// Run completed
    Done,
    /// Run aborted by an error
    Failed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tunables of the engine.
#[derive(Debug, Clone)]
pub struct DemuxOptions {
    /// Maximum records held in memory at once; must be at least 1.
    pub batch_size: usize,
    /// Records between progress messages.
    pub progress_interval: u64,
}

impl Default for DemuxOptions {
    fn default() -> Self {
        Self { batch_size: DEFAULT_BATCH_SIZE, progress_interval: DEFAULT_PROGRESS_INTERVAL }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemuxReport {
    /// Records per catalog barcode, in catalog order
    pub counts: Vec<KeyCount>,
    /// Records written to the catch-all
    pub catch_all: u64,
    /// Records read from the source
    pub records_read: u64,
    /// Records dropped for low mapping quality
    pub rejected_mapping_quality: u64,
    /// Records dropped for carrying a forbidden tag
    pub rejected_forbidden_tag: u64,
    /// Batches read
    pub batches: u64,
}

impl DemuxReport {
    /// Records dropped by the filter.
    #[must_use]
    pub fn records_rejected(&self) -> u64 {
        self.rejected_mapping_quality + self.rejected_forbidden_tag
    }

    /// Records that passed the filter.
    #[must_use]
    pub fn records_accepted(&self) -> u64 {
        self.records_read - self.records_rejected()
    }

    /// Records written to any bucket, the catch-all included.
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.counts.iter().map(|c| c.count).sum::<u64>() + self.catch_all
    }

    /// The count of one barcode, if it is in the catalog.
    #[must_use]
    pub fn count(&self, barcode: &str) -> Option<u64> {
        self.counts.iter().find(|c| c.barcode == barcode).map(|c| c.count)
    }
}

/// Routes records from a source into the buckets of a [`BucketStore`].
pub struct DemuxEngine<'c> {
    catalog: &'c KeyCatalog,
    classifier: RecordClassifier,
    store: BucketStore,
    options: DemuxOptions,
    state: EngineState,
}

impl<'c> DemuxEngine<'c> {
    /// Creates an engine over an initialized store.
    ///
    /// `store` must have been initialized from `catalog`.
    #[must_use]
    pub fn new(
        catalog: &'c KeyCatalog,
        classifier: RecordClassifier,
        store: BucketStore,
        options: DemuxOptions,
    ) -> Self {
        Self { catalog, classifier, store, options, state: EngineState::Initializing }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Demultiplexes every record of `source` and finishes all outputs.
    ///
    /// A successful run leaves the engine in [`EngineState::Done`]. On error the engine moves to
    /// [`EngineState::Failed`], and outputs written for earlier batches are left on disk. An
    /// engine runs once; later calls fail without touching `source`.
    ///
    /// # Errors
    /// Returns an error if the engine has already run, the source cannot be read or any output
    /// cannot be written.
    pub fn run<S: RecordSource>(&mut self, source: &mut S) -> Result<DemuxReport> {
        if self.state != EngineState::Initializing {
            return Err(DemuxError::EngineAlreadyRun { state: self.state.to_string() });
        }
        match self.drive(source) {
            Ok(report) => {
                self.transition(EngineState::Done);
                Ok(report)
            }
            Err(e) => {
                error!("Demultiplexing failed while {}: {e}", self.state);
                self.transition(EngineState::Failed);
                Err(e)
            }
        }
    }

    fn transition(&mut self, next: EngineState) {
        debug!("Engine state {} -> {}", self.state, next);
        self.state = next;
    }

    fn drive<S: RecordSource>(&mut self, source: &mut S) -> Result<DemuxReport> {
        let batch_size = self.options.batch_size.max(1);
        let mut report = DemuxReport::default();
        let mut progress =
            ProgressTracker::new("Processed records").with_interval(self.options.progress_interval);

        self.transition(EngineState::Streaming);
        let mut batch: Vec<RecordBuf> = Vec::new();
        loop {
            batch.clear();
            let loaded = source.read_batch(batch_size, &mut batch)?;
            if loaded == 0 {
                break;
            }
            report.batches += 1;
            report.records_read += loaded as u64;

            let pending = self.route(&mut batch, &mut report);
            for (destination, records) in &pending {
                self.store.write_group(*destination, records)?;
            }
            progress.log_if_needed(loaded as u64);
        }
        progress.log_final();

        self.transition(EngineState::Draining);
        self.store.finish()?;

        self.transition(EngineState::Reporting);
        report.counts = self.store.report();
        report.catch_all = self.store.catch_all_count();
        info!(
            "Demultiplexed {} records in {} batches into {} barcodes and the catch-all",
            report.records_read,
            report.batches,
            report.counts.len()
        );
        Ok(report)
    }

    /// Classifies a batch, moving accepted records into per-destination groups.
    fn route(
        &self,
        batch: &mut Vec<RecordBuf>,
        report: &mut DemuxReport,
    ) -> BTreeMap<Destination, Vec<RecordBuf>> {
        let mut pending: BTreeMap<Destination, Vec<RecordBuf>> = BTreeMap::new();
        for record in batch.drain(..) {
            let destination = match self.classifier.classify(&record) {
                Outcome::Rejected(RejectReason::LowMappingQuality) => {
                    report.rejected_mapping_quality += 1;
                    continue;
                }
                Outcome::Rejected(RejectReason::ForbiddenTag(_)) => {
                    report.rejected_forbidden_tag += 1;
                    continue;
                }
                Outcome::Routed(barcode) => self
                    .catalog
                    .lookup(&barcode)
                    .map_or(Destination::CatchAll, Destination::Barcode),
                Outcome::Unmatched => Destination::CatchAll,
            };
            pending.entry(destination).or_default().push(record);
        }
        pending
    }
}
