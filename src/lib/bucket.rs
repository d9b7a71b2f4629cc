//! Output buckets: one per catalog barcode plus the catch-all.
//!
//! The [`BucketStore`] is an arena that owns every output sink for the lifetime of a run. All
//! sinks are created up front, with the source header forwarded, so every bucket produces a
//! valid (possibly empty) alignment file. Buckets are addressed by [`Destination`]; catalog
//! buckets are indexed by the catalog's [`BucketId`].
//!
//! Since every sink stays open, a store needs one file descriptor per output (two with BED
//! summaries). [`BucketStore::initialize`] raises the soft open file limit as needed and fails
//! with [`DemuxError::TooManyOutputs`] before creating any file if the limit cannot cover the run.

use std::path::{Path, PathBuf};

use log::debug;
use noodles::sam::Header;
use noodles::sam::alignment::RecordBuf;

use crate::bam_io::{AlignmentFormat, AlignmentWriter, create_alignment_writer};
use crate::barcode::CATCH_ALL_NAME;
use crate::catalog::{BucketId, KeyCatalog};
use crate::errors::{DemuxError, IoContext, Result};
use crate::summary::{SummaryWriter, summary_path};

/// File descriptors kept free for the source, the metrics file and the standard streams.
pub const RESERVED_FILE_DESCRIPTORS: u64 = 32;

/// Number of files a run over `barcodes` catalog barcodes keeps open, reserve included.
///
/// ```
/// use fgdemux_lib::bucket::{RESERVED_FILE_DESCRIPTORS, required_open_files};
///
/// assert_eq!(required_open_files(2_000, false), 2_001 + RESERVED_FILE_DESCRIPTORS);
/// assert_eq!(required_open_files(2_000, true), 4_002 + RESERVED_FILE_DESCRIPTORS);
/// ```
#[must_use]
pub fn required_open_files(barcodes: usize, mirror: bool) -> u64 {
    let per_bucket = if mirror { 2 } else { 1 };
    (barcodes as u64 + 1) * per_bucket + RESERVED_FILE_DESCRIPTORS
}

/// Checks that `available` open files cover `required`.
///
/// # Errors
/// Returns [`DemuxError::TooManyOutputs`] if they do not.
pub fn check_open_file_limit(required: u64, available: u64) -> Result<()> {
    if available < required {
        return Err(DemuxError::TooManyOutputs { required, available });
    }
    Ok(())
}

/// Raises the soft open file limit toward `required` (never past the hard limit) and checks
/// the result; returns the limit in effect.
///
/// # Errors
/// Returns an error if the limit cannot be queried or is still below `required`.
pub fn ensure_open_file_limit(required: u64) -> Result<u64> {
    let available = rlimit::increase_nofile_limit(required)
        .io_context(|| "Failed to raise the open file limit")?;
    check_open_file_limit(required, available)?;
    debug!("Open file limit is {available}, {required} needed");
    Ok(available)
}

/// Where a group of records is written.
///
/// Ordered so that catalog buckets sort by id and the catch-all sorts last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Destination {
    /// The bucket of a catalog barcode
    Barcode(BucketId),
    /// The catch-all bucket
    CatchAll,
}

/// Final count of one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCount {
    /// Canonical barcode
    pub barcode: String,
    /// Records written to the bucket
    pub count: u64,
}

struct Bucket {
    name: String,
    path: PathBuf,
    writer: AlignmentWriter,
    summary: Option<SummaryWriter>,
    count: u64,
}

impl Bucket {
    fn open(
        name: &str,
        path: &Path,
        header: &Header,
        format: AlignmentFormat,
        mirror: bool,
    ) -> Result<Self> {
        let writer = create_alignment_writer(path, format, header)?;
        let summary =
            if mirror { Some(SummaryWriter::create(&summary_path(path))?) } else { None };
        Ok(Self { name: name.to_string(), path: path.to_path_buf(), writer, summary, count: 0 })
    }

    fn write(&mut self, header: &Header, records: &[RecordBuf]) -> Result<()> {
        for record in records {
            self.writer
                .write_record(header, record)
                .io_context(|| format!("Failed to write records to: {}", self.path.display()))?;
            if let Some(summary) = self.summary.as_mut() {
                summary.write(record, header)?;
            }
        }
        self.count += records.len() as u64;
        Ok(())
    }

    fn finish(&mut self, header: &Header) -> Result<()> {
        self.writer
            .finish(header)
            .io_context(|| format!("Failed to finish output: {}", self.path.display()))?;
        if let Some(summary) = self.summary.as_mut() {
            summary.finish()?;
        }
        Ok(())
    }
}

/// Owner of all output sinks and their counters.
pub struct BucketStore {
    header: Header,
    buckets: Vec<Bucket>,
    catch_all: Bucket,
    finished: bool,
}

impl BucketStore {
    /// Creates one bucket per catalog entry plus the catch-all.
    ///
    /// Every output file is created (truncated) and receives `header` before this returns.
    ///
    /// # Arguments
    /// * `catalog` - Target barcodes and their output paths
    /// * `header` - Header forwarded to every output
    /// * `format` - Format of every output
    /// * `mirror` - Also write a BED summary next to every output
    ///
    /// # Errors
    /// Returns an error if the open file limit is too low for every output, in which case no
    /// file is created, or if any output cannot be created.
    pub fn initialize(
        catalog: &KeyCatalog,
        header: Header,
        format: AlignmentFormat,
        mirror: bool,
    ) -> Result<Self> {
        ensure_open_file_limit(required_open_files(catalog.len(), mirror))?;

        let mut buckets = Vec::with_capacity(catalog.len());
        for (id, entry) in catalog.iter() {
            debug_assert_eq!(id.index(), buckets.len());
            buckets.push(Bucket::open(&entry.barcode, &entry.output, &header, format, mirror)?);
        }
        let catch_all =
            Bucket::open(CATCH_ALL_NAME, &catalog.catch_all_path(), &header, format, mirror)?;
        debug!("Opened {} barcode outputs and the catch-all output", buckets.len());

        Ok(Self { header, buckets, catch_all, finished: false })
    }

    /// Appends `records`, in order, to a bucket and its summary; returns the number written.
    ///
    /// # Errors
    /// Returns an error if any write fails.
    ///
    /// # Panics
    /// Panics if `destination` names a bucket id not from the catalog this store was built with.
    pub fn write_group(&mut self, destination: Destination, records: &[RecordBuf]) -> Result<u64> {
        let bucket = match destination {
            Destination::Barcode(id) => &mut self.buckets[id.index()],
            Destination::CatchAll => &mut self.catch_all,
        };
        bucket.write(&self.header, records)?;
        Ok(records.len() as u64)
    }

    /// Finishes every output: BGZF EOF blocks are written and buffers flushed.
    ///
    /// Calling this more than once has no further effect.
    ///
    /// # Errors
    /// Returns an error if any output cannot be finished.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        for bucket in &mut self.buckets {
            bucket.finish(&self.header)?;
        }
        self.catch_all.finish(&self.header)?;
        self.finished = true;
        Ok(())
    }

    /// Counts of the catalog buckets, in catalog order. The catch-all is not included.
    #[must_use]
    pub fn report(&self) -> Vec<KeyCount> {
        self.buckets
            .iter()
            .map(|b| KeyCount { barcode: b.name.clone(), count: b.count })
            .collect()
    }

    /// Records written to the catch-all bucket.
    #[must_use]
    pub fn catch_all_count(&self) -> u64 {
        self.catch_all.count
    }

    /// Records written to one bucket.
    #[must_use]
    pub fn count(&self, destination: Destination) -> u64 {
        match destination {
            Destination::Barcode(id) => self.buckets[id.index()].count,
            Destination::CatchAll => self.catch_all.count,
        }
    }

    /// Number of catalog buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// True if there are no catalog buckets (the catch-all always exists).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// The header forwarded to every output.
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }
}
