//! BED summary output mirroring a bucket's alignment output.
//!
//! Each record written to a bucket is paired with one BED3 line: reference name, 0-based start
//! and end (start + reference span). Lines are tab delimited with no header. Records that are
//! not placed on a reference are written as `*`, `0`, `0` so that line `n` of the summary always
//! describes record `n` of the alignment output.

use std::borrow::Cow;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use noodles::sam::Header;
use serde::Serialize;

use crate::errors::{IoContext, Result};
use crate::record::AlignmentRecord;

/// Extension of summary files, replacing the alignment extension.
pub const SUMMARY_EXTENSION: &str = "bed";

/// Path of the summary file paired with an alignment output.
///
/// ```
/// use fgdemux_lib::summary::summary_path;
/// use std::path::Path;
///
/// assert_eq!(summary_path(Path::new("out/AAA.bam")), Path::new("out/AAA.bed"));
/// ```
#[must_use]
pub fn summary_path(primary: &Path) -> PathBuf {
    primary.with_extension(SUMMARY_EXTENSION)
}

/// One BED3 line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRecord<'h> {
    /// Reference sequence name, `*` when unplaced
    pub reference: Cow<'h, str>,
    /// 0-based start
    pub start: usize,
    /// 0-based exclusive end
    pub end: usize,
}

impl<'h> SummaryRecord<'h> {
    /// Describes `record`, resolving its reference name through `header`.
    pub fn from_record<R: AlignmentRecord>(record: &R, header: &'h Header) -> Self {
        match (record.reference_name(header), record.start()) {
            (Some(name), Some(start)) => Self {
                reference: String::from_utf8_lossy(name),
                start,
                end: start + record.alignment_span(),
            },
            _ => Self { reference: Cow::Borrowed("*"), start: 0, end: 0 },
        }
    }
}

/// Writer for one summary file.
pub struct SummaryWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl SummaryWriter {
    /// Creates (truncating) the summary file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        let writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_path(path)
            .map_err(io::Error::from)
            .io_context(|| format!("Failed to create BED output: {}", path.display()))?;
        Ok(Self { path: path.to_path_buf(), writer })
    }

    /// Appends the line describing `record`.
    ///
    /// # Errors
    /// Returns an error if the line cannot be written.
    pub fn write<R: AlignmentRecord>(&mut self, record: &R, header: &Header) -> Result<()> {
        let line = SummaryRecord::from_record(record, header);
        self.writer
            .serialize(&line)
            .map_err(io::Error::from)
            .io_context(|| format!("Failed to write BED output: {}", self.path.display()))
    }

    /// Flushes buffered lines to disk.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn finish(&mut self) -> Result<()> {
        self.writer
            .flush()
            .io_context(|| format!("Failed to flush BED output: {}", self.path.display()))
    }

    /// Path of the summary file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
