//! Custom error types for fgdemux operations.
//!
//! Errors fall into three categories (see [`ErrorCategory`]): configuration problems that are
//! detected before any record is processed, I/O failures on the source or on any output sink,
//! and data problems in the inputs. Configuration and I/O errors abort a run; data errors are
//! recoverable and are normally logged and skipped by the code that encounters them.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for fgdemux operations
pub type Result<T> = std::result::Result<T, DemuxError>;

/// Broad classification of a [`DemuxError`], used to report failures distinctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad options, missing metadata, missing output directory.
    Configuration,
    /// Failure reading the source or writing any output.
    Io,
    /// Malformed metadata rows and similar recoverable input problems.
    Data,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Configuration => "configuration error",
            ErrorCategory::Io => "I/O error",
            ErrorCategory::Data => "data error",
        };
        f.write_str(name)
    }
}

/// Error type for fgdemux operations
#[derive(Error, Debug)]
pub enum DemuxError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// Input file is missing or not usable
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFile {
        /// Type of file (e.g., "BAM", "Barcodes CSV")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Output directory is missing or not a directory
    #[error("Output directory '{}' does not exist or is not a directory", path.display())]
    MissingDirectory {
        /// The offending path
        path: PathBuf,
    },

    /// Alignment file extension is neither SAM nor BAM
    #[error("Unsupported alignment format for '{}': expected a .sam or .bam file", path.display())]
    UnsupportedFormat {
        /// The offending path
        path: PathBuf,
    },

    /// A barcode would write to the same file as the catch-all bucket
    #[error("Barcode '{barcode}' collides with the catch-all output name")]
    ReservedBarcode {
        /// The canonical barcode
        barcode: String,
    },

    /// More outputs than the process may keep open at once
    #[error(
        "Demultiplexing needs {required} open files but the open file limit is {available}; \
         raise it (e.g. `ulimit -n {required}`) or use fewer barcodes"
    )]
    TooManyOutputs {
        /// Files the run keeps open
        required: u64,
        /// The soft open file limit after trying to raise it
        available: u64,
    },

    /// A demultiplexing engine was asked to run a second time
    #[error("Demultiplexing engine cannot run again: it is {state}")]
    EngineAlreadyRun {
        /// The state the engine was left in
        state: String,
    },

    /// Failure opening, reading or writing a file
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted, including the path
        context: String,
        /// The underlying error
        #[source]
        source: io::Error,
    },

    /// Metadata row that cannot be used
    #[error("Malformed row {line} in '{}': {reason}", path.display())]
    MalformedRow {
        /// The metadata file
        path: PathBuf,
        /// 1-based line number of the row
        line: u64,
        /// Explanation of the problem
        reason: String,
    },
}

impl DemuxError {
    /// Wraps an I/O error with a description of what was being attempted.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        DemuxError::Io { context: context.into(), source }
    }

    /// The category this error belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            DemuxError::InvalidParameter { .. }
            | DemuxError::InvalidFile { .. }
            | DemuxError::MissingDirectory { .. }
            | DemuxError::UnsupportedFormat { .. }
            | DemuxError::ReservedBarcode { .. }
            | DemuxError::TooManyOutputs { .. }
            | DemuxError::EngineAlreadyRun { .. } => ErrorCategory::Configuration,
            DemuxError::Io { .. } => ErrorCategory::Io,
            DemuxError::MalformedRow { .. } => ErrorCategory::Data,
        }
    }

    /// Whether a run can continue after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.category() == ErrorCategory::Data
    }
}

/// Attaches context to `io::Result`s, producing [`DemuxError::Io`].
pub trait IoContext<T> {
    /// Converts the error, describing the failed operation with `f`.
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| DemuxError::io(f(), e))
    }
}
