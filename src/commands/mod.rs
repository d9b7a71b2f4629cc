//! CLI command implementations for fgdemux.
//!
//! - [`demux`] - Split a SAM/BAM file into one file per cell barcode

#![allow(clippy::missing_errors_doc, clippy::uninlined_format_args)]

pub mod command;
pub mod demux;
