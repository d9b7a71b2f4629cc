//! SAM/BAM record utilities.
//!
//! - [`builder`] - Fluent construction of records, headers and small alignment files for tests

pub mod builder;

pub use builder::{
    RecordBuilder, create_test_header, parse_cigar, read_alignment_file, write_alignment_file,
};
