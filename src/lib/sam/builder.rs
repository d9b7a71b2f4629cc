//! Builders for creating test SAM/BAM records and files.
//!
//! ```rust
//! use fgdemux_lib::sam::builder::RecordBuilder;
//!
//! let record = RecordBuilder::mapped_read()
//!     .name("read1")
//!     .sequence("ACGTACGT")
//!     .alignment_start(100)
//!     .tag("CB", "AAACCCAAGAAACACT-1")
//!     .build();
//! ```

use std::num::NonZeroUsize;
use std::path::Path;

use anyhow::Result;
use bstr::BString;
use noodles::core::Position;
use noodles::sam::Header;
use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record::{Flags, MappingQuality};
use noodles::sam::alignment::record_buf::data::field::Value as BufValue;
use noodles::sam::alignment::record_buf::{QualityScores, RecordBuf, Sequence};
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::ReferenceSequence;

use crate::bam_io::{AlignmentFormat, create_alignment_reader, create_alignment_writer};

/// Default base quality for generated qualities.
pub const DEFAULT_BASE_QUALITY: u8 = 30;

/// Default mapping quality.
pub const DEFAULT_MAPQ: u8 = 60;

/// Builder for individual records.
///
/// All fields have defaults: unnamed, unmapped, mapping quality 60, no sequence, no tags.
#[derive(Debug)]
pub struct RecordBuilder {
    name: Option<Vec<u8>>,
    flags: Flags,
    reference_sequence_id: Option<usize>,
    alignment_start: Option<usize>,
    mapping_quality: Option<u8>,
    cigar: Option<String>,
    sequence: Vec<u8>,
    tags: Vec<(Tag, BufValue)>,
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: None,
            flags: Flags::empty(),
            reference_sequence_id: None,
            alignment_start: None,
            mapping_quality: Some(DEFAULT_MAPQ),
            cigar: None,
            sequence: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Creates a builder for a read mapped to reference sequence 0.
    ///
    /// The CIGAR is generated as `{len}M` from the sequence unless set explicitly.
    #[must_use]
    pub fn mapped_read() -> Self {
        Self { reference_sequence_id: Some(0), ..Self::new() }
    }

    /// Sets the read name.
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.as_bytes().to_vec());
        self
    }

    /// Sets the sequence.
    #[must_use]
    pub fn sequence(mut self, seq: &str) -> Self {
        self.sequence = seq.as_bytes().to_vec();
        self
    }

    /// Sets the unmapped flag.
    #[must_use]
    pub fn unmapped(mut self, unmapped: bool) -> Self {
        self.flags.set(Flags::UNMAPPED, unmapped);
        self
    }

    /// Sets the reference sequence ID (0-based).
    #[must_use]
    pub fn reference_sequence_id(mut self, id: usize) -> Self {
        self.reference_sequence_id = Some(id);
        self
    }

    /// Sets the alignment start position (1-based).
    #[must_use]
    pub fn alignment_start(mut self, pos: usize) -> Self {
        self.alignment_start = Some(pos);
        self
    }

    /// Sets the mapping quality; 255 means unavailable.
    #[must_use]
    pub fn mapping_quality(mut self, mapq: u8) -> Self {
        self.mapping_quality = Some(mapq);
        self
    }

    /// Leaves the mapping quality unavailable.
    #[must_use]
    pub fn no_mapping_quality(mut self) -> Self {
        self.mapping_quality = None;
        self
    }

    /// Sets the CIGAR string.
    #[must_use]
    pub fn cigar(mut self, cigar: &str) -> Self {
        self.cigar = Some(cigar.to_string());
        self
    }

    /// Adds a SAM tag; tags that are not two characters long are ignored.
    #[must_use]
    pub fn tag<V: Into<BufValue>>(mut self, tag: &str, value: V) -> Self {
        let tag_bytes = tag.as_bytes();
        if tag_bytes.len() == 2 {
            self.tags.push((Tag::from([tag_bytes[0], tag_bytes[1]]), value.into()));
        }
        self
    }

    /// Builds the `RecordBuf`.
    ///
    /// # Panics
    ///
    /// Panics on an invalid CIGAR string or an alignment start of 0.
    #[must_use]
    pub fn build(self) -> RecordBuf {
        let mut record = RecordBuf::default();

        if let Some(name) = self.name {
            *record.name_mut() = Some(name.into());
        }
        *record.flags_mut() = self.flags;

        if let Some(ref_id) = self.reference_sequence_id {
            *record.reference_sequence_id_mut() = Some(ref_id);
        }
        if let Some(pos) = self.alignment_start {
            *record.alignment_start_mut() =
                Some(Position::try_from(pos).expect("alignment_start must be >= 1"));
        }
        *record.mapping_quality_mut() = self.mapping_quality.and_then(MappingQuality::new);

        let mapped = self.reference_sequence_id.is_some() && self.alignment_start.is_some();
        let (cigar, sequence) = match (self.cigar, self.sequence.is_empty()) {
            (Some(cigar), true) => {
                let len = cigar_read_length(&cigar);
                let generated = b"ACGT".iter().cycle().take(len).copied().collect();
                (Some(cigar), generated)
            }
            (Some(cigar), false) => (Some(cigar), self.sequence),
            (None, false) if mapped => (Some(format!("{}M", self.sequence.len())), self.sequence),
            (None, _) => (None, self.sequence),
        };

        if let Some(cigar) = cigar {
            *record.cigar_mut() = parse_cigar(&cigar).into_iter().collect();
        }
        let qualities = vec![DEFAULT_BASE_QUALITY; sequence.len()];
        *record.sequence_mut() = Sequence::from(sequence);
        *record.quality_scores_mut() = QualityScores::from(qualities);

        for (tag, value) in self.tags {
            record.data_mut().insert(tag, value);
        }

        record
    }
}

/// Parses a CIGAR string into operations.
///
/// # Panics
///
/// Panics on a malformed CIGAR string.
#[must_use]
pub fn parse_cigar(cigar_str: &str) -> Vec<Op> {
    let mut ops = Vec::new();
    let mut num_str = String::new();

    for c in cigar_str.chars() {
        if c.is_ascii_digit() {
            num_str.push(c);
        } else {
            let len: usize = num_str.parse().expect("Invalid CIGAR: expected number");
            let kind = match c {
                'M' => Kind::Match,
                'I' => Kind::Insertion,
                'D' => Kind::Deletion,
                'N' => Kind::Skip,
                'S' => Kind::SoftClip,
                'H' => Kind::HardClip,
                'P' => Kind::Pad,
                '=' => Kind::SequenceMatch,
                'X' => Kind::SequenceMismatch,
                _ => panic!("Unknown CIGAR operation: {c}"),
            };
            ops.push(Op::new(kind, len));
            num_str.clear();
        }
    }

    ops
}

fn cigar_read_length(cigar: &str) -> usize {
    parse_cigar(cigar)
        .iter()
        .filter(|op| {
            matches!(
                op.kind(),
                Kind::Match
                    | Kind::Insertion
                    | Kind::SoftClip
                    | Kind::SequenceMatch
                    | Kind::SequenceMismatch
            )
        })
        .map(|op| op.len())
        .sum()
}

/// Creates a header with the given `(name, length)` reference sequences.
///
/// # Panics
///
/// Panics if a length is zero.
#[must_use]
pub fn create_test_header(references: &[(&str, usize)]) -> Header {
    let mut builder = Header::builder();
    for (name, len) in references {
        let reference_sequence = Map::<ReferenceSequence>::new(
            NonZeroUsize::new(*len).expect("reference length must be non-zero"),
        );
        builder = builder.add_reference_sequence(BString::from(*name), reference_sequence);
    }
    builder.build()
}

/// Writes `records` to a SAM or BAM file, chosen by the extension of `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_alignment_file(path: &Path, header: &Header, records: &[RecordBuf]) -> Result<()> {
    let format = AlignmentFormat::from_path(path)?;
    let mut writer = create_alignment_writer(path, format, header)?;
    for record in records {
        writer.write_record(header, record)?;
    }
    writer.finish(header)?;
    Ok(())
}

/// Reads the header and all records of a SAM or BAM file.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or parsed.
pub fn read_alignment_file(path: &Path) -> Result<(Header, Vec<RecordBuf>)> {
    let (mut reader, header) = create_alignment_reader(path, 1)?;
    let mut records = Vec::new();
    while reader.read_batch(&header, 1024, &mut records)? > 0 {}
    Ok((header, records))
}
