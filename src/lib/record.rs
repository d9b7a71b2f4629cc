//! Read-only view of an alignment record.
//!
//! The demultiplexer never needs the full record model, only a handful of attributes: mapping
//! quality, whether a tag is present and its value as text, and the coordinates used for the
//! BED summary. [`AlignmentRecord`] captures that capability so the classifier is independent
//! of how records are encoded.

use std::borrow::Cow;

use noodles::sam::Header;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::RecordBuf;
use noodles::sam::alignment::record_buf::data::field::Value;

/// Mapping quality reported for records whose mapping quality is unavailable.
pub const MISSING_MAPPING_QUALITY: u8 = 255;

/// The attributes of a record the demultiplexer reads.
pub trait AlignmentRecord {
    /// Mapping quality, [`MISSING_MAPPING_QUALITY`] when unavailable.
    fn mapping_quality(&self) -> u8;

    /// True if the record carries `tag`, whatever its value.
    fn has_tag(&self, tag: Tag) -> bool;

    /// The value of `tag` as text.
    ///
    /// Returns `None` when the tag is absent or its type has no sensible text form.
    fn tag_text(&self, tag: Tag) -> Option<Cow<'_, str>>;

    /// Index of the reference sequence in the header.
    fn reference_sequence_id(&self) -> Option<usize>;

    /// 0-based alignment start.
    fn start(&self) -> Option<usize>;

    /// Number of reference bases covered by the alignment.
    fn alignment_span(&self) -> usize;

    /// Reference sequence name looked up in `header`.
    fn reference_name<'h>(&self, header: &'h Header) -> Option<&'h [u8]> {
        let id = self.reference_sequence_id()?;
        header.reference_sequences().get_index(id).map(|(name, _)| name.as_ref())
    }
}

impl AlignmentRecord for RecordBuf {
    fn mapping_quality(&self) -> u8 {
        RecordBuf::mapping_quality(self).map_or(MISSING_MAPPING_QUALITY, |mq| mq.get())
    }

    fn has_tag(&self, tag: Tag) -> bool {
        self.data().get(&tag).is_some()
    }

    fn tag_text(&self, tag: Tag) -> Option<Cow<'_, str>> {
        match self.data().get(&tag)? {
            Value::String(s) => Some(String::from_utf8_lossy(s.as_ref())),
            Value::Character(c) => Some(Cow::Owned(char::from(*c).to_string())),
            Value::Int8(v) => Some(Cow::Owned(v.to_string())),
            Value::UInt8(v) => Some(Cow::Owned(v.to_string())),
            Value::Int16(v) => Some(Cow::Owned(v.to_string())),
            Value::UInt16(v) => Some(Cow::Owned(v.to_string())),
            Value::Int32(v) => Some(Cow::Owned(v.to_string())),
            Value::UInt32(v) => Some(Cow::Owned(v.to_string())),
            _ => None,
        }
    }

    fn reference_sequence_id(&self) -> Option<usize> {
        RecordBuf::reference_sequence_id(self)
    }

    fn start(&self) -> Option<usize> {
        self.alignment_start().map(|pos| usize::from(pos) - 1)
    }

    fn alignment_span(&self) -> usize {
        self.cigar()
            .as_ref()
            .iter()
            .filter(|op| {
                matches!(
                    op.kind(),
                    Kind::Match
                        | Kind::SequenceMatch
                        | Kind::SequenceMismatch
                        | Kind::Deletion
                        | Kind::Skip
                )
            })
            .map(|op| op.len())
            .sum()
    }
}
