//! Per-record filtering and barcode extraction.
//!
//! [`RecordClassifier::classify`] first applies the validity filter, in order:
//!
//! 1. reject if the mapping quality is strictly below the minimum
//! 2. reject if any forbidden tag is present
//!
//! A record that passes gets its barcode from the `CB` tag, truncated at the first `-`, or
//! failing that from the `CR` tag verbatim. Only the corrected tag is truncated; raw barcodes
//! never carry a suffix. A record with neither tag, or whose barcode is empty, is
//! [`Outcome::Unmatched`]. Whether a barcode is in the catalog is decided by the caller.

use std::borrow::Cow;

use noodles::sam::alignment::record::data::field::Tag;

use crate::barcode::{CORRECTED_BARCODE_TAG, RAW_BARCODE_TAG, canonicalize};
use crate::record::AlignmentRecord;

/// Why a record was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Mapping quality below the minimum
    LowMappingQuality,
    /// Carries the given forbidden tag
    ForbiddenTag(Tag),
}

/// Result of classifying one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<'r> {
    /// Filtered out; never written or counted.
    Rejected(RejectReason),
    /// Passed the filter and carries this canonical barcode.
    Routed(Cow<'r, str>),
    /// Passed the filter but has no usable barcode.
    Unmatched,
}

/// Filter settings plus the key extraction rule.
#[derive(Debug, Clone, Default)]
pub struct RecordClassifier {
    forbidden_tags: Vec<Tag>,
    min_mapping_quality: u8,
}

impl RecordClassifier {
    /// Creates a classifier.
    ///
    /// # Arguments
    /// * `forbidden_tags` - Records carrying any of these tags are rejected
    /// * `min_mapping_quality` - Records with a lower mapping quality are rejected
    pub fn new(forbidden_tags: impl IntoIterator<Item = Tag>, min_mapping_quality: u8) -> Self {
        Self { forbidden_tags: forbidden_tags.into_iter().collect(), min_mapping_quality }
    }

    /// The forbidden tags.
    #[must_use]
    pub fn forbidden_tags(&self) -> &[Tag] {
        &self.forbidden_tags
    }

    /// The minimum mapping quality.
    #[must_use]
    pub fn min_mapping_quality(&self) -> u8 {
        self.min_mapping_quality
    }

    /// Classifies one record.
    pub fn classify<'r, R: AlignmentRecord>(&self, record: &'r R) -> Outcome<'r> {
        if let Some(reason) = self.rejection(record) {
            return Outcome::Rejected(reason);
        }
        match extract_barcode(record) {
            Some(barcode) if !barcode.is_empty() => Outcome::Routed(barcode),
            _ => Outcome::Unmatched,
        }
    }

    fn rejection<R: AlignmentRecord>(&self, record: &R) -> Option<RejectReason> {
        if record.mapping_quality() < self.min_mapping_quality {
            return Some(RejectReason::LowMappingQuality);
        }
        self.forbidden_tags
            .iter()
            .find(|tag| record.has_tag(**tag))
            .map(|tag| RejectReason::ForbiddenTag(*tag))
    }
}

/// The barcode of a record: truncated `CB` if present, else verbatim `CR`.
///
/// A `CB` tag whose value has no text form yields an empty barcode rather than falling back to
/// `CR`.
pub fn extract_barcode<R: AlignmentRecord>(record: &R) -> Option<Cow<'_, str>> {
    if record.has_tag(CORRECTED_BARCODE_TAG) {
        let barcode = match record.tag_text(CORRECTED_BARCODE_TAG) {
            Some(Cow::Borrowed(text)) => Cow::Borrowed(canonicalize(text)),
            Some(Cow::Owned(mut text)) => {
                text.truncate(canonicalize(&text).len());
                Cow::Owned(text)
            }
            None => Cow::Borrowed(""),
        };
        return Some(barcode);
    }
    record.tag_text(RAW_BARCODE_TAG)
}
