//! Cell barcode conventions.
//!
//! Barcodes in cell metadata and in the `CB` (corrected barcode) tag carry a GEM-well style
//! suffix after a dash, e.g. `AAACCCAAGAAACACT-1`. The canonical barcode used to select an
//! output bucket is everything before the first dash. Raw barcodes from the `CR` tag never
//! carry the suffix and are used verbatim.

use noodles::sam::alignment::record::data::field::Tag;

/// Corrected cell barcode tag, preferred source of a record's barcode.
pub const CORRECTED_BARCODE_TAG: Tag = Tag::new(b'C', b'B');

/// Uncorrected cell barcode tag, used when `CB` is absent.
pub const RAW_BARCODE_TAG: Tag = Tag::new(b'C', b'R');

/// Separator between the barcode and its suffix.
pub const SUFFIX_DELIMITER: char = '-';

/// Base name of the catch-all output.
pub const CATCH_ALL_NAME: &str = "noise";

/// Truncates a barcode at the first [`SUFFIX_DELIMITER`].
///
/// A barcode without a delimiter is returned whole.
///
/// # Examples
///
/// ```
/// use fgdemux_lib::barcode::canonicalize;
///
/// assert_eq!(canonicalize("AAACCCAAGAAACACT-1"), "AAACCCAAGAAACACT");
/// assert_eq!(canonicalize("AAACCCAAGAAACACT"), "AAACCCAAGAAACACT");
/// assert_eq!(canonicalize("AAA-1-2"), "AAA");
/// ```
#[must_use]
pub fn canonicalize(raw: &str) -> &str {
    match raw.find(SUFFIX_DELIMITER) {
        Some(idx) => &raw[..idx],
        None => raw,
    }
}

/// Returns true if `raw` contains the suffix delimiter.
#[must_use]
pub fn has_suffix(raw: &str) -> bool {
    raw.contains(SUFFIX_DELIMITER)
}
