//! Input validation utilities
//!
//! Validation of command-line parameters, input files, output directories and SAM tags.
//! Every failure here is a configuration error (see [`crate::errors::ErrorCategory`]) and is
//! raised before any alignment record is processed.

use crate::errors::{DemuxError, Result};
use noodles::sam::alignment::record::data::field::Tag;
use std::path::{Path, PathBuf};

/// Validate that a file exists and is a regular file
///
/// # Arguments
/// * `path` - Path to validate
/// * `description` - Human-readable description of the file (e.g., "Input BAM", "Barcodes CSV")
///
/// # Errors
/// Returns an error if the path does not exist or is not a regular file
///
/// # Example
/// ```
/// use fgdemux_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/cells.csv", "Barcodes CSV");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Err(DemuxError::InvalidFile {
            file_type: description.to_string(),
            path: path_ref.display().to_string(),
            reason: "File does not exist".to_string(),
        });
    }
    if !path_ref.is_file() {
        return Err(DemuxError::InvalidFile {
            file_type: description.to_string(),
            path: path_ref.display().to_string(),
            reason: "Path is not a regular file".to_string(),
        });
    }
    Ok(())
}

/// Validate that an output directory exists
///
/// # Errors
/// Returns an error if the path does not exist or is not a directory
pub fn validate_directory_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.is_dir() {
        return Err(DemuxError::MissingDirectory { path: path_ref.to_path_buf() });
    }
    Ok(())
}

/// Resolve a relative path against the current working directory.
///
/// # Errors
/// Returns an error if the current directory cannot be determined
pub fn absolutize<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path_ref = path.as_ref();
    if path_ref.is_absolute() {
        return Ok(path_ref.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| DemuxError::io("Failed to determine the current directory", e))?;
    Ok(cwd.join(path_ref))
}

/// Validate that a SAM tag is exactly 2 characters
///
/// # Arguments
/// * `tag` - Tag string to validate
/// * `name` - Name of the parameter for error messages
///
/// # Returns
/// A 2-byte array representing the tag
///
/// # Errors
/// Returns an error if the tag is not exactly 2 characters
///
/// # Example
/// ```
/// use fgdemux_lib::validation::validate_tag;
///
/// let tag = validate_tag("CB", "barcode tag").unwrap();
/// assert_eq!(tag, [b'C', b'B']);
///
/// let result = validate_tag("CBX", "barcode tag");
/// assert!(result.is_err());
/// ```
pub fn validate_tag(tag: &str, name: &str) -> Result<[u8; 2]> {
    if tag.len() != 2 {
        return Err(DemuxError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Tag must be exactly 2 characters, got: '{tag}'"),
        });
    }
    let bytes = tag.as_bytes();
    Ok([bytes[0], bytes[1]])
}

/// Convert a validated string tag to noodles Tag type
///
/// # Errors
/// Returns an error if the tag is not exactly 2 characters
pub fn string_to_tag(tag: &str, name: &str) -> Result<Tag> {
    let tag_array = validate_tag(tag, name)?;
    Ok(Tag::from(tag_array))
}

/// Parse a comma-separated list of SAM tags.
///
/// Surrounding whitespace is trimmed and empty entries are ignored, so `""` and `"XF,"` are
/// both accepted. Duplicates are removed while keeping first-seen order.
///
/// # Errors
/// Returns an error if any entry is not exactly 2 characters
///
/// # Example
/// ```
/// use fgdemux_lib::validation::parse_tag_list;
///
/// let tags = parse_tag_list("XF, UB", "forbidden-tags").unwrap();
/// assert_eq!(tags.len(), 2);
/// assert!(parse_tag_list("", "forbidden-tags").unwrap().is_empty());
/// assert!(parse_tag_list("XF,ABC", "forbidden-tags").is_err());
/// ```
pub fn parse_tag_list(list: &str, name: &str) -> Result<Vec<Tag>> {
    let mut tags: Vec<Tag> = Vec::new();
    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let tag = string_to_tag(entry, name)?;
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    Ok(tags)
}

/// Validate that a numeric parameter is at least 1
///
/// # Errors
/// Returns an error if `value` is zero
pub fn validate_positive(value: usize, name: &str) -> Result<()> {
    if value == 0 {
        return Err(DemuxError::InvalidParameter {
            parameter: name.to_string(),
            reason: "must be >= 1".to_string(),
        });
    }
    Ok(())
}
