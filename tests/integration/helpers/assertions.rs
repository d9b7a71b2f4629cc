//! Custom assertion helpers for integration tests.

#![allow(dead_code)]

use std::path::Path;

use noodles::sam::Header;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::RecordBuf;
use noodles::sam::alignment::record_buf::data::field::Value;

use super::bam_generator::record_names;

/// Asserts that the output at `path` holds exactly the named records, in order.
///
/// # Panics
///
/// Panics if the file is missing or its record names differ.
pub fn assert_record_names(path: &Path, expected: &[&str]) {
    assert!(path.exists(), "Missing output: {}", path.display());
    let names = record_names(path);
    assert_eq!(names, expected, "Record names mismatch in {}", path.display());
}

/// Asserts that a record carries a string tag with the given value.
///
/// # Panics
///
/// Panics if the tag is missing, not a string, or has a different value.
pub fn assert_string_tag(record: &RecordBuf, tag: [u8; 2], expected: &str) {
    let value = record.data().get(&Tag::from(tag)).expect("Record should have tag");
    match value {
        Value::String(s) => {
            let s_bytes: &[u8] = s.as_ref();
            assert_eq!(s_bytes, expected.as_bytes(), "Tag mismatch for record {:?}", record.name());
        }
        _ => panic!("Tag should be a string"),
    }
}

/// Asserts that the header has an @PG record with the given ID.
///
/// # Panics
///
/// Panics if no such program record exists.
pub fn assert_has_program(header: &Header, id: &str) {
    assert!(
        header.programs().as_ref().contains_key(id.as_bytes()),
        "Header should contain @PG ID:{id}"
    );
}
