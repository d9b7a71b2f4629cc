//! Test input generation: cell-barcoded alignment files and cell metadata CSVs.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use fgdemux_lib::sam::builder::{
    RecordBuilder, create_test_header, read_alignment_file, write_alignment_file,
};
use noodles::sam::Header;
use noodles::sam::alignment::record_buf::RecordBuf;

/// Creates a header with a single 10kb reference named `chr1`.
pub fn create_minimal_header() -> Header {
    create_test_header(&[("chr1", 10_000)])
}

/// Barcode tag carried by a generated read.
#[derive(Debug, Clone, Copy)]
pub enum BarcodeTag<'a> {
    /// Corrected barcode (`CB`)
    Corrected(&'a str),
    /// Raw barcode (`CR`)
    Raw(&'a str),
    /// No barcode tag
    None,
}

/// Builds a mapped 8bp read at `start` (1-based) with the given barcode and mapping quality.
pub fn cell_read(name: &str, barcode: BarcodeTag<'_>, mapq: u8, start: usize) -> RecordBuf {
    let builder = RecordBuilder::mapped_read()
        .name(name)
        .sequence("ACGTACGT")
        .alignment_start(start)
        .mapping_quality(mapq);
    match barcode {
        BarcodeTag::Corrected(cb) => builder.tag("CB", cb).build(),
        BarcodeTag::Raw(cr) => builder.tag("CR", cr).build(),
        BarcodeTag::None => builder.build(),
    }
}

/// The four reads of the reference scenario: targets `AAA-1` and `BBB-1`, a minimum mapping
/// quality of 20 and `XF` forbidden.
pub fn scenario_reads() -> Vec<RecordBuf> {
    vec![
        cell_read("r1", BarcodeTag::Corrected("AAA-1"), 30, 1),
        cell_read("r2", BarcodeTag::Corrected("BBB-1"), 10, 50),
        cell_read("r3", BarcodeTag::Corrected("CCC-1"), 30, 100),
        RecordBuilder::mapped_read()
            .name("r4")
            .sequence("ACGTACGT")
            .alignment_start(150)
            .mapping_quality(30)
            .tag("CR", "DDD")
            .tag("XF", 1i32)
            .build(),
    ]
}

/// Writes a cell metadata CSV with a header row and one barcode per row.
pub fn write_cells_csv(path: &Path, barcodes: &[&str]) {
    let mut content = String::from("barcode,total_counts\n");
    for (i, barcode) in barcodes.iter().enumerate() {
        content.push_str(&format!("{barcode},{}\n", (i + 1) * 100));
    }
    fs::write(path, content).expect("Failed to write cells CSV");
}

/// Writes `records` to `path` (SAM or BAM by extension) with the minimal header.
pub fn write_input(path: &Path, records: &[RecordBuf]) {
    write_alignment_file(path, &create_minimal_header(), records)
        .expect("Failed to write input alignments");
}

/// Reads the header and records of a SAM or BAM output.
pub fn read_output(path: &Path) -> (Header, Vec<RecordBuf>) {
    read_alignment_file(path).expect("Failed to read output alignments")
}

/// Names of the records in a SAM or BAM output, in file order.
pub fn record_names(path: &Path) -> Vec<String> {
    let (_, records) = read_output(path);
    records
        .iter()
        .map(|r| r.name().map(ToString::to_string).unwrap_or_default())
        .collect()
}

/// Generates `count` reads cycling over `barcodes`, with every fifth read below mapping
/// quality 20 and every seventh read carrying only a raw barcode.
pub fn generate_reads(count: usize, barcodes: &[&str]) -> Vec<RecordBuf> {
    (0..count)
        .map(|i| {
            let name = format!("read{i:05}");
            let barcode = barcodes[i % barcodes.len()];
            let mapq = if i % 5 == 0 { 10 } else { 60 };
            let tag = if i % 7 == 0 {
                BarcodeTag::Raw(barcode.split('-').next().unwrap_or(barcode))
            } else {
                BarcodeTag::Corrected(barcode)
            };
            cell_read(&name, tag, mapq, 1 + (i % 9_000))
        })
        .collect()
}
