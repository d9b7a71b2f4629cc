//! End-to-end tests of the `demux` command.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

use crate::helpers::{
    BarcodeTag, assert_has_program, assert_record_names, cell_read, generate_reads, read_output,
    scenario_reads, write_cells_csv, write_input,
};

fn run_demux(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fgdemux"))
        .arg("demux")
        .args(args)
        .env("RUST_LOG", "info")
        .output()
        .expect("Failed to run fgdemux demux")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "demux failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Writes the scenario input and cells CSV into `dir`, returning (input, csv) paths.
fn setup_scenario(dir: &Path, input_name: &str) -> (String, String) {
    let input = dir.join(input_name);
    let csv = dir.join("cells.csv");
    write_input(&input, &scenario_reads());
    write_cells_csv(&csv, &["AAA-1", "BBB-1"]);
    (input.to_string_lossy().to_string(), csv.to_string_lossy().to_string())
}

#[test]
fn test_demux_scenario() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();
    let (input, csv) = setup_scenario(dir.path(), "possorted.bam");

    let output = run_demux(&[
        &input,
        "--barcodes-csv",
        &csv,
        "-o",
        out.to_str().unwrap(),
        "--min-mapq",
        "20",
        "--forbidden-tags",
        "XF",
    ]);
    assert_success(&output);

    assert_record_names(&out.join("AAA.bam"), &["r1"]);
    assert_record_names(&out.join("BBB.bam"), &[]);
    assert_record_names(&out.join("noise.bam"), &["r3"]);

    let mut files: Vec<String> = fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    files.sort();
    assert_eq!(files, vec!["AAA.bam", "BBB.bam", "noise.bam"]);
}

#[test]
fn test_demux_outputs_carry_program_record() {
    let dir = TempDir::new().unwrap();
    let (input, csv) = setup_scenario(dir.path(), "possorted.bam");
    let out = dir.path().to_str().unwrap();

    assert_success(&run_demux(&[&input, "--barcodes-csv", &csv, "-o", out]));

    for name in ["AAA.bam", "BBB.bam", "noise.bam"] {
        let (header, _) = read_output(&dir.path().join(name));
        assert_has_program(&header, "fgdemux");
        assert_eq!(header.reference_sequences().len(), 1);
    }
}

#[test]
fn test_demux_without_filters_keeps_every_read() {
    let dir = TempDir::new().unwrap();
    let (input, csv) = setup_scenario(dir.path(), "possorted.bam");
    let out = dir.path().to_str().unwrap();

    assert_success(&run_demux(&[&input, "--barcodes-csv", &csv, "-o", out]));

    assert_record_names(&dir.path().join("AAA.bam"), &["r1"]);
    assert_record_names(&dir.path().join("BBB.bam"), &["r2"]);
    assert_record_names(&dir.path().join("noise.bam"), &["r3", "r4"]);
}

#[test]
fn test_demux_sam_input_writes_sam() {
    let dir = TempDir::new().unwrap();
    let (input, csv) = setup_scenario(dir.path(), "possorted.sam");
    let out = dir.path().to_str().unwrap();

    assert_success(&run_demux(&[&input, "--barcodes-csv", &csv, "-o", out, "--min-mapq", "20"]));

    let aaa = dir.path().join("AAA.sam");
    assert!(fs::read_to_string(&aaa).unwrap().starts_with('@'));
    assert_record_names(&aaa, &["r1"]);
    assert_record_names(&dir.path().join("noise.sam"), &["r3", "r4"]);
    assert!(!dir.path().join("AAA.bam").exists());
}

#[test]
fn test_demux_bed_mirror() {
    let dir = TempDir::new().unwrap();
    let (input, csv) = setup_scenario(dir.path(), "possorted.bam");
    let out = dir.path().to_str().unwrap();

    let output = run_demux(&[
        &input,
        "--barcodes-csv",
        &csv,
        "-o",
        out,
        "--min-mapq",
        "20",
        "--forbidden-tags",
        "XF",
        "--bed",
    ]);
    assert_success(&output);

    assert_eq!(fs::read_to_string(dir.path().join("AAA.bed")).unwrap(), "chr1\t0\t8\n");
    assert_eq!(fs::read_to_string(dir.path().join("BBB.bed")).unwrap(), "");
    assert_eq!(fs::read_to_string(dir.path().join("noise.bed")).unwrap(), "chr1\t99\t107\n");
}

#[test]
fn test_demux_no_bed_without_flag() {
    let dir = TempDir::new().unwrap();
    let (input, csv) = setup_scenario(dir.path(), "possorted.bam");
    let out = dir.path().to_str().unwrap();

    assert_success(&run_demux(&[&input, "--barcodes-csv", &csv, "-o", out]));

    assert!(!dir.path().join("AAA.bed").exists());
    assert!(!dir.path().join("noise.bed").exists());
}

#[test]
fn test_demux_metrics() {
    let dir = TempDir::new().unwrap();
    let (input, csv) = setup_scenario(dir.path(), "possorted.bam");
    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();
    let metrics = dir.path().join("counts.txt");

    let output = run_demux(&[
        &input,
        "--barcodes-csv",
        &csv,
        "-o",
        out.to_str().unwrap(),
        "--min-mapq",
        "20",
        "--forbidden-tags",
        "XF",
        "--metrics",
        metrics.to_str().unwrap(),
    ]);
    assert_success(&output);

    assert_eq!(
        fs::read_to_string(&metrics).unwrap(),
        "barcode\trecords\nAAA\t1\nBBB\t0\nnoise\t1\n"
    );
}

#[test]
fn test_demux_raw_barcode_fallback() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.bam");
    let csv = dir.path().join("cells.csv");
    write_input(
        &input,
        &[
            cell_read("cb", BarcodeTag::Corrected("AAA-1"), 60, 1),
            cell_read("cr", BarcodeTag::Raw("AAA"), 60, 2),
            cell_read("cr_suffixed", BarcodeTag::Raw("AAA-1"), 60, 3),
            cell_read("untagged", BarcodeTag::None, 60, 4),
        ],
    );
    write_cells_csv(&csv, &["AAA-1"]);

    let output = run_demux(&[
        input.to_str().unwrap(),
        "--barcodes-csv",
        csv.to_str().unwrap(),
        "-o",
        dir.path().to_str().unwrap(),
    ]);
    assert_success(&output);

    assert_record_names(&dir.path().join("AAA.bam"), &["cb", "cr"]);
    assert_record_names(&dir.path().join("noise.bam"), &["cr_suffixed", "untagged"]);
}

#[test]
fn test_demux_batch_size_does_not_change_outputs() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.bam");
    let csv = dir.path().join("cells.csv");
    let barcodes = ["AAA-1", "CCC-1", "GGG-1", "TTT-1"];
    write_input(&input, &generate_reads(500, &barcodes));
    write_cells_csv(&csv, &["AAA-1", "CCC-1", "GGG-1"]);

    let mut names_by_batch = Vec::new();
    for batch in ["1", "7", "1048576"] {
        let out = dir.path().join(format!("batch_{batch}"));
        fs::create_dir(&out).unwrap();
        let output = run_demux(&[
            input.to_str().unwrap(),
            "--barcodes-csv",
            csv.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--min-mapq",
            "20",
            "--alignment-records-batch",
            batch,
        ]);
        assert_success(&output);

        let names: Vec<Vec<String>> = ["AAA.bam", "CCC.bam", "GGG.bam", "noise.bam"]
            .iter()
            .map(|f| crate::helpers::record_names(&out.join(f)))
            .collect();
        names_by_batch.push(names);
    }

    assert_eq!(names_by_batch[0], names_by_batch[1]);
    assert_eq!(names_by_batch[0], names_by_batch[2]);
    let total: usize = names_by_batch[0].iter().map(Vec::len).sum();
    assert_eq!(total, 400);
}

#[test]
fn test_demux_missing_output_directory_fails() {
    let dir = TempDir::new().unwrap();
    let (input, csv) = setup_scenario(dir.path(), "possorted.bam");
    let missing = dir.path().join("missing");

    let output = run_demux(&[&input, "--barcodes-csv", &csv, "-o", missing.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("configuration error"));
    assert!(!missing.exists());
}

#[test]
fn test_demux_missing_barcodes_csv_fails() {
    let dir = TempDir::new().unwrap();
    let (input, _) = setup_scenario(dir.path(), "possorted.bam");
    let missing = dir.path().join("missing.csv");

    let output = run_demux(&[
        &input,
        "--barcodes-csv",
        missing.to_str().unwrap(),
        "-o",
        dir.path().to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(!dir.path().join("noise.bam").exists());
}

#[test]
fn test_demux_unsupported_input_format_fails() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("reads.cram");
    let csv = dir.path().join("cells.csv");
    fs::write(&input, b"").unwrap();
    write_cells_csv(&csv, &["AAA-1"]);

    let output = run_demux(&[
        input.to_str().unwrap(),
        "--barcodes-csv",
        csv.to_str().unwrap(),
        "-o",
        dir.path().to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unsupported alignment format"));
}

#[test]
fn test_demux_reserved_barcode_fails() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.bam");
    let csv = dir.path().join("cells.csv");
    write_input(&input, &scenario_reads());
    write_cells_csv(&csv, &["AAA-1", "noise-1"]);

    let output = run_demux(&[
        input.to_str().unwrap(),
        "--barcodes-csv",
        csv.to_str().unwrap(),
        "-o",
        dir.path().to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(!dir.path().join("AAA.bam").exists());
}

#[test]
fn test_demux_corrupt_input_fails() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("corrupt.bam");
    let csv = dir.path().join("cells.csv");
    fs::write(&input, b"not a bam file").unwrap();
    write_cells_csv(&csv, &["AAA-1"]);

    let output = run_demux(&[
        input.to_str().unwrap(),
        "--barcodes-csv",
        csv.to_str().unwrap(),
        "-o",
        dir.path().to_str().unwrap(),
    ]);
    assert!(!output.status.success());
}
