//! Library-level pipeline tests: alignment file -> engine -> per-barcode outputs.

use std::path::Path;

use fgdemux_lib::bucket::BucketStore;
use fgdemux_lib::catalog::KeyCatalog;
use fgdemux_lib::classifier::RecordClassifier;
use fgdemux_lib::demux::{AlignmentSource, DemuxEngine, DemuxOptions, DemuxReport, EngineState};
use noodles::sam::alignment::record::data::field::Tag;
use tempfile::TempDir;

use crate::helpers::{generate_reads, record_names, scenario_reads, write_input};

const BARCODES: [&str; 4] = ["AAA-1", "CCC-1", "GGG-1", "TTT-1"];

fn run_pipeline(
    input: &Path,
    out: &Path,
    targets: &[&str],
    min_mapq: u8,
    batch_size: usize,
) -> DemuxReport {
    let mut source = AlignmentSource::open(input, 1).unwrap();
    let format = source.format();
    let catalog = KeyCatalog::from_barcodes(targets, out, format.extension()).unwrap();
    let store = BucketStore::initialize(&catalog, source.header().clone(), format, true).unwrap();
    let classifier = RecordClassifier::new([Tag::new(b'X', b'F')], min_mapq);
    let options = DemuxOptions { batch_size, ..DemuxOptions::default() };
    let mut engine = DemuxEngine::new(&catalog, classifier, store, options);
    let report = engine.run(&mut source).unwrap();
    assert_eq!(engine.state(), EngineState::Done);
    report
}

#[test]
fn test_pipeline_scenario_report() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.bam");
    write_input(&input, &scenario_reads());

    let report = run_pipeline(&input, dir.path(), &["AAA-1", "BBB-1"], 20, 2);

    assert_eq!(report.count("AAA"), Some(1));
    assert_eq!(report.count("BBB"), Some(0));
    assert_eq!(report.count("CCC"), None);
    assert_eq!(report.catch_all, 1);
    assert_eq!(report.records_read, 4);
    assert_eq!(report.rejected_mapping_quality, 1);
    assert_eq!(report.rejected_forbidden_tag, 1);
    assert_eq!(report.batches, 2);
}

#[test]
fn test_pipeline_counts_match_outputs() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.sam");
    write_input(&input, &generate_reads(300, &BARCODES));

    let report = run_pipeline(&input, dir.path(), &BARCODES[..3], 20, 64);

    assert_eq!(report.records_read, 300);
    assert_eq!(report.records_read, report.records_written() + report.records_rejected());
    for count in &report.counts {
        let path = dir.path().join(format!("{}.sam", count.barcode));
        assert_eq!(record_names(&path).len() as u64, count.count, "{}", count.barcode);
        let bed = std::fs::read_to_string(path.with_extension("bed")).unwrap();
        assert_eq!(bed.lines().count() as u64, count.count);
    }
    assert_eq!(record_names(&dir.path().join("noise.sam")).len() as u64, report.catch_all);
}

#[test]
fn test_pipeline_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.bam");
    write_input(&input, &generate_reads(200, &BARCODES));

    let mut outputs = Vec::new();
    for (run, batch_size) in [(0, 3), (1, 3), (2, 200)] {
        let out = dir.path().join(format!("run{run}"));
        std::fs::create_dir(&out).unwrap();
        let report = run_pipeline(&input, &out, &BARCODES[..2], 0, batch_size);
        let names: Vec<Vec<String>> = ["AAA.bam", "CCC.bam", "noise.bam"]
            .iter()
            .map(|f| record_names(&out.join(f)))
            .collect();
        outputs.push((report.counts, report.catch_all, names));
    }

    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[0], outputs[2]);
}

#[test]
fn test_pipeline_preserves_input_order_within_bucket() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.bam");
    let reads = generate_reads(100, &BARCODES);
    write_input(&input, &reads);

    run_pipeline(&input, dir.path(), &BARCODES[..1], 0, 9);

    let names = record_names(&dir.path().join("AAA.bam"));
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
    assert_eq!(names.len(), 25);
}
