//! Split a SAM/BAM file into one file per target cell barcode.
//!
//! Records are routed by their `CB` tag (suffix after `-` removed) or, when `CB` is absent,
//! their `CR` tag. Records whose barcode is missing or not a target go to `noise.<ext>`.

use anyhow::Result;
use clap::Parser;
use fgdemux_lib::bam_io::AlignmentFormat;
use fgdemux_lib::bucket::BucketStore;
use fgdemux_lib::catalog::KeyCatalog;
use fgdemux_lib::classifier::RecordClassifier;
use fgdemux_lib::demux::{AlignmentSource, DEFAULT_BATCH_SIZE, DemuxEngine, DemuxOptions};
use fgdemux_lib::header::add_pg_record;
use fgdemux_lib::logging::{OperationTimer, log_barcode_report};
use fgdemux_lib::metrics::{BarcodeCountMetric, write_metrics};
use fgdemux_lib::validation::{
    absolutize, parse_tag_list, validate_directory_exists, validate_file_exists,
    validate_positive,
};
use log::info;
use noodles::sam::alignment::record::data::field::Tag;
use std::path::PathBuf;

use crate::commands::command::Command;

/// Demultiplex alignments by cell barcode.
#[derive(Debug, Parser)]
#[command(
    name = "demux",
    about = "\x1b[38;5;72m[DEMULTIPLEX]\x1b[0m    \x1b[36mSplit a SAM/BAM into one file per cell barcode\x1b[0m",
    long_about = r#"
Split a SAM/BAM file into one file per target cell barcode.

Target barcodes are read from the first column of a cell metadata CSV whose first row is a
header. Everything from the first '-' on is removed, so AAACCCAAGAAACACT-1 selects the output
AAACCCAAGAAACACT.<ext> in the output directory.

Each record's barcode is taken from the CB tag (suffix removed) or, if CB is absent, from the
CR tag as is. Records without a barcode, or whose barcode is not a target, are written to
noise.<ext>. Records with a mapping quality below --min-mapq, or carrying any of the
--forbidden-tags, are dropped.

Outputs are written in the format of the input (SAM or BAM) with the input header plus an @PG
record. With --bed, a BED file of reference, start and end is written next to each output.

Example usage:
  fgdemux demux possorted.bam --barcodes-csv cells.csv -o per_cell/
  fgdemux demux possorted.bam --barcodes-csv cells.csv -o per_cell/ --min-mapq 30 \
      --forbidden-tags xf,GX --bed --metrics counts.txt
"#
)]
pub struct Demux {
    /// Input SAM or BAM file
    #[arg(value_name = "ALIGNMENTS")]
    pub input: PathBuf,

    /// Cell metadata CSV; the first column holds the target barcodes
    #[arg(long = "barcodes-csv")]
    pub barcodes_csv: PathBuf,

    /// Existing directory to write the per-barcode outputs to
    #[arg(short = 'o', long = "output-directory", default_value = ".")]
    pub output_directory: PathBuf,

    /// Maximum number of records read and routed per batch
    #[arg(long = "alignment-records-batch", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Also write a BED file next to each output
    #[arg(short = 'b', long = "bed", default_value = "false")]
    pub bed: bool,

    /// Comma separated SAM tags; records carrying any of them are dropped
    #[arg(long = "forbidden-tags", default_value = "")]
    pub forbidden_tags: String,

    /// Records with a lower mapping quality are dropped
    #[arg(long = "min-mapq", default_value_t = 0)]
    pub min_mapq: u8,

    /// Number of threads used to decompress a BAM input
    #[arg(long = "threads", default_value_t = 1)]
    pub threads: usize,

    /// Optional output file for per-barcode record counts
    #[arg(long = "metrics")]
    pub metrics: Option<PathBuf>,
}

/// Validated settings of a run.
struct Settings {
    format: AlignmentFormat,
    barcodes_csv: PathBuf,
    forbidden_tags: Vec<Tag>,
}

impl Demux {
    fn validate(&self) -> Result<Settings> {
        validate_file_exists(&self.input, "Alignments")?;
        let format = AlignmentFormat::from_path(&self.input)?;
        validate_file_exists(&self.barcodes_csv, "Barcodes CSV")?;
        let barcodes_csv = absolutize(&self.barcodes_csv)?;
        validate_directory_exists(&self.output_directory)?;
        validate_positive(self.batch_size, "alignment-records-batch")?;
        validate_positive(self.threads, "threads")?;
        let forbidden_tags = parse_tag_list(&self.forbidden_tags, "forbidden-tags")?;
        Ok(Settings { format, barcodes_csv, forbidden_tags })
    }
}

impl Command for Demux {
    fn execute(&self, command_line: &str) -> Result<()> {
        let settings = self.validate()?;

        info!("Starting Demux");
        info!("Input: {}", self.input.display());
        info!("Barcodes CSV: {}", settings.barcodes_csv.display());
        info!("Output directory: {}", self.output_directory.display());
        info!("Minimum mapping quality: {}", self.min_mapq);
        if !settings.forbidden_tags.is_empty() {
            let tags: Vec<String> = settings
                .forbidden_tags
                .iter()
                .map(|t| format!("{}{}", t.as_ref()[0] as char, t.as_ref()[1] as char))
                .collect();
            info!("Forbidden tags: {}", tags.join(","));
        }
        if self.bed {
            info!("BED output: enabled");
        }

        let timer = OperationTimer::new("Demultiplexing records");

        let catalog = KeyCatalog::load(
            &settings.barcodes_csv,
            &self.output_directory,
            settings.format.extension(),
        )?;
        let mut source = AlignmentSource::open(&self.input, self.threads)?;
        let header = add_pg_record(
            source.header().clone(),
            crate::version::VERSION.as_str(),
            command_line,
        )?;
        let store = BucketStore::initialize(&catalog, header, settings.format, self.bed)?;

        let classifier = RecordClassifier::new(settings.forbidden_tags, self.min_mapq);
        let options = DemuxOptions { batch_size: self.batch_size, ..DemuxOptions::default() };
        let mut engine = DemuxEngine::new(&catalog, classifier, store, options);
        let report = engine.run(&mut source)?;

        log_barcode_report(&report);
        if let Some(path) = &self.metrics {
            write_metrics(path, &BarcodeCountMetric::from_report(&report))?;
            info!("Wrote barcode count metrics to {}", path.display());
        }

        timer.log_completion(report.records_read);
        Ok(())
    }
}
