//! SAM/BAM file I/O utilities.
//!
//! Readers and writers for the two alignment formats the demultiplexer handles. The format of
//! a file is decided by its extension; outputs are always written in the format of the source.
//!
//! # Threading Model
//!
//! BAM sources can be decompressed with several threads (`threads > 1`); this happens inside
//! the BGZF reader and does not change the sequential order in which records are returned.
//! Writers are single-threaded: a run may hold one open writer per barcode.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::num::NonZero;
use std::path::Path;

use noodles::bam;
use noodles::bgzf;
use noodles::sam;
use noodles::sam::Header;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::io::Write as AlignmentWrite;

use crate::errors::{DemuxError, IoContext, Result};

/// Alignment file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentFormat {
    /// Plain-text SAM.
    Sam,
    /// BGZF-compressed BAM.
    Bam,
}

impl AlignmentFormat {
    /// Determines the format from a path's extension (case-insensitive).
    ///
    /// # Errors
    /// Returns an error if the extension is neither `sam` nor `bam`.
    ///
    /// # Example
    /// ```
    /// use fgdemux_lib::bam_io::AlignmentFormat;
    /// use std::path::Path;
    ///
    /// assert_eq!(AlignmentFormat::from_path(Path::new("in.bam")).unwrap(), AlignmentFormat::Bam);
    /// assert_eq!(AlignmentFormat::from_path(Path::new("in.SAM")).unwrap(), AlignmentFormat::Sam);
    /// assert!(AlignmentFormat::from_path(Path::new("in.cram")).is_err());
    /// ```
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("bam") => Ok(AlignmentFormat::Bam),
            Some("sam") => Ok(AlignmentFormat::Sam),
            _ => Err(DemuxError::UnsupportedFormat { path: path.to_path_buf() }),
        }
    }

    /// File extension including the leading dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            AlignmentFormat::Sam => ".sam",
            AlignmentFormat::Bam => ".bam",
        }
    }
}

/// Enum wrapping single-threaded and multi-threaded BGZF readers.
pub enum BgzfReaderEnum {
    /// Single-threaded BGZF reader
    SingleThreaded(bgzf::Reader<File>),
    /// Multi-threaded BGZF reader
    MultiThreaded(bgzf::MultithreadedReader<File>),
}

impl Read for BgzfReaderEnum {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.read(buf),
            BgzfReaderEnum::MultiThreaded(r) => r.read(buf),
        }
    }
}

impl BufRead for BgzfReaderEnum {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.fill_buf(),
            BgzfReaderEnum::MultiThreaded(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.consume(amt),
            BgzfReaderEnum::MultiThreaded(r) => r.consume(amt),
        }
    }
}

/// A SAM or BAM reader positioned after the header.
pub enum AlignmentReader {
    /// BAM source
    Bam(bam::io::Reader<BgzfReaderEnum>),
    /// SAM source
    Sam(sam::io::Reader<BufReader<File>>),
}

impl AlignmentReader {
    /// Reads up to `max_records` records, appending them to `records`.
    ///
    /// Returns the number of records read; fewer than `max_records` (including zero) means the
    /// end of the stream was reached.
    ///
    /// # Errors
    /// Returns an error if a record cannot be read or decoded.
    pub fn read_batch(
        &mut self,
        header: &Header,
        max_records: usize,
        records: &mut Vec<RecordBuf>,
    ) -> io::Result<usize> {
        let mut loaded = 0;
        while loaded < max_records {
            let mut record = RecordBuf::default();
            let bytes = match self {
                AlignmentReader::Bam(r) => r.read_record_buf(header, &mut record)?,
                AlignmentReader::Sam(r) => r.read_record_buf(header, &mut record)?,
            };
            if bytes == 0 {
                break;
            }
            records.push(record);
            loaded += 1;
        }
        Ok(loaded)
    }

    /// The format of the source.
    #[must_use]
    pub fn format(&self) -> AlignmentFormat {
        match self {
            AlignmentReader::Bam(_) => AlignmentFormat::Bam,
            AlignmentReader::Sam(_) => AlignmentFormat::Sam,
        }
    }
}

/// Open a SAM or BAM file and read its header.
///
/// # Arguments
/// * `path` - Path to the input file; the extension selects the format
/// * `threads` - Number of BGZF decompression threads for BAM (1 = single-threaded)
///
/// # Returns
/// A tuple of (reader, header)
///
/// # Errors
/// Returns an error if the format is unsupported, the file cannot be opened or the header
/// cannot be read
pub fn create_alignment_reader<P: AsRef<Path>>(
    path: P,
    threads: usize,
) -> Result<(AlignmentReader, Header)> {
    let path_ref = path.as_ref();
    let format = AlignmentFormat::from_path(path_ref)?;
    let file = File::open(path_ref)
        .io_context(|| format!("Failed to open input alignments: {}", path_ref.display()))?;

    let (reader, header) = match format {
        AlignmentFormat::Bam => {
            let bgzf_reader = match NonZero::new(threads) {
                Some(worker_count) if threads > 1 => BgzfReaderEnum::MultiThreaded(
                    bgzf::MultithreadedReader::with_worker_count(worker_count, file),
                ),
                _ => BgzfReaderEnum::SingleThreaded(bgzf::Reader::new(file)),
            };
            let mut reader = bam::io::Reader::from(bgzf_reader);
            let header = reader
                .read_header()
                .io_context(|| format!("Failed to read header from: {}", path_ref.display()))?;
            (AlignmentReader::Bam(reader), header)
        }
        AlignmentFormat::Sam => {
            let mut reader = sam::io::Reader::new(BufReader::new(file));
            let header = reader
                .read_header()
                .io_context(|| format!("Failed to read header from: {}", path_ref.display()))?;
            (AlignmentReader::Sam(reader), header)
        }
    };

    Ok((reader, header))
}

/// A SAM or BAM writer whose header has been written.
pub enum AlignmentWriter {
    /// BAM sink
    Bam(bam::io::Writer<bgzf::Writer<File>>),
    /// SAM sink
    Sam(sam::io::Writer<BufWriter<File>>),
}

impl AlignmentWriter {
    /// Appends one record.
    ///
    /// # Errors
    /// Returns an error if the record cannot be encoded or written.
    pub fn write_record(&mut self, header: &Header, record: &RecordBuf) -> io::Result<()> {
        match self {
            AlignmentWriter::Bam(w) => w.write_alignment_record(header, record),
            AlignmentWriter::Sam(w) => w.write_alignment_record(header, record),
        }
    }

    /// Flushes buffered output; BAM outputs also get their EOF block.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn finish(&mut self, header: &Header) -> io::Result<()> {
        match self {
            AlignmentWriter::Bam(w) => w.finish(header),
            AlignmentWriter::Sam(w) => {
                w.finish(header)?;
                w.get_mut().flush()
            }
        }
    }
}

/// Create a SAM or BAM writer and write the header in one operation.
///
/// Any existing file at `path` is truncated.
///
/// # Errors
/// Returns an error if the file cannot be created or the header cannot be written
pub fn create_alignment_writer<P: AsRef<Path>>(
    path: P,
    format: AlignmentFormat,
    header: &Header,
) -> Result<AlignmentWriter> {
    let path_ref = path.as_ref();
    let file = File::create(path_ref)
        .io_context(|| format!("Failed to create output: {}", path_ref.display()))?;

    let writer = match format {
        AlignmentFormat::Bam => {
            let mut writer = bam::io::Writer::new(file);
            writer
                .write_header(header)
                .io_context(|| format!("Failed to write header to: {}", path_ref.display()))?;
            AlignmentWriter::Bam(writer)
        }
        AlignmentFormat::Sam => {
            let mut writer = sam::io::Writer::new(BufWriter::new(file));
            writer
                .write_header(header)
                .io_context(|| format!("Failed to write header to: {}", path_ref.display()))?;
            AlignmentWriter::Sam(writer)
        }
    };

    Ok(writer)
}
