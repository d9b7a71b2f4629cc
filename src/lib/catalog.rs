//! The catalog of target cell barcodes.
//!
//! A [`KeyCatalog`] is built once from a cell metadata CSV (first column = barcode, first row =
//! header) and is read-only afterwards. Each unique canonical barcode is assigned a dense
//! [`BucketId`] in order of first appearance, which the bucket store uses to index its buckets,
//! and an output path `<output_dir>/<barcode><extension>`.
//!
//! # Example
//!
//! ```
//! use fgdemux_lib::catalog::KeyCatalog;
//! use std::path::Path;
//!
//! let catalog = KeyCatalog::from_barcodes(["AAA-1", "BBB-1", "AAA-2"], Path::new("out"), ".bam")
//!     .unwrap();
//! assert_eq!(catalog.len(), 2);
//! assert!(catalog.lookup("AAA").is_some());
//! assert_eq!(catalog.catch_all_path(), Path::new("out/noise.bam"));
//! ```

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use log::{debug, info, warn};

use crate::barcode::{CATCH_ALL_NAME, canonicalize, has_suffix};
use crate::errors::{DemuxError, IoContext, Result};

/// Dense index of a catalog barcode; also the index of its bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketId(usize);

impl BucketId {
    /// The position of this barcode in catalog order.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// One target barcode and where its records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Canonical barcode (suffix removed).
    pub barcode: String,
    /// Primary output path for this barcode.
    pub output: PathBuf,
}

/// Immutable mapping from canonical barcode to bucket.
#[derive(Debug, Clone)]
pub struct KeyCatalog {
    entries: Vec<CatalogEntry>,
    index: AHashMap<String, BucketId>,
    output_dir: PathBuf,
    extension: String,
}

impl KeyCatalog {
    /// Loads the catalog from a cell metadata CSV.
    ///
    /// # Arguments
    /// * `metadata` - CSV whose first row is a header and whose first column is the barcode
    /// * `output_dir` - Directory the per-barcode outputs are written to
    /// * `extension` - Extension of the outputs including the dot (e.g. `.bam`)
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or read, or if a barcode collides with
    /// the catch-all output name. Malformed rows are logged and skipped.
    pub fn load(metadata: &Path, output_dir: &Path, extension: &str) -> Result<Self> {
        let file = File::open(metadata)
            .io_context(|| format!("Failed to open barcodes CSV: {}", metadata.display()))?;
        let catalog = Self::from_reader(file, metadata, output_dir, extension)?;
        info!("Loaded {} target barcodes from {}", catalog.len(), metadata.display());
        Ok(catalog)
    }

    /// Builds the catalog from any CSV source; `source` is only used in messages.
    ///
    /// # Errors
    /// See [`KeyCatalog::load`].
    pub fn from_reader<R: Read>(
        reader: R,
        source: &Path,
        output_dir: &Path,
        extension: &str,
    ) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut catalog = Self::empty(output_dir, extension);
        let mut unsuffixed = 0usize;

        for result in csv_reader.records() {
            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    let line = e.position().map_or(0, csv::Position::line);
                    let err = match e.into_kind() {
                        csv::ErrorKind::Io(io_err) => DemuxError::io(
                            format!("Failed to read barcodes CSV: {}", source.display()),
                            io_err,
                        ),
                        other => DemuxError::MalformedRow {
                            path: source.to_path_buf(),
                            line,
                            reason: format!("{other:?}"),
                        },
                    };
                    skip_row(err)?;
                    continue;
                }
            };

            if row.iter().all(str::is_empty) {
                continue;
            }

            let line = row.position().map_or(0, csv::Position::line);
            let raw = row.get(0).unwrap_or_default();
            if let Some(reason) = unusable_reason(raw) {
                skip_row(DemuxError::MalformedRow { path: source.to_path_buf(), line, reason })?;
                continue;
            }
            if !has_suffix(raw) {
                unsuffixed += 1;
                debug!("Barcode '{raw}' on line {line} has no '-' suffix, using it whole");
            }
            catalog.insert(raw)?;
        }

        if unsuffixed > 0 {
            warn!(
                "{unsuffixed} barcode(s) in {} have no '-' suffix and were used whole; \
                 please check the barcodes CSV",
                source.display()
            );
        }
        if catalog.is_empty() {
            warn!("No target barcodes in {}; all records will go to the catch-all", source.display());
        }
        Ok(catalog)
    }

    /// Builds the catalog directly from raw barcodes.
    ///
    /// Barcodes that cannot name an output file are logged and skipped.
    ///
    /// # Errors
    /// Returns an error if a barcode collides with the catch-all output name.
    pub fn from_barcodes<I, S>(raw_barcodes: I, output_dir: &Path, extension: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut catalog = Self::empty(output_dir, extension);
        for raw in raw_barcodes {
            let raw = raw.as_ref();
            match unusable_reason(raw) {
                Some(reason) => warn!("Skipping {reason}"),
                None => catalog.insert(raw)?,
            }
        }
        Ok(catalog)
    }

    fn empty(output_dir: &Path, extension: &str) -> Self {
        Self {
            entries: Vec::new(),
            index: AHashMap::new(),
            output_dir: output_dir.to_path_buf(),
            extension: extension.to_string(),
        }
    }

    /// Adds a raw barcode; duplicates of an existing canonical barcode are ignored.
    fn insert(&mut self, raw: &str) -> Result<()> {
        let barcode = canonicalize(raw);
        if self.index.contains_key(barcode) {
            return Ok(());
        }
        if barcode.eq_ignore_ascii_case(CATCH_ALL_NAME) {
            return Err(DemuxError::ReservedBarcode { barcode: barcode.to_string() });
        }
        let id = BucketId(self.entries.len());
        let output = self.output_path(barcode);
        self.entries.push(CatalogEntry { barcode: barcode.to_string(), output });
        self.index.insert(barcode.to_string(), id);
        Ok(())
    }

    fn output_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{name}{}", self.extension))
    }

    /// Finds the bucket for a canonical barcode.
    #[must_use]
    pub fn lookup(&self, barcode: &str) -> Option<BucketId> {
        self.index.get(barcode).copied()
    }

    /// The entry for a bucket id.
    ///
    /// # Panics
    /// Panics if `id` did not come from this catalog.
    #[must_use]
    pub fn entry(&self, id: BucketId) -> &CatalogEntry {
        &self.entries[id.0]
    }

    /// Entries in catalog (first appearance) order.
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Bucket ids paired with entries, in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (BucketId, &CatalogEntry)> {
        self.entries.iter().enumerate().map(|(i, e)| (BucketId(i), e))
    }

    /// Number of unique canonical barcodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the catalog holds no barcodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Output path of the catch-all bucket.
    #[must_use]
    pub fn catch_all_path(&self) -> PathBuf {
        self.output_path(CATCH_ALL_NAME)
    }

    /// Extension shared by all outputs, including the dot.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }
}

/// Why a raw barcode cannot select an output file, if it cannot.
fn unusable_reason(raw: &str) -> Option<String> {
    let barcode = canonicalize(raw);
    if raw.is_empty() {
        Some("missing barcode in the first field".to_string())
    } else if barcode.is_empty() {
        Some(format!("barcode '{raw}' is empty once its suffix is removed"))
    } else if barcode == "." || barcode == ".." || barcode.contains(['/', '\\']) {
        Some(format!("barcode '{raw}' cannot be used as an output file name"))
    } else {
        None
    }
}

/// Logs and skips a recoverable row error; any other error aborts loading.
fn skip_row(err: DemuxError) -> Result<()> {
    if err.is_recoverable() {
        warn!("Skipping {err}");
        Ok(())
    } else {
        Err(err)
    }
}
