//! Conversion of fetched payloads into [`Table`]s.
//!
//! Each supported [`FileFormat`] has its own reader. All of them honour a
//! [`RowCap`] and report whether rows beyond it were discarded, so preview
//! and full parses share one code path.
#![forbid(unsafe_code)]

mod delimited;
mod error;
mod geojson;
mod json;

use std::io::{BufReader, Read};

use tabula_core::{FileFormat, RowCap, Table};

use crate::fetch::DownloadedFile;

pub use delimited::{INFERENCE_SAMPLE_ROWS, NULL_MARKERS, read_delimited};
pub use error::NormalizeError;
pub use geojson::{
    FEATURE_INDEX_COLUMN, GEOMETRY_COLUMN, MAX_COORDINATE_DEPTH, area_type, count_coordinates,
    read_geojson,
};
pub use json::{SCALAR_COLUMN, read_json, records_from_value, records_to_table};

/// What to do with delimited rows that cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedRowPolicy {
    /// Skip the row and count it.
    #[default]
    Drop,
    /// Fail the whole payload.
    Reject,
}

/// Options shared by every reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Maximum rows to keep.
    pub cap: RowCap,
    /// Handling of malformed delimited rows.
    pub malformed_rows: MalformedRowPolicy,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self::new(RowCap::Unbounded)
    }
}

impl NormalizeOptions {
    /// Options with the given cap and the permissive row policy.
    #[must_use]
    pub const fn new(cap: RowCap) -> Self {
        Self {
            cap,
            malformed_rows: MalformedRowPolicy::Drop,
        }
    }

    /// Replace the malformed row policy.
    #[must_use]
    pub const fn with_malformed_rows(mut self, policy: MalformedRowPolicy) -> Self {
        self.malformed_rows = policy;
        self
    }
}

/// A normalized table with its bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// The rows that were kept.
    pub table: Table,
    /// Whether rows beyond the cap were discarded.
    pub truncated: bool,
    /// Malformed rows skipped under [`MalformedRowPolicy::Drop`].
    pub dropped_rows: usize,
    /// Hidden columns holding geometry.
    pub geo_fields: Vec<String>,
}

impl Normalized {
    /// A table with no rows and no columns.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            table: Table::empty(),
            truncated: false,
            dropped_rows: 0,
            geo_fields: Vec::new(),
        }
    }
}

/// Normalize `reader` as `format`.
///
/// # Errors
///
/// Propagates the format reader's [`NormalizeError`].
///
/// # Examples
/// ```
/// use tabula_core::{FileFormat, Value};
/// use tabula_data::normalize::{NormalizeOptions, normalize_reader};
///
/// let normalized =
///     normalize_reader("a,b\n1,x\n".as_bytes(), FileFormat::Csv, &NormalizeOptions::default())
///         .expect("valid CSV");
/// assert_eq!(normalized.table.value(0, "a"), Some(&Value::Int(1)));
/// ```
pub fn normalize_reader<R: Read>(
    reader: R,
    format: FileFormat,
    options: &NormalizeOptions,
) -> Result<Normalized, NormalizeError> {
    match format {
        FileFormat::Csv | FileFormat::Tsv => read_delimited(reader, format, options),
        FileFormat::Json => read_json(reader, options),
        FileFormat::GeoJson => read_geojson(reader, options),
    }
}

/// Normalize `reader` given a textual format tag.
///
/// # Errors
///
/// Returns [`NormalizeError::Format`] for unknown tags.
pub fn normalize_tag<R: Read>(
    reader: R,
    tag: &str,
    options: &NormalizeOptions,
) -> Result<Normalized, NormalizeError> {
    let format: FileFormat = tag.parse()?;
    normalize_reader(reader, format, options)
}

/// Normalize a staged download.
///
/// # Errors
///
/// Returns [`NormalizeError::Read`] when the scratch file cannot be reopened.
pub fn normalize_file(
    file: &DownloadedFile,
    format: FileFormat,
    options: &NormalizeOptions,
) -> Result<Normalized, NormalizeError> {
    let handle = file.reopen()?;
    normalize_reader(BufReader::new(handle), format, options)
}

/// Normalize decoded JSON records, as returned by API and SQL sources.
#[must_use]
pub fn normalize_records(records: Vec<serde_json::Value>, options: &NormalizeOptions) -> Normalized {
    records_to_table(records, options.cap)
}
