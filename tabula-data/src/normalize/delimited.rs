//! Delimited text (CSV and TSV) normalization.
//!
//! The header row fixes the column order. Rows with the wrong number of
//! fields, or fields that are not UTF-8, are malformed: the permissive policy
//! drops and counts them, the strict policy fails the request. The row cap is
//! applied to well-formed rows only. Column types are inferred from the first
//! [`INFERENCE_SAMPLE_ROWS`] non-null values and widened when a later value
//! does not fit.

use std::io::Read;

use csv::{ByteRecord, ReaderBuilder};
use log::debug;
use tabula_core::{ColumnType, FileFormat, TableBuilder, Value};

use super::{MalformedRowPolicy, NormalizeError, NormalizeOptions, Normalized};

/// Cell texts read as null.
pub const NULL_MARKERS: [&str; 5] = ["", "NULL", "null", "N/A", "n/a"];

/// Non-null values per column sampled for type inference.
pub const INFERENCE_SAMPLE_ROWS: usize = 1_000;

type RawRow = Vec<Option<String>>;

/// Read delimited text from `reader`.
///
/// # Errors
///
/// Returns [`NormalizeError::MalformedRow`] under the strict policy and
/// [`NormalizeError::Read`] when the underlying reader fails.
pub fn read_delimited<R: Read>(
    reader: R,
    format: FileFormat,
    options: &NormalizeOptions,
) -> Result<Normalized, NormalizeError> {
    let delimiter = format.delimiter().unwrap_or(b',');
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.byte_headers().map_err(|err| into_read_error(err, format))?;
    if headers.is_empty() {
        return Ok(Normalized::empty());
    }
    let names: Vec<String> = headers
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect();
    let width = names.len();

    let mut rows: Vec<RawRow> = Vec::new();
    let mut dropped_rows = 0;
    let mut truncated = false;
    let mut record = ByteRecord::new();
    loop {
        let outcome = match csv_reader.read_byte_record(&mut record) {
            Ok(false) => break,
            Ok(true) => decode_record(&record, width),
            Err(err) => Err(skip_or_fail(err, format)?),
        };
        match outcome {
            Ok(cells) => {
                if !options.cap.admits(rows.len()) {
                    truncated = true;
                    break;
                }
                rows.push(cells);
            }
            Err(message) => {
                let line = record.position().map_or(0, csv::Position::line);
                if options.malformed_rows == MalformedRowPolicy::Reject {
                    return Err(NormalizeError::MalformedRow { line, message });
                }
                debug!("dropping malformed row at line {line}: {message}");
                dropped_rows += 1;
            }
        }
    }

    let types: Vec<ColumnType> = (0..width).map(|column| settle_type(&rows, column)).collect();
    let mut builder = TableBuilder::with_columns(names);
    for row in rows {
        builder.push_row(
            row.into_iter()
                .zip(&types)
                .map(|(cell, column_type)| typed_cell(cell, *column_type))
                .collect(),
        );
    }

    Ok(Normalized {
        table: builder.finish(),
        truncated,
        dropped_rows,
        geo_fields: Vec::new(),
    })
}

fn decode_record(record: &ByteRecord, width: usize) -> Result<RawRow, String> {
    if record.len() != width {
        return Err(format!("expected {width} fields, found {}", record.len()));
    }
    record
        .iter()
        .map(|field| {
            let text = std::str::from_utf8(field).map_err(|_| "field is not valid UTF-8".to_owned())?;
            Ok((!NULL_MARKERS.contains(&text)).then(|| text.to_owned()))
        })
        .collect()
}

/// I/O failures end the read; anything else only spoils the current row.
fn skip_or_fail(err: csv::Error, format: FileFormat) -> Result<String, NormalizeError> {
    match err.into_kind() {
        csv::ErrorKind::Io(source) => Err(NormalizeError::Read { source }),
        other => {
            debug!("{format} reader reported {other:?}");
            Ok(format!("{other:?}"))
        }
    }
}

fn into_read_error(err: csv::Error, format: FileFormat) -> NormalizeError {
    match err.into_kind() {
        csv::ErrorKind::Io(source) => NormalizeError::Read { source },
        other => NormalizeError::Malformed {
            format,
            message: format!("unreadable header row: {other:?}"),
        },
    }
}

fn non_null(rows: &[RawRow], column: usize) -> impl Iterator<Item = &str> {
    rows.iter()
        .filter_map(move |row| row.get(column).and_then(Option::as_deref))
}

fn settle_type(rows: &[RawRow], column: usize) -> ColumnType {
    let sampled = ColumnType::infer_text(non_null(rows, column).take(INFERENCE_SAMPLE_ROWS));
    if non_null(rows, column).all(|text| Value::parse_as(text, sampled).is_some()) {
        return sampled;
    }
    ColumnType::infer_text(non_null(rows, column))
}

fn typed_cell(cell: Option<String>, column_type: ColumnType) -> Value {
    match cell {
        None => Value::Null,
        Some(text) => Value::parse_as(&text, column_type).unwrap_or(Value::Text(text)),
    }
}
