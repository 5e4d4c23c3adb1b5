//! JSON record normalization.

use std::io::Read;

use serde_json::Value as Json;
use tabula_core::{FileFormat, RowCap, TableBuilder, Value};

use super::error::json_type_name;
use crate::nesting::{MAX_JSON_DEPTH, depth_message, exceeds_depth};
use super::{NormalizeError, NormalizeOptions, Normalized};

/// Column holding scalar array elements.
pub const SCALAR_COLUMN: &str = "value";

/// Decode a JSON document from `reader`.
///
/// Blank input decodes to `None`.
pub(crate) fn decode_document<R: Read>(
    mut reader: R,
    format: FileFormat,
) -> Result<Option<Json>, NormalizeError> {
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;
    if buffer.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    if exceeds_depth(&buffer, MAX_JSON_DEPTH) {
        return Err(match format {
            FileFormat::GeoJson => NormalizeError::geojson(depth_message()),
            _ => NormalizeError::Malformed {
                format,
                message: depth_message(),
            },
        });
    }
    simd_json::serde::from_slice(&mut buffer)
        .map(Some)
        .map_err(|err| NormalizeError::Malformed {
            format,
            message: err.to_string(),
        })
}

/// Read a JSON array of records, or a single object, from `reader`.
///
/// # Errors
///
/// Returns [`NormalizeError::Malformed`] for invalid JSON and
/// [`NormalizeError::NotTabular`] for scalar documents.
pub fn read_json<R: Read>(
    reader: R,
    options: &NormalizeOptions,
) -> Result<Normalized, NormalizeError> {
    match decode_document(reader, FileFormat::Json)? {
        None => Ok(Normalized::empty()),
        Some(document) => {
            let records = records_from_value(document)?;
            Ok(records_to_table(records, options.cap))
        }
    }
}

/// Interpret `value` as a list of records.
///
/// Arrays are used as is and objects are wrapped as a single record.
///
/// # Errors
///
/// Returns [`NormalizeError::NotTabular`] for anything else.
pub fn records_from_value(value: Json) -> Result<Vec<Json>, NormalizeError> {
    match value {
        Json::Array(records) => Ok(records),
        Json::Object(_) => Ok(vec![value]),
        other => Err(NormalizeError::NotTabular {
            found: json_type_name(&other),
        }),
    }
}

/// Build a table from JSON records, keeping at most `cap` of them.
///
/// The column set is the union of keys in first-seen order. Scalar elements
/// land in the [`SCALAR_COLUMN`] column.
#[must_use]
pub fn records_to_table(records: Vec<Json>, cap: RowCap) -> Normalized {
    let (records, truncated) = cap.apply(records);
    let mut builder = TableBuilder::new();
    for record in records {
        match record {
            Json::Object(fields) => builder.push_record(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Value::from_json(value))),
            ),
            scalar => builder.push_record([(SCALAR_COLUMN.to_owned(), Value::from_json(scalar))]),
        }
    }
    Normalized {
        table: builder.finish(),
        truncated,
        dropped_rows: 0,
        geo_fields: Vec::new(),
    }
}
