//! Parquet encoding of normalized tables.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use log::debug;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use tabula_core::{Column, ColumnType, Table, Value};

use super::SinkError;

/// Encode `table` as a Snappy-compressed Parquet file held in memory.
///
/// Hidden columns are written alongside visible ones. A table with no
/// columns gains a single all-null `_empty` column so the file stays valid.
///
/// # Errors
///
/// Returns [`SinkError::Arrow`] or [`SinkError::Parquet`] when encoding fails.
pub fn encode_parquet(table: &Table, row_group_size: usize) -> Result<Vec<u8>, SinkError> {
    let table = table.with_sentinel_column();
    let schema = arrow_schema(table.columns());
    let properties = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_max_row_group_size(row_group_size.max(1))
        .set_statistics_enabled(EnabledStatistics::Chunk)
        .build();

    let mut writer = ArrowWriter::try_new(Vec::new(), Arc::clone(&schema), Some(properties))?;
    for rows in table.rows().chunks(row_group_size.max(1)) {
        writer.write(&record_batch(&schema, table.columns(), rows)?)?;
    }
    let bytes = writer.into_inner()?;
    debug!(
        "encoded {} rows into {} parquet bytes",
        table.row_count(),
        bytes.len()
    );
    Ok(bytes)
}

fn arrow_type(column_type: ColumnType) -> DataType {
    match column_type {
        ColumnType::Boolean => DataType::Boolean,
        ColumnType::Int64 => DataType::Int64,
        ColumnType::Float64 => DataType::Float64,
        ColumnType::Date => DataType::Date32,
        ColumnType::DateTime => DataType::Timestamp(TimeUnit::Microsecond, None),
        ColumnType::Null | ColumnType::Utf8 | ColumnType::Json => DataType::Utf8,
    }
}

fn arrow_schema(columns: &[Column]) -> SchemaRef {
    let fields: Vec<Field> = columns
        .iter()
        .map(|column| Field::new(&column.name, arrow_type(column.data_type), true))
        .collect();
    Arc::new(Schema::new(fields))
}

fn record_batch(
    schema: &SchemaRef,
    columns: &[Column],
    rows: &[Vec<Value>],
) -> Result<RecordBatch, SinkError> {
    let arrays = columns
        .iter()
        .enumerate()
        .map(|(position, column)| column_array(column.data_type, rows, position))
        .collect();
    Ok(RecordBatch::try_new(Arc::clone(schema), arrays)?)
}

fn column_array(column_type: ColumnType, rows: &[Vec<Value>], position: usize) -> ArrayRef {
    let cells = rows.iter().map(|row| row.get(position).unwrap_or(&Value::Null));
    match column_type {
        ColumnType::Boolean => Arc::new(
            cells
                .map(|cell| match cell {
                    Value::Bool(flag) => Some(*flag),
                    _ => None,
                })
                .collect::<BooleanArray>(),
        ),
        ColumnType::Int64 => Arc::new(
            cells
                .map(|cell| match cell {
                    Value::Int(n) => Some(*n),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        ColumnType::Float64 => Arc::new(
            cells
                .map(|cell| match cell {
                    Value::Float(n) => Some(*n),
                    Value::Int(n) => Some(*n as f64),
                    _ => None,
                })
                .collect::<Float64Array>(),
        ),
        ColumnType::Date => Arc::new(cells.map(Value::epoch_days).collect::<Date32Array>()),
        ColumnType::DateTime => Arc::new(
            cells
                .map(Value::epoch_micros)
                .collect::<TimestampMicrosecondArray>(),
        ),
        ColumnType::Null | ColumnType::Utf8 | ColumnType::Json => Arc::new(
            cells
                .map(|cell| match cell {
                    Value::Null => None,
                    Value::Text(text) | Value::Json(text) => Some(text.clone()),
                    other => Some(other.to_string()),
                })
                .collect::<StringArray>(),
        ),
    }
}
