//! Schema and metadata describing a normalized table.

use std::time::Duration;

use serde::Serialize;

use crate::source::SourceKind;
use crate::table::{Column, EMPTY_SENTINEL_COLUMN, Table};
use crate::value::ColumnType;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Format tag reported for artifacts.
pub const ARTIFACT_FORMAT: &str = "parquet";
/// Text encoding reported for artifacts.
pub const ARTIFACT_ENCODING: &str = "utf-8";

/// Round to two decimal places.
#[must_use]
pub fn round_two(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Size in MiB, rounded to two decimals.
#[must_use]
pub fn megabytes(bytes: u64) -> f64 {
    round_two(bytes as f64 / BYTES_PER_MB)
}

/// Elapsed seconds, rounded to two decimals.
#[must_use]
pub fn seconds(elapsed: Duration) -> f64 {
    round_two(elapsed.as_secs_f64())
}

/// One visible column in a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaField {
    /// Column name.
    pub name: String,
    /// Inferred type.
    #[serde(rename = "type")]
    pub data_type: ColumnType,
    /// Whether any null was observed.
    pub nullable: bool,
}

/// Visible columns of a table with their types and nullability.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TableSchema {
    /// Fields in column order.
    pub fields: Vec<SchemaField>,
}

impl TableSchema {
    /// Describe the visible columns of `table`.
    ///
    /// # Examples
    /// ```
    /// use tabula_core::{ColumnType, TableBuilder, TableSchema, Value};
    ///
    /// let mut builder = TableBuilder::new();
    /// builder.push_record([("a".to_owned(), Value::Int(1)), ("_hidden".to_owned(), Value::Null)]);
    /// builder.push_record([("a".to_owned(), Value::Null)]);
    /// let schema = TableSchema::describe(&builder.finish());
    ///
    /// assert_eq!(schema.fields.len(), 1);
    /// assert_eq!(schema.fields[0].data_type, ColumnType::Int64);
    /// assert!(schema.fields[0].nullable);
    /// ```
    #[must_use]
    pub fn describe(table: &Table) -> Self {
        Self::from_columns(table, table.visible_columns())
    }

    /// Describe the columns an encoded artifact carries.
    ///
    /// Matches [`TableSchema::describe`] except that a table without columns
    /// is described by its [`EMPTY_SENTINEL_COLUMN`].
    #[must_use]
    pub fn describe_artifact(table: &Table) -> Self {
        let padded = table.with_sentinel_column();
        let columns = padded
            .columns()
            .iter()
            .filter(|column| !column.is_hidden() || column.name == EMPTY_SENTINEL_COLUMN);
        Self::from_columns(&padded, columns)
    }

    fn from_columns<'a>(table: &Table, columns: impl Iterator<Item = &'a Column>) -> Self {
        let fields = columns
            .map(|column| SchemaField {
                name: column.name.clone(),
                data_type: column.data_type,
                nullable: table.column_values(&column.name).any(crate::Value::is_null),
            })
            .collect();
        Self { fields }
    }

    /// Column names in order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.fields.iter().map(|field| field.name.clone()).collect()
    }

    /// Column name to type name, in column order.
    #[must_use]
    pub fn type_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.fields
            .iter()
            .map(|field| {
                (
                    field.name.clone(),
                    serde_json::Value::from(field.data_type.name()),
                )
            })
            .collect()
    }
}

/// Metadata returned with an inline parse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseMetadata {
    /// Rows returned.
    pub row_count: usize,
    /// Visible columns.
    pub column_count: usize,
    /// Visible column names.
    pub columns: Vec<String>,
    /// Column name to type name.
    pub schema: serde_json::Map<String, serde_json::Value>,
    /// Visible fields with nullability.
    pub fields: Vec<SchemaField>,
    /// Whether rows were cut by the row cap.
    pub truncated: bool,
    /// Malformed rows dropped while reading delimited text.
    pub dropped_rows: usize,
    /// Hidden column names.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hidden_fields: Vec<String>,
    /// Columns holding raw geometry.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub geo_fields: Vec<String>,
    /// Whether a row limit was appended to a SQL query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_modified: Option<bool>,
    /// Kind of the source read.
    pub source_type: SourceKind,
}

impl ParseMetadata {
    /// Describe `table` as read from a `source_type` source.
    #[must_use]
    pub fn describe(table: &Table, source_type: SourceKind) -> Self {
        let schema = TableSchema::describe(table);
        Self {
            row_count: table.row_count(),
            column_count: schema.fields.len(),
            columns: schema.column_names(),
            schema: schema.type_map(),
            fields: schema.fields,
            truncated: false,
            dropped_rows: 0,
            hidden_fields: table
                .hidden_columns()
                .map(|column| column.name.clone())
                .collect(),
            geo_fields: Vec::new(),
            query_modified: None,
            source_type,
        }
    }

    /// Record whether the row cap cut the table.
    #[must_use]
    pub const fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    /// Record how many malformed rows were dropped.
    #[must_use]
    pub const fn with_dropped_rows(mut self, dropped_rows: usize) -> Self {
        self.dropped_rows = dropped_rows;
        self
    }

    /// Record which columns hold geometry.
    #[must_use]
    pub fn with_geo_fields(mut self, geo_fields: Vec<String>) -> Self {
        self.geo_fields = geo_fields;
        self
    }

    /// Record whether a SQL query was rewritten.
    #[must_use]
    pub const fn with_query_modified(mut self, modified: bool) -> Self {
        self.query_modified = Some(modified);
        self
    }
}

/// Schema block of a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSchema {
    /// Visible fields.
    pub fields: Vec<SchemaField>,
    /// Always [`ARTIFACT_FORMAT`].
    pub format: &'static str,
    /// Always [`ARTIFACT_ENCODING`].
    pub encoding: &'static str,
}

impl From<TableSchema> for ArtifactSchema {
    fn from(schema: TableSchema) -> Self {
        Self {
            fields: schema.fields,
            format: ARTIFACT_FORMAT,
            encoding: ARTIFACT_ENCODING,
        }
    }
}

/// Metadata returned after a conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionMetadata {
    /// Rows written.
    pub rows: usize,
    /// Visible columns written.
    pub columns: usize,
    /// Artifact schema.
    pub schema: ArtifactSchema,
    /// Artifact size in MiB, two decimals.
    pub file_size_mb: f64,
    /// Wall time in seconds, two decimals.
    pub processing_time_seconds: f64,
    /// Kind of the source read.
    pub source_type: SourceKind,
}

impl ConversionMetadata {
    /// Describe an artifact of `artifact_bytes` encoded from `table`.
    ///
    /// An empty table is reported with the sentinel column it is encoded with.
    #[must_use]
    pub fn describe(
        table: &Table,
        source_type: SourceKind,
        artifact_bytes: u64,
        elapsed: Duration,
    ) -> Self {
        let schema = ArtifactSchema::from(TableSchema::describe_artifact(table));
        Self {
            rows: table.row_count(),
            columns: schema.fields.len(),
            schema,
            file_size_mb: megabytes(artifact_bytes),
            processing_time_seconds: seconds(elapsed),
            source_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TableBuilder, Value};
    use rstest::rstest;

    #[rstest]
    #[case(0, 0.0)]
    #[case(1_048_576, 1.0)]
    #[case(1_572_864, 1.5)]
    #[case(5_000, 0.0)]
    #[case(10_486, 0.01)]
    fn reports_megabytes(#[case] bytes: u64, #[case] expected: f64) {
        assert!((megabytes(bytes) - expected).abs() < f64::EPSILON);
    }

    #[rstest]
    fn rounds_elapsed_time() {
        assert!((seconds(Duration::from_millis(1_234)) - 1.23).abs() < f64::EPSILON);
    }

    #[rstest]
    fn parse_metadata_lists_hidden_columns_separately() {
        let mut builder = TableBuilder::new();
        builder.push_record([
            ("name".to_owned(), Value::from("a")),
            ("_feature_index".to_owned(), Value::Int(0)),
        ]);
        let metadata = ParseMetadata::describe(&builder.finish(), SourceKind::File);

        assert_eq!(metadata.columns, ["name"]);
        assert_eq!(metadata.column_count, 1);
        assert_eq!(metadata.hidden_fields, ["_feature_index"]);
        assert!(!metadata.schema.contains_key("_feature_index"));
    }

    #[rstest]
    fn conversion_metadata_serializes_artifact_block() {
        let metadata = ConversionMetadata::describe(
            &Table::empty(),
            SourceKind::Sql,
            0,
            Duration::from_secs(2),
        );
        let rendered = serde_json::to_value(&metadata).expect("serialize");
        assert_eq!(rendered["schema"]["format"], "parquet");
        assert_eq!(rendered["schema"]["encoding"], "utf-8");
        assert_eq!(rendered["source_type"], "sql");
    }

    #[rstest]
    fn empty_conversion_reports_sentinel_column() {
        let metadata = ConversionMetadata::describe(
            &Table::empty(),
            SourceKind::Sql,
            0,
            Duration::ZERO,
        );
        assert_eq!(metadata.rows, 0);
        assert_eq!(metadata.columns, 1);
        assert_eq!(metadata.schema.fields[0].name, EMPTY_SENTINEL_COLUMN);
        assert_eq!(metadata.schema.fields[0].data_type, ColumnType::Utf8);
    }

    #[rstest]
    fn conversion_schema_skips_hidden_columns_of_populated_tables() {
        let mut builder = TableBuilder::new();
        builder.push_record([
            ("name".to_owned(), Value::from("a")),
            ("_geometry".to_owned(), Value::Null),
        ]);
        let metadata = ConversionMetadata::describe(
            &builder.finish(),
            SourceKind::File,
            0,
            Duration::ZERO,
        );
        assert_eq!(metadata.columns, 1);
        assert_eq!(metadata.schema.fields[0].name, "name");
    }
}
