//! Rectangular tables assembled by the normalizers.
//!
//! A [`Table`] holds an ordered column list and positional rows. Rows are
//! usually built through [`TableBuilder`], which unions keys across records,
//! backfills missing cells with nulls and settles each column on a single
//! type once every row has been seen.

use std::borrow::Cow;
use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::value::{ColumnType, Value};

/// Columns whose name starts with this prefix are hidden from public listings.
pub const HIDDEN_COLUMN_PREFIX: char = '_';

/// Sentinel column added to column-less tables before encoding an artifact.
pub const EMPTY_SENTINEL_COLUMN: &str = "_empty";

/// Name and inferred type of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Column name as it appears in the source.
    pub name: String,
    /// Type settled after all rows were observed.
    pub data_type: ColumnType,
}

impl Column {
    /// Construct a column description.
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    /// Whether the column is internal to the pipeline.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with(HIDDEN_COLUMN_PREFIX)
    }
}

/// Errors raised when assembling a table from explicit parts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    /// A row does not have one cell per column.
    #[error("row {row} has {found} cells but the table has {expected} columns")]
    RaggedRow {
        /// Zero-based row index.
        row: usize,
        /// Number of declared columns.
        expected: usize,
        /// Number of cells in the row.
        found: usize,
    },
}

/// Normalized rows and columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// A table with no columns and no rows.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Assemble a table, checking that every row matches the column count.
    pub fn from_parts(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Result<Self, TableError> {
        if let Some((row, cells)) = rows
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != columns.len())
        {
            return Err(TableError::RaggedRow {
                row,
                expected: columns.len(),
                found: cells.len(),
            });
        }
        Ok(Self { columns, rows })
    }

    /// All columns, hidden ones included.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Columns visible to callers.
    pub fn visible_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|column| !column.is_hidden())
    }

    /// Internal columns retained in rows.
    pub fn hidden_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|column| column.is_hidden())
    }

    /// Positional rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of visible columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.visible_columns().count()
    }

    /// Position of the column called `name`.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    /// Look up the cell at `row` in the column called `name`.
    #[must_use]
    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        let index = self.column_index(name)?;
        self.rows.get(row)?.get(index)
    }

    /// Cells of the column called `name`, top to bottom.
    pub fn column_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Value> + 'a {
        let index = self.column_index(name);
        self.rows
            .iter()
            .filter_map(move |row| index.and_then(|position| row.get(position)))
    }

    /// Drop every row past `limit`.
    pub fn truncate(&mut self, limit: usize) {
        self.rows.truncate(limit);
    }

    /// Render each row as a JSON object keyed by column name.
    ///
    /// Hidden columns are included so callers can reach geometry and
    /// feature indices.
    #[must_use]
    pub fn row_objects(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| (column.name.clone(), value.to_json()))
                    .collect()
            })
            .collect()
    }

    /// Borrow the table, adding the `_empty` sentinel when it has no columns.
    ///
    /// Columnar writers cannot encode a schema without fields.
    #[must_use]
    pub fn with_sentinel_column(&self) -> Cow<'_, Self> {
        if !self.columns.is_empty() {
            return Cow::Borrowed(self);
        }
        Cow::Owned(Self {
            columns: vec![Column::new(EMPTY_SENTINEL_COLUMN, ColumnType::Utf8)],
            rows: self.rows.iter().map(|_| vec![Value::Null]).collect(),
        })
    }
}

/// Incrementally assembles a [`Table`].
///
/// Columns appear in first-seen order. Records that omit a column get a null
/// in that position.
///
/// # Examples
/// ```
/// use tabula_core::{TableBuilder, Value};
///
/// let mut builder = TableBuilder::new();
/// builder.push_record([("a".to_owned(), Value::Int(1))]);
/// builder.push_record([("b".to_owned(), Value::from("x"))]);
/// let table = builder.finish();
///
/// assert_eq!(table.row_count(), 2);
/// assert_eq!(table.value(0, "b"), Some(&Value::Null));
/// ```
#[derive(Debug, Default)]
pub struct TableBuilder {
    names: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Value>>,
}

impl TableBuilder {
    /// Start with no columns.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a fixed header.
    ///
    /// Repeated names are disambiguated with a `_duplicated_{n}` suffix.
    pub fn with_columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = Self::new();
        for name in names {
            let name = name.into();
            let unique = builder.unique_name(name);
            builder.column_position(unique);
        }
        builder
    }

    /// Names of the columns seen so far.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Number of rows pushed so far.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Append a keyed record. Later duplicates of a key overwrite earlier ones.
    pub fn push_record<I>(&mut self, record: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut row = vec![Value::Null; self.names.len()];
        for (name, value) in record {
            let position = self.column_position(name);
            if position >= row.len() {
                row.resize(position + 1, Value::Null);
            }
            if let Some(cell) = row.get_mut(position) {
                *cell = value;
            }
        }
        self.rows.push(row);
    }

    /// Append a positional row matching the current columns.
    ///
    /// Short rows are padded with nulls; surplus cells are discarded.
    pub fn push_row(&mut self, mut cells: Vec<Value>) {
        cells.resize(self.names.len(), Value::Null);
        self.rows.push(cells);
    }

    /// Settle column types and produce the table.
    ///
    /// Each column takes the unified type of its cells; cells of a narrower
    /// type are widened to match.
    #[must_use]
    pub fn finish(self) -> Table {
        let width = self.names.len();
        let mut rows = self.rows;
        for row in &mut rows {
            row.resize(width, Value::Null);
        }

        let columns: Vec<Column> = self
            .names
            .into_iter()
            .enumerate()
            .map(|(position, name)| {
                let data_type = rows
                    .iter()
                    .filter_map(|row| row.get(position))
                    .fold(ColumnType::Null, |acc, value| acc.unify(value.column_type()));
                Column { name, data_type }
            })
            .collect();

        for row in &mut rows {
            for (cell, column) in row.iter_mut().zip(&columns) {
                if !cell.is_null() && cell.column_type() != column.data_type {
                    let value = std::mem::replace(cell, Value::Null);
                    *cell = value.coerce_to(column.data_type);
                }
            }
        }

        Table { columns, rows }
    }

    fn column_position(&mut self, name: String) -> usize {
        if let Some(position) = self.index.get(&name) {
            return *position;
        }
        let position = self.names.len();
        self.index.insert(name.clone(), position);
        self.names.push(name);
        position
    }

    fn unique_name(&self, name: String) -> String {
        if !self.index.contains_key(&name) {
            return name;
        }
        let mut suffix = 0_usize;
        loop {
            let candidate = format!("{name}_duplicated_{suffix}");
            if !self.index.contains_key(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), value.clone()))
            .collect()
    }

    #[rstest]
    fn unions_keys_in_first_seen_order() {
        let mut builder = TableBuilder::new();
        builder.push_record(record(&[("a", Value::Int(1)), ("b", Value::Int(2))]));
        builder.push_record(record(&[("c", Value::from("x")), ("a", Value::Int(3))]));
        let table = builder.finish();

        let names: Vec<_> = table.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(table.value(0, "c"), Some(&Value::Null));
        assert_eq!(table.value(1, "b"), Some(&Value::Null));
        assert_eq!(table.value(1, "a"), Some(&Value::Int(3)));
    }

    #[rstest]
    fn widens_mixed_numeric_columns() {
        let mut builder = TableBuilder::new();
        builder.push_record(record(&[("n", Value::Int(1))]));
        builder.push_record(record(&[("n", Value::Float(2.5))]));
        let table = builder.finish();

        assert_eq!(table.columns()[0].data_type, ColumnType::Float64);
        assert_eq!(table.value(0, "n"), Some(&Value::Float(1.0)));
    }

    #[rstest]
    fn incompatible_values_fall_back_to_text() {
        let mut builder = TableBuilder::new();
        builder.push_record(record(&[("v", Value::Bool(true))]));
        builder.push_record(record(&[("v", Value::Int(4))]));
        let table = builder.finish();

        assert_eq!(table.columns()[0].data_type, ColumnType::Utf8);
        assert_eq!(table.value(1, "v"), Some(&Value::from("4")));
    }

    #[rstest]
    fn disambiguates_repeated_headers() {
        let builder = TableBuilder::with_columns(["id", "id", "name"]);
        assert_eq!(builder.column_names(), ["id", "id_duplicated_0", "name"]);
    }

    #[rstest]
    fn hidden_columns_are_not_counted() {
        let mut builder = TableBuilder::new();
        builder.push_record(record(&[("a", Value::Int(1)), ("_geometry", Value::Null)]));
        let table = builder.finish();

        assert_eq!(table.column_count(), 1);
        assert_eq!(table.hidden_columns().count(), 1);
        assert!(table.row_objects()[0].contains_key("_geometry"));
    }

    #[rstest]
    fn sentinel_is_added_only_to_column_less_tables() {
        let empty = Table::empty();
        let padded = empty.with_sentinel_column();
        assert_eq!(padded.columns()[0].name, EMPTY_SENTINEL_COLUMN);
        assert_eq!(padded.column_count(), 0);

        let table = Table::from_parts(vec![Column::new("a", ColumnType::Int64)], vec![])
            .expect("valid table");
        assert!(matches!(table.with_sentinel_column(), Cow::Borrowed(_)));
    }

    #[rstest]
    fn rejects_ragged_rows() {
        let err = Table::from_parts(
            vec![Column::new("a", ColumnType::Int64)],
            vec![vec![Value::Int(1), Value::Int(2)]],
        )
        .expect_err("ragged row should fail");
        assert_eq!(
            err,
            TableError::RaggedRow {
                row: 0,
                expected: 1,
                found: 2
            }
        );
    }
}
