//! Cell values and the column types inferred from them.
//!
//! Every normalizer produces [`Value`] cells. The variants are deliberately
//! flat: nested JSON structures are carried as raw JSON text so the table stays
//! rectangular and can be encoded column by column.

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Serialize, Serializer};

/// Days between 0001-01-01 (day 1 of the common era) and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// A single table cell.
///
/// # Examples
/// ```
/// use tabula_core::{ColumnType, Value};
///
/// let cell = Value::from_json(serde_json::json!(42));
/// assert_eq!(cell, Value::Int(42));
/// assert_eq!(cell.column_type(), ColumnType::Int64);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing or explicitly null.
    Null,
    /// Boolean cell.
    Bool(bool),
    /// Signed 64-bit integer cell.
    Int(i64),
    /// Double precision cell.
    Float(f64),
    /// UTF-8 text cell.
    Text(String),
    /// Calendar date without a time zone.
    Date(NaiveDate),
    /// Timestamp without a time zone.
    DateTime(NaiveDateTime),
    /// Raw JSON text for arrays and objects.
    Json(String),
}

impl Value {
    /// Convert a decoded JSON value into a cell.
    ///
    /// Arrays and objects are re-serialized verbatim into [`Value::Json`].
    #[must_use]
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(flag) => Self::Bool(flag),
            serde_json::Value::Number(number) => number
                .as_i64()
                .map(Self::Int)
                .or_else(|| number.as_f64().map(Self::Float))
                .unwrap_or_else(|| Self::Text(number.to_string())),
            serde_json::Value::String(text) => Self::Text(text),
            nested @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Self::Json(nested.to_string())
            }
        }
    }

    /// Render the cell as a JSON value for inline responses.
    ///
    /// Non-finite floats become `null`; dates are ISO-8601 strings and raw
    /// JSON cells stay strings.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(flag) => serde_json::Value::Bool(*flag),
            Self::Int(number) => serde_json::Value::from(*number),
            Self::Float(number) => serde_json::Number::from_f64(*number)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Text(text) | Self::Json(text) => serde_json::Value::String(text.clone()),
            Self::Date(_) | Self::DateTime(_) => serde_json::Value::String(self.to_string()),
        }
    }

    /// Whether the cell is [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The narrowest column type able to hold this cell.
    #[must_use]
    pub const fn column_type(&self) -> ColumnType {
        match self {
            Self::Null => ColumnType::Null,
            Self::Bool(_) => ColumnType::Boolean,
            Self::Int(_) => ColumnType::Int64,
            Self::Float(_) => ColumnType::Float64,
            Self::Text(_) => ColumnType::Utf8,
            Self::Date(_) => ColumnType::Date,
            Self::DateTime(_) => ColumnType::DateTime,
            Self::Json(_) => ColumnType::Json,
        }
    }

    /// Convert the cell so it fits a column of type `target`.
    ///
    /// `target` is expected to come from [`ColumnType::unify`], so only
    /// widening conversions are needed.
    #[must_use]
    pub fn coerce_to(self, target: ColumnType) -> Self {
        if self.is_null() || self.column_type() == target {
            return self;
        }
        match (self, target) {
            (Self::Int(number), ColumnType::Float64) => Self::Float(number as f64),
            (Self::Date(date), ColumnType::DateTime) => {
                Self::DateTime(date.and_time(NaiveTime::MIN))
            }
            (Self::Json(raw), _) => Self::Text(raw),
            (other, _) => Self::Text(other.to_string()),
        }
    }

    /// Parse CSV text as a cell of type `target`.
    ///
    /// Returns `None` when the text does not fit the type.
    #[must_use]
    pub fn parse_as(text: &str, target: ColumnType) -> Option<Self> {
        match target {
            ColumnType::Null => None,
            ColumnType::Boolean => parse_bool(text).map(Self::Bool),
            ColumnType::Int64 => text.parse::<i64>().ok().map(Self::Int),
            ColumnType::Float64 => parse_float(text).map(Self::Float),
            ColumnType::Date => NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .map(Self::Date),
            ColumnType::DateTime => parse_datetime(text).map(Self::DateTime),
            ColumnType::Utf8 => Some(Self::Text(text.to_owned())),
            ColumnType::Json => Some(Self::Json(text.to_owned())),
        }
    }

    /// Days since 1970-01-01 for date cells.
    #[must_use]
    pub fn epoch_days(&self) -> Option<i32> {
        match self {
            Self::Date(date) => Some(date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
            _ => None,
        }
    }

    /// Microseconds since the Unix epoch for timestamp cells.
    #[must_use]
    pub fn epoch_micros(&self) -> Option<i64> {
        match self {
            Self::DateTime(moment) => Some(moment.and_utc().timestamp_micros()),
            _ => None,
        }
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

fn parse_float(text: &str) -> Option<f64> {
    // Words such as "nan" or "infinity" parse as floats but read as text.
    if !text.bytes().any(|byte| byte.is_ascii_digit()) {
        return None;
    }
    text.parse::<f64>().ok().filter(|number| number.is_finite())
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(flag) => write!(f, "{flag}"),
            Self::Int(number) => write!(f, "{number}"),
            Self::Float(number) => write!(f, "{number}"),
            Self::Text(text) | Self::Json(text) => f.write_str(text),
            Self::Date(date) => write!(f, "{}", date.format(DATE_FORMAT)),
            Self::DateTime(moment) => write!(f, "{}", moment.format("%Y-%m-%dT%H:%M:%S%.f")),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(flag) => serializer.serialize_bool(*flag),
            Self::Int(number) => serializer.serialize_i64(*number),
            Self::Float(number) if number.is_finite() => serializer.serialize_f64(*number),
            Self::Float(_) => serializer.serialize_none(),
            Self::Text(text) | Self::Json(text) => serializer.serialize_str(text),
            Self::Date(_) | Self::DateTime(_) => serializer.collect_str(self),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Logical type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Every observed value was null.
    Null,
    /// Boolean values.
    Boolean,
    /// 64-bit integers.
    Int64,
    /// Double precision floats.
    Float64,
    /// Calendar dates.
    Date,
    /// Timestamps without a time zone.
    DateTime,
    /// UTF-8 strings.
    Utf8,
    /// Raw JSON text.
    Json,
}

impl ColumnType {
    /// Smallest type that can hold values of both `self` and `other`.
    ///
    /// # Examples
    /// ```
    /// use tabula_core::ColumnType;
    ///
    /// assert_eq!(ColumnType::Int64.unify(ColumnType::Float64), ColumnType::Float64);
    /// assert_eq!(ColumnType::Null.unify(ColumnType::Date), ColumnType::Date);
    /// assert_eq!(ColumnType::Boolean.unify(ColumnType::Int64), ColumnType::Utf8);
    /// ```
    #[must_use]
    pub const fn unify(self, other: Self) -> Self {
        match (self, other) {
            (Self::Null, any) | (any, Self::Null) => any,
            (Self::Int64, Self::Float64) | (Self::Float64, Self::Int64) => Self::Float64,
            (Self::Date, Self::DateTime) | (Self::DateTime, Self::Date) => Self::DateTime,
            (left, right) if left as u8 == right as u8 => left,
            _ => Self::Utf8,
        }
    }

    /// Infer the type of a text column from sampled, non-null values.
    ///
    /// Candidates are tried from most to least specific: integer, float,
    /// date, timestamp, and finally string.
    pub fn infer_text<'a, I>(samples: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        const CANDIDATES: [ColumnType; 4] = [
            ColumnType::Int64,
            ColumnType::Float64,
            ColumnType::Date,
            ColumnType::DateTime,
        ];
        let mut viable = CANDIDATES.to_vec();
        let mut seen_any = false;
        for text in samples {
            seen_any = true;
            viable.retain(|candidate| Value::parse_as(text, *candidate).is_some());
            if viable.is_empty() {
                return Self::Utf8;
            }
        }
        if !seen_any {
            return Self::Null;
        }
        viable.first().copied().unwrap_or(Self::Utf8)
    }

    /// Stable, lowercase type name used in schemas.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Utf8 => "string",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for ColumnType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
