//! Errors raised while turning payloads into tables.

use std::io;

use tabula_core::{DataPathError, ErrorKind, FileFormat, FormatError};
use thiserror::Error;

/// Failures while normalizing a payload.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NormalizeError {
    /// The declared format is not supported.
    #[error(transparent)]
    Format(#[from] FormatError),
    /// The staged payload could not be read back.
    #[error("failed to read staged payload: {source}")]
    Read {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },
    /// The payload does not parse as its declared format.
    #[error("malformed {format} payload: {message}")]
    Malformed {
        /// Declared format.
        format: FileFormat,
        /// Parser message.
        message: String,
    },
    /// A delimited row was malformed and the strict policy is in force.
    #[error("malformed row at line {line}: {message}")]
    MalformedRow {
        /// One-based line number, or zero when unknown.
        line: u64,
        /// Why the row was rejected.
        message: String,
    },
    /// A JSON payload is neither an array nor an object.
    #[error("expected a JSON array or object, found {found}")]
    NotTabular {
        /// JSON type encountered.
        found: &'static str,
    },
    /// A GeoJSON payload violates the `FeatureCollection` structure.
    #[error("invalid GeoJSON: {reason}")]
    InvalidGeoJson {
        /// What was wrong.
        reason: String,
    },
    /// The configured data path does not exist in the response.
    #[error(transparent)]
    DataPath(#[from] DataPathError),
}

impl NormalizeError {
    /// Category reported to callers.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Format(_) => ErrorKind::Validation,
            Self::Read { .. } => ErrorKind::SourceUnavailable,
            Self::Malformed { .. }
            | Self::MalformedRow { .. }
            | Self::NotTabular { .. }
            | Self::InvalidGeoJson { .. }
            | Self::DataPath(_) => ErrorKind::MalformedPayload,
        }
    }

    pub(crate) fn geojson(reason: impl Into<String>) -> Self {
        Self::InvalidGeoJson {
            reason: reason.into(),
        }
    }
}

pub(crate) const fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
