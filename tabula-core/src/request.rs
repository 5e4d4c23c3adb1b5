//! Parse and conversion requests.

use std::io::Read;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::SourceDescriptor;

/// A request that could not be decoded.
#[derive(Debug, Error)]
#[error("invalid request: {source}")]
pub struct RequestError {
    #[from]
    source: serde_json::Error,
}

/// Read a source and return rows inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseRequest {
    /// Where to read from.
    pub source: SourceDescriptor,
    /// Whether this is a preview; previews of SQL sources get a row limit appended.
    #[serde(default)]
    pub preview: bool,
    /// Maximum rows returned; the configured default applies when absent.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ParseRequest {
    /// Build a non-preview request with the default limit.
    #[must_use]
    pub const fn new(source: SourceDescriptor) -> Self {
        Self {
            source,
            preview: false,
            limit: None,
        }
    }

    /// Mark the request as a preview capped at `limit`.
    #[must_use]
    pub const fn preview(mut self, limit: usize) -> Self {
        self.preview = true;
        self.limit = Some(limit);
        self
    }

    /// Decode a request from JSON.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RequestError> {
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Read a source in full and store it as an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Where to read from.
    pub source: SourceDescriptor,
    /// Pre-signed destination receiving the artifact by `PUT`.
    #[serde(alias = "outputUrl")]
    pub output_url: String,
}

impl ConversionRequest {
    /// Build a conversion request.
    pub fn new(source: SourceDescriptor, output_url: impl Into<String>) -> Self {
        Self {
            source,
            output_url: output_url.into(),
        }
    }

    /// Decode a request from JSON.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RequestError> {
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SourceKind;
    use rstest::rstest;

    #[rstest]
    fn decodes_parse_request_with_defaults() {
        let body = br#"{"source": {"type": "sql", "endpoint": "https://db", "database": "main", "query": "SELECT 1"}}"#;
        let request = ParseRequest::from_reader(&body[..]).expect("valid request");
        assert!(!request.preview);
        assert_eq!(request.limit, None);
        assert_eq!(request.source.kind(), SourceKind::Sql);
    }

    #[rstest]
    fn decodes_conversion_request_with_camel_case_url() {
        let body = br#"{"source": {"type": "file", "url": "https://f", "format": "csv"}, "outputUrl": "https://out"}"#;
        let request = ConversionRequest::from_reader(&body[..]).expect("valid request");
        assert_eq!(request.output_url, "https://out");
    }

    #[rstest]
    fn reports_missing_fields() {
        let err = ParseRequest::from_reader(&b"{}"[..]).expect_err("source is required");
        assert!(err.to_string().starts_with("invalid request:"));
    }
}
