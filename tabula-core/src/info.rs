//! Capability summary for clients.

use serde::Serialize;

use crate::config::ServiceConfig;
use crate::schema::ARTIFACT_FORMAT;
use crate::source::{FileFormat, SourceKind};

/// Limits advertised to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceLimits {
    /// Largest file download in MiB.
    pub max_file_size_mb: u64,
    /// Largest API response in MiB.
    pub max_api_response_mb: u64,
    /// Largest SQL response in MiB.
    pub max_sql_response_mb: u64,
    /// Requests processed at once.
    pub max_concurrent_conversions: usize,
    /// Whole-request deadline in seconds.
    pub max_processing_time_seconds: u64,
    /// Rows returned without an explicit limit.
    pub default_preview_rows: usize,
    /// Largest parse limit.
    pub max_preview_rows: usize,
    /// Row limit appended to SQL conversions.
    pub default_sql_limit: usize,
}

/// What the service accepts and produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceInfo {
    /// Crate version.
    pub version: &'static str,
    /// Accepted file formats.
    pub supported_formats: Vec<FileFormat>,
    /// Accepted source kinds.
    pub supported_sources: Vec<SourceKind>,
    /// Artifact format.
    pub output_format: &'static str,
    /// Active limits.
    pub limits: ServiceLimits,
}

impl ServiceInfo {
    /// Summarize `config`.
    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            supported_formats: FileFormat::ALL.to_vec(),
            supported_sources: vec![SourceKind::File, SourceKind::Api, SourceKind::Sql],
            output_format: ARTIFACT_FORMAT,
            limits: ServiceLimits {
                max_file_size_mb: config.max_file_size_mb,
                max_api_response_mb: config.max_api_response_mb,
                max_sql_response_mb: config.max_sql_response_mb,
                max_concurrent_conversions: config.max_concurrent_conversions,
                max_processing_time_seconds: config.max_processing_time.as_secs(),
                default_preview_rows: config.default_preview_rows,
                max_preview_rows: config.max_preview_rows,
                default_sql_limit: config.default_sql_limit,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn reflects_configured_limits() {
        let info = ServiceInfo::from_config(&ServiceConfig::default().with_max_file_size_mb(42));
        let rendered = serde_json::to_value(&info).expect("serialize");

        assert_eq!(rendered["limits"]["max_file_size_mb"], 42);
        assert_eq!(
            rendered["supported_formats"],
            serde_json::json!(["csv", "tsv", "json", "geojson"])
        );
        assert_eq!(rendered["output_format"], "parquet");
    }
}
