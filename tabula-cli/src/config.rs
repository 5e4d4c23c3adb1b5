//! Layered service overrides shared by every subcommand.

use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use tabula_core::ServiceConfig;

use crate::CliError;

pub(crate) const ARG_MAX_CONCURRENT_CONVERSIONS: &str = "max-concurrent-conversions";
pub(crate) const ARG_DEFAULT_PREVIEW_ROWS: &str = "default-preview-rows";
pub(crate) const ARG_DEFAULT_SQL_LIMIT: &str = "default-sql-limit";
pub(crate) const ARG_ROW_GROUP_SIZE: &str = "row-group-size";
pub(crate) const ARG_MAX_PROCESSING_SECS: &str = "max-processing-secs";

const MUST_BE_POSITIVE: &str = "must be greater than zero";

/// Overrides applied on top of [`ServiceConfig::default`].
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Adjust service limits for this invocation. Values can come \
                 from CLI flags, configuration files, or environment \
                 variables; anything unset keeps its built-in default.",
    about = "Service limit overrides"
)]
#[ortho_config(prefix = "TABULA")]
pub(crate) struct ServiceArgs {
    /// Directory holding in-flight downloads.
    #[arg(long, value_name = "dir")]
    #[serde(default)]
    pub(crate) scratch_dir: Option<Utf8PathBuf>,
    /// Largest file download in MiB.
    #[arg(long, value_name = "mib")]
    #[serde(default)]
    pub(crate) max_file_size_mb: Option<u64>,
    /// Largest API response in MiB.
    #[arg(long, value_name = "mib")]
    #[serde(default)]
    pub(crate) max_api_response_mb: Option<u64>,
    /// Largest SQL response in MiB.
    #[arg(long, value_name = "mib")]
    #[serde(default)]
    pub(crate) max_sql_response_mb: Option<u64>,
    /// Deadline for a whole request, in seconds.
    #[arg(long = ARG_MAX_PROCESSING_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) max_processing_secs: Option<u64>,
    /// Requests processed at once.
    #[arg(long = ARG_MAX_CONCURRENT_CONVERSIONS, value_name = "n")]
    #[serde(default)]
    pub(crate) max_concurrent_conversions: Option<usize>,
    /// Rows returned by a parse without an explicit limit.
    #[arg(long = ARG_DEFAULT_PREVIEW_ROWS, value_name = "rows")]
    #[serde(default)]
    pub(crate) default_preview_rows: Option<usize>,
    /// Row limit appended to SQL queries during conversion.
    #[arg(long = ARG_DEFAULT_SQL_LIMIT, value_name = "rows")]
    #[serde(default)]
    pub(crate) default_sql_limit: Option<usize>,
    /// Rows per Parquet row group.
    #[arg(long = ARG_ROW_GROUP_SIZE, value_name = "rows")]
    #[serde(default)]
    pub(crate) row_group_size: Option<usize>,
    /// Age in seconds after which scratch files are swept.
    #[arg(long, value_name = "secs")]
    #[serde(default)]
    pub(crate) scratch_max_age_secs: Option<u64>,
}

impl ServiceArgs {
    /// Merge flags with configuration files and `TABULA_*` variables.
    pub(crate) fn into_config(self) -> Result<ServiceConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        merged.apply(ServiceConfig::default())
    }

    /// Overlay every set field onto `config`.
    pub(crate) fn apply(&self, mut config: ServiceConfig) -> Result<ServiceConfig, CliError> {
        if let Some(dir) = &self.scratch_dir {
            config.scratch_dir = dir.clone().into_std_path_buf();
        }
        if let Some(mb) = self.max_file_size_mb {
            config.max_file_size_mb = mb;
        }
        if let Some(mb) = self.max_api_response_mb {
            config.max_api_response_mb = mb;
        }
        if let Some(mb) = self.max_sql_response_mb {
            config.max_sql_response_mb = mb;
        }
        if let Some(secs) = positive(self.max_processing_secs, ARG_MAX_PROCESSING_SECS)? {
            config.max_processing_time = Duration::from_secs(secs);
        }
        if let Some(limit) =
            positive(self.max_concurrent_conversions, ARG_MAX_CONCURRENT_CONVERSIONS)?
        {
            config.max_concurrent_conversions = limit;
        }
        if let Some(rows) = positive(self.default_preview_rows, ARG_DEFAULT_PREVIEW_ROWS)? {
            if rows > config.max_preview_rows {
                return Err(CliError::InvalidOverride {
                    field: ARG_DEFAULT_PREVIEW_ROWS,
                    reason: "exceeds the largest preview size",
                });
            }
            config.default_preview_rows = rows;
        }
        if let Some(rows) = positive(self.default_sql_limit, ARG_DEFAULT_SQL_LIMIT)? {
            config.default_sql_limit = rows;
        }
        if let Some(rows) = positive(self.row_group_size, ARG_ROW_GROUP_SIZE)? {
            config.row_group_size = rows;
        }
        if let Some(secs) = self.scratch_max_age_secs {
            config.scratch_max_age = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

fn positive<T>(value: Option<T>, field: &'static str) -> Result<Option<T>, CliError>
where
    T: Copy + Default + PartialEq,
{
    match value {
        Some(v) if v == T::default() => Err(CliError::InvalidOverride {
            field,
            reason: MUST_BE_POSITIVE,
        }),
        other => Ok(other),
    }
}
