//! Immutable service configuration and per-source fetch budgets.

use std::path::PathBuf;
use std::time::Duration;

use crate::preview::{DEFAULT_PREVIEW_ROWS, MAX_PREVIEW_ROWS, PreviewLimit, PreviewLimitError};
use crate::source::SourceKind;

/// Bytes in one mebibyte.
pub const MIB: u64 = 1024 * 1024;

/// Whether a fetch serves an inline parse or a full conversion.
///
/// Conversions read whole result sets, so their API and SQL calls get longer
/// deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Rows returned inline.
    Parse,
    /// Rows written to an artifact.
    Convert,
}

/// Resource limits for one outbound transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchBudget {
    /// Largest body accepted, in bytes.
    pub max_bytes: u64,
    /// Buffer size used when streaming to scratch storage.
    pub chunk_size: usize,
    /// Deadline for the whole transfer.
    pub timeout: Duration,
}

impl FetchBudget {
    /// Construct a budget.
    #[must_use]
    pub const fn new(max_bytes: u64, chunk_size: usize, timeout: Duration) -> Self {
        Self {
            max_bytes,
            chunk_size,
            timeout,
        }
    }

    /// Whether `bytes` fits inside the budget.
    #[must_use]
    pub const fn admits(&self, bytes: u64) -> bool {
        bytes <= self.max_bytes
    }
}

/// Settings shared by every request handled by the service.
///
/// Build one with [`ServiceConfig::default`] and adjust it with the `with_*`
/// methods; the value is not mutated after the service starts.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use tabula_core::ServiceConfig;
///
/// let config = ServiceConfig::default()
///     .with_max_file_size_mb(50)
///     .with_max_processing_time(Duration::from_secs(60));
/// assert_eq!(config.file_budget().max_bytes, 50 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Largest file download, in MiB.
    pub max_file_size_mb: u64,
    /// Largest API response, in MiB.
    pub max_api_response_mb: u64,
    /// Largest SQL response, in MiB.
    pub max_sql_response_mb: u64,
    /// Streaming buffer size in bytes.
    pub chunk_size: usize,
    /// Deadline for a file download.
    pub download_timeout: Duration,
    /// Deadline for an API or SQL call made by a parse.
    pub call_timeout: Duration,
    /// Deadline for an API call made by a conversion.
    pub api_conversion_timeout: Duration,
    /// Deadline for a SQL call made by a conversion.
    pub sql_conversion_timeout: Duration,
    /// Deadline for an artifact upload.
    pub upload_timeout: Duration,
    /// Deadline for a whole request once admitted.
    pub max_processing_time: Duration,
    /// Requests processed at once; others wait.
    pub max_concurrent_conversions: usize,
    /// Rows returned by a parse without an explicit limit.
    pub default_preview_rows: usize,
    /// Largest limit a parse may request.
    pub max_preview_rows: usize,
    /// Row limit appended to SQL queries during conversion.
    pub default_sql_limit: usize,
    /// Rows per Parquet row group.
    pub row_group_size: usize,
    /// Directory for scratch files.
    pub scratch_dir: PathBuf,
    /// Age after which scratch files are swept.
    pub scratch_max_age: Duration,
    /// Interval between scratch sweeps.
    pub sweep_interval: Duration,
    /// `User-Agent` sent upstream.
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 500,
            max_api_response_mb: 100,
            max_sql_response_mb: 100,
            chunk_size: 8 * 1024 * 1024,
            download_timeout: Duration::from_secs(600),
            call_timeout: Duration::from_secs(30),
            api_conversion_timeout: Duration::from_secs(300),
            sql_conversion_timeout: Duration::from_secs(600),
            upload_timeout: Duration::from_secs(300),
            max_processing_time: Duration::from_secs(600),
            max_concurrent_conversions: 5,
            default_preview_rows: DEFAULT_PREVIEW_ROWS,
            max_preview_rows: MAX_PREVIEW_ROWS,
            default_sql_limit: 100_000,
            row_group_size: 50_000,
            scratch_dir: std::env::temp_dir().join("tabula-scratch"),
            scratch_max_age: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(30 * 60),
            user_agent: format!("tabula/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ServiceConfig {
    /// Set the largest file download in MiB.
    #[must_use]
    pub const fn with_max_file_size_mb(mut self, mb: u64) -> Self {
        self.max_file_size_mb = mb;
        self
    }

    /// Set the largest API response in MiB.
    #[must_use]
    pub const fn with_max_api_response_mb(mut self, mb: u64) -> Self {
        self.max_api_response_mb = mb;
        self
    }

    /// Set the largest SQL response in MiB.
    #[must_use]
    pub const fn with_max_sql_response_mb(mut self, mb: u64) -> Self {
        self.max_sql_response_mb = mb;
        self
    }

    /// Set the streaming buffer size.
    #[must_use]
    pub const fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Set the file download deadline.
    #[must_use]
    pub const fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Set the API and SQL call deadlines used by conversions.
    #[must_use]
    pub const fn with_conversion_timeouts(mut self, api: Duration, sql: Duration) -> Self {
        self.api_conversion_timeout = api;
        self.sql_conversion_timeout = sql;
        self
    }

    /// Set the API and SQL call deadline used by parses.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the upload deadline.
    #[must_use]
    pub const fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    /// Set the whole-request deadline.
    #[must_use]
    pub const fn with_max_processing_time(mut self, timeout: Duration) -> Self {
        self.max_processing_time = timeout;
        self
    }

    /// Set how many requests run at once.
    #[must_use]
    pub const fn with_max_concurrent_conversions(mut self, limit: usize) -> Self {
        self.max_concurrent_conversions = limit;
        self
    }

    /// Set the default SQL conversion limit.
    #[must_use]
    pub const fn with_default_sql_limit(mut self, limit: usize) -> Self {
        self.default_sql_limit = limit;
        self
    }

    /// Set the Parquet row group size.
    #[must_use]
    pub const fn with_row_group_size(mut self, rows: usize) -> Self {
        self.row_group_size = rows;
        self
    }

    /// Set the scratch directory.
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Set the scratch sweep age and interval.
    #[must_use]
    pub const fn with_sweep(mut self, max_age: Duration, interval: Duration) -> Self {
        self.scratch_max_age = max_age;
        self.sweep_interval = interval;
        self
    }

    /// Set the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Budget for file downloads.
    #[must_use]
    pub const fn file_budget(&self) -> FetchBudget {
        FetchBudget::new(
            self.max_file_size_mb.saturating_mul(MIB),
            self.chunk_size,
            self.download_timeout,
        )
    }

    /// Budget for API calls.
    #[must_use]
    pub const fn api_budget(&self, mode: FetchMode) -> FetchBudget {
        let timeout = match mode {
            FetchMode::Parse => self.call_timeout,
            FetchMode::Convert => self.api_conversion_timeout,
        };
        FetchBudget::new(
            self.max_api_response_mb.saturating_mul(MIB),
            self.chunk_size,
            timeout,
        )
    }

    /// Budget for SQL calls.
    #[must_use]
    pub const fn sql_budget(&self, mode: FetchMode) -> FetchBudget {
        let timeout = match mode {
            FetchMode::Parse => self.call_timeout,
            FetchMode::Convert => self.sql_conversion_timeout,
        };
        FetchBudget::new(
            self.max_sql_response_mb.saturating_mul(MIB),
            self.chunk_size,
            timeout,
        )
    }

    /// Budget for a source of the given kind.
    #[must_use]
    pub const fn budget_for(&self, kind: SourceKind, mode: FetchMode) -> FetchBudget {
        match kind {
            SourceKind::File => self.file_budget(),
            SourceKind::Api => self.api_budget(mode),
            SourceKind::Sql => self.sql_budget(mode),
        }
    }

    /// Resolve a requested parse limit, applying the default when absent.
    pub const fn preview_limit(
        &self,
        requested: Option<usize>,
    ) -> Result<PreviewLimit, PreviewLimitError> {
        let requested = match requested {
            Some(limit) => limit,
            None => self.default_preview_rows,
        };
        PreviewLimit::new(requested, self.max_preview_rows)
    }
}
