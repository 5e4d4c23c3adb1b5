//! The request-serving entry point.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use log::{info, warn};
use tabula_core::sql::extract_rows;
use tabula_core::{
    ApiSource, ConversionMetadata, ConversionPayload, ConversionRequest, FetchMode, FileSource,
    ParseMetadata, ParsePayload, ParseRequest, ResultEnvelope, RowCap, ServiceConfig,
    ServiceInfo, SourceDescriptor, SqlSource,
};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::{IngestError, ServiceBuildError};
use crate::fetch::{BoundedFetcher, HttpTransport, ReqwestTransport, ScratchSpace, redact};
use crate::normalize::{NormalizeOptions, Normalized, normalize_file, normalize_records};
use crate::sink::{encode_parquet, upload_artifact};
use crate::sql::{PreparedQuery, prepare_query};
use crate::{api, sql, sweep};

/// A normalized source plus whether its SQL query was rewritten.
struct SourceTable {
    normalized: Normalized,
    query_modified: Option<bool>,
}

/// Serves parse and conversion requests under shared limits.
///
/// The service holds an immutable [`ServiceConfig`], a transport and a
/// semaphore bounding how many requests run at once. Requests beyond the
/// bound wait for a permit; once admitted, a request runs under the
/// configured processing deadline.
///
/// # Examples
/// ```no_run
/// use tabula_core::{FileFormat, FileSource, ParseRequest, ServiceConfig, SourceDescriptor};
/// use tabula_data::pipeline::IngestService;
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let service = IngestService::with_http(ServiceConfig::default())?;
/// let request = ParseRequest::new(SourceDescriptor::File(FileSource {
///     url: "https://files.example.com/cities.csv".to_owned(),
///     format: FileFormat::Csv,
/// }))
/// .preview(10);
/// let envelope = service.parse(request).await;
/// println!("{}", serde_json::to_string(&envelope)?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct IngestService {
    config: Arc<ServiceConfig>,
    fetcher: BoundedFetcher,
    permits: Arc<Semaphore>,
}

impl IngestService {
    /// Build a service sending requests through `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceBuildError::Scratch`] when the scratch directory is
    /// not a UTF-8 path.
    pub fn new(
        config: ServiceConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ServiceBuildError> {
        let scratch = ScratchSpace::from_config(&config)?;
        let permits = Arc::new(Semaphore::new(config.max_concurrent_conversions.max(1)));
        Ok(Self {
            config: Arc::new(config),
            fetcher: BoundedFetcher::new(transport, scratch),
            permits,
        })
    }

    /// Build a service backed by a `reqwest` client.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceBuildError`] when the client or scratch directory
    /// cannot be set up.
    pub fn with_http(config: ServiceConfig) -> Result<Self, ServiceBuildError> {
        let transport = ReqwestTransport::new(&config.user_agent)?;
        Self::new(config, Arc::new(transport))
    }

    /// The configuration in force.
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Capabilities and limits of this service.
    #[must_use]
    pub fn info(&self) -> ServiceInfo {
        ServiceInfo::from_config(&self.config)
    }

    /// Scratch storage used for downloads.
    #[must_use]
    pub const fn scratch(&self) -> &ScratchSpace {
        self.fetcher.scratch()
    }

    /// Start the background scratch sweeper on the current runtime.
    #[must_use = "dropping the handle detaches the sweeper; abort it on shutdown"]
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        sweep::spawn_scratch_sweeper(
            self.scratch().clone(),
            self.config.scratch_max_age,
            self.config.sweep_interval,
        )
    }

    /// Parse a source and return its rows inline.
    pub async fn parse(&self, request: ParseRequest) -> ResultEnvelope<ParsePayload> {
        envelope("parse", self.try_parse(request).await)
    }

    /// Convert a source to Parquet and upload it.
    pub async fn convert(&self, request: ConversionRequest) -> ResultEnvelope<ConversionPayload> {
        envelope("convert", self.try_convert(request).await)
    }

    /// [`IngestService::parse`] without the envelope.
    ///
    /// The row limit applies in both preview and full mode; it defaults to
    /// the configured preview size.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] for invalid limits, fetch, normalization and
    /// timeout failures.
    pub async fn try_parse(&self, request: ParseRequest) -> Result<ParsePayload, IngestError> {
        let limit = self.config.preview_limit(request.limit)?.get();
        let cap = RowCap::Limited(limit);
        // Fetch one row past the cap so truncation is reported accurately.
        let sql_limit = (request.preview || request.limit.is_some()).then_some(limit + 1);
        let kind = request.source.kind();

        self.bounded(async {
            let source = self
                .read_source(&request.source, FetchMode::Parse, cap, sql_limit)
                .await?;
            let Normalized {
                table,
                truncated,
                dropped_rows,
                geo_fields,
            } = source.normalized;
            let mut metadata = ParseMetadata::describe(&table, kind)
                .with_truncated(truncated)
                .with_dropped_rows(dropped_rows)
                .with_geo_fields(geo_fields);
            if let Some(modified) = source.query_modified {
                metadata = metadata.with_query_modified(modified);
            }
            Ok(ParsePayload {
                data: table.row_objects(),
                metadata,
            })
        })
        .await
    }

    /// [`IngestService::convert`] without the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] for fetch, normalization, encoding, upload and
    /// timeout failures.
    pub async fn try_convert(
        &self,
        request: ConversionRequest,
    ) -> Result<ConversionPayload, IngestError> {
        let kind = request.source.kind();
        self.bounded(async {
            let started = Instant::now();
            let source = self
                .read_source(
                    &request.source,
                    FetchMode::Convert,
                    RowCap::Unbounded,
                    Some(self.config.default_sql_limit),
                )
                .await?;
            let table = source.normalized.table;

            let artifact = encode_parquet(&table, self.config.row_group_size)?;
            let artifact_bytes = artifact.len() as u64;
            upload_artifact(
                self.fetcher.transport().as_ref(),
                &request.output_url,
                Bytes::from(artifact),
                self.config.upload_timeout,
            )
            .await?;

            let metadata = ConversionMetadata::describe(&table, kind, artifact_bytes, started.elapsed());
            info!(
                "converted {} rows from {} source to {}",
                metadata.rows,
                kind,
                redact(&request.output_url)
            );
            Ok(ConversionPayload { metadata })
        })
        .await
    }

    /// Run `work` once a permit is free, under the processing deadline.
    async fn bounded<T, F>(&self, work: F) -> Result<T, IngestError>
    where
        F: Future<Output = Result<T, IngestError>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| IngestError::ShuttingDown)?;
        let limit = self.config.max_processing_time;
        tokio::time::timeout(limit, work)
            .await
            .map_err(|_| IngestError::ProcessingTimeout { limit })?
    }

    async fn read_source(
        &self,
        source: &SourceDescriptor,
        mode: FetchMode,
        cap: RowCap,
        sql_limit: Option<usize>,
    ) -> Result<SourceTable, IngestError> {
        let options = NormalizeOptions::new(cap);
        let (normalized, query_modified) = match source {
            SourceDescriptor::File(file) => (self.read_file(file, &options).await?, None),
            SourceDescriptor::Api(api) => (self.read_api(api, mode, &options).await?, None),
            SourceDescriptor::Sql(sql) => {
                let prepared = prepare_query(&sql.query, sql_limit);
                let modified = prepared.modified;
                (self.read_sql(sql, &prepared, mode, &options).await?, Some(modified))
            }
        };
        Ok(SourceTable {
            normalized,
            query_modified,
        })
    }

    async fn read_file(
        &self,
        source: &FileSource,
        options: &NormalizeOptions,
    ) -> Result<Normalized, IngestError> {
        let download = self
            .fetcher
            .download(&source.url, self.config.file_budget())
            .await?;
        info!(
            "downloaded {} bytes of {} from {}",
            download.bytes(),
            source.format,
            redact(&source.url)
        );
        Ok(normalize_file(&download, source.format, options)?)
    }

    async fn read_api(
        &self,
        source: &ApiSource,
        mode: FetchMode,
        options: &NormalizeOptions,
    ) -> Result<Normalized, IngestError> {
        let budget = self.config.api_budget(mode);
        let response = self
            .fetcher
            .fetch_json(api::build_request(source, budget.timeout), budget)
            .await?;
        info!(
            "received {} bytes from {}",
            response.bytes_transferred,
            redact(&source.endpoint)
        );
        let records = api::select_records(response.value, source.data_path.as_ref())?;
        Ok(normalize_records(records, options))
    }

    async fn read_sql(
        &self,
        source: &SqlSource,
        query: &PreparedQuery,
        mode: FetchMode,
        options: &NormalizeOptions,
    ) -> Result<Normalized, IngestError> {
        let budget = self.config.sql_budget(mode);
        let response = self
            .fetcher
            .fetch_json(sql::build_request(source, &query.text, budget.timeout), budget)
            .await?;
        info!(
            "received {} bytes from {} (database {})",
            response.bytes_transferred,
            redact(&source.endpoint),
            source.database
        );
        Ok(normalize_records(extract_rows(response.value), options))
    }
}

fn envelope<T>(operation: &str, outcome: Result<T, IngestError>) -> ResultEnvelope<T> {
    match outcome {
        Ok(payload) => ResultEnvelope::success(payload),
        Err(err) => {
            warn!("{operation} failed ({}): {err}", err.kind());
            ResultEnvelope::failure(err.kind(), &err)
        }
    }
}
