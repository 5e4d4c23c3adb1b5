//! Retrieval, normalization and storage for the Tabula ingestion engine.
//!
//! Responsibilities:
//! - Fetch files, API responses and SQL results within byte and time budgets.
//! - Normalize CSV, TSV, JSON and GeoJSON payloads into tables.
//! - Encode tables as Parquet and upload them to caller-supplied URLs.
//! - Serve parse and conversion requests through [`pipeline::IngestService`].
//!
//! Boundaries:
//! - Domain types and validation live in `tabula-core`.
//! - Filesystem access for scratch storage goes through `tabula-fs`.
//!
//! Invariants:
//! - No global mutable state; the service configuration is immutable.
//! - Scratch files are removed when the request that created them ends.
//! - Error messages never contain query strings of fetched URLs.
#![forbid(unsafe_code)]

pub mod api;
pub mod fetch;
pub mod nesting;
pub mod normalize;
pub mod pipeline;
pub mod sink;
pub mod sql;
pub mod sweep;

pub use fetch::{BoundedFetcher, FetchError, HttpTransport, ReqwestTransport, ScratchSpace};
pub use normalize::{MalformedRowPolicy, NormalizeError, NormalizeOptions, Normalized};
pub use pipeline::{IngestError, IngestService, ServiceBuildError};
pub use sink::SinkError;
