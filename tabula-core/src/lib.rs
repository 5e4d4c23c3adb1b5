//! Core domain types for the Tabula ingestion engine.
//!
//! The types here are independent of any transport or file format: cell
//! values and tables, source descriptors, credentials, row caps, SQL limit
//! handling, schemas, request and result envelopes, and the service
//! configuration. Constructors validate their input and return `Result`
//! so invalid requests surface before any I/O happens.
#![forbid(unsafe_code)]

pub mod config;
pub mod credential;
pub mod envelope;
pub mod error;
pub mod headers;
pub mod info;
pub mod preview;
pub mod request;
pub mod schema;
pub mod source;
pub mod sql;
pub mod table;
pub mod value;

pub use config::{FetchBudget, FetchMode, MIB, ServiceConfig};
pub use credential::{Credential, CredentialSpec, DEFAULT_API_KEY_HEADER, request_headers};
pub use envelope::{ConversionPayload, ParsePayload, ResultEnvelope};
pub use error::ErrorKind;
pub use headers::HeaderSet;
pub use info::{ServiceInfo, ServiceLimits};
pub use preview::{
    DEFAULT_PREVIEW_ROWS, MAX_PREVIEW_ROWS, PreviewLimit, PreviewLimitError, RowCap,
};
pub use request::{ConversionRequest, ParseRequest, RequestError};
pub use schema::{
    ArtifactSchema, ConversionMetadata, ParseMetadata, SchemaField, TableSchema,
};
pub use source::{
    ApiSource, DataPath, DataPathError, FileFormat, FileSource, FormatError, HttpMethod,
    SourceDescriptor, SourceKind, SqlSource,
};
pub use table::{Column, EMPTY_SENTINEL_COLUMN, HIDDEN_COLUMN_PREFIX, Table, TableBuilder, TableError};
pub use value::{ColumnType, Value};
