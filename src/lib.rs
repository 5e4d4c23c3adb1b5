//! Facade crate for the Tabula ingestion engine.
//!
//! This crate re-exports the core request, table and envelope types and, with
//! the `data` feature, the service that fetches, normalizes and converts
//! sources.

#![forbid(unsafe_code)]

pub use tabula_core::{
    ApiSource, ColumnType, ConversionMetadata, ConversionPayload, ConversionRequest,
    CredentialSpec, DataPath, ErrorKind, FileFormat, FileSource, ParseMetadata, ParsePayload,
    ParseRequest, ResultEnvelope, ServiceConfig, ServiceInfo, SourceDescriptor, SourceKind,
    SqlSource, Table, Value,
};

#[cfg(feature = "data")]
pub use tabula_data::{IngestError, IngestService, NormalizeOptions, Normalized};
