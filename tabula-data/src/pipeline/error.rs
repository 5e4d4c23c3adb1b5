//! Request-level errors.

use std::io;
use std::time::Duration;

use tabula_core::{ErrorKind, PreviewLimitError, RequestError};
use thiserror::Error;

use crate::fetch::{FetchError, TransportBuildError};
use crate::normalize::NormalizeError;
use crate::sink::SinkError;

/// Any failure while serving a parse or conversion.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IngestError {
    /// The requested row limit is out of range.
    #[error(transparent)]
    Limit(#[from] PreviewLimitError),
    /// The request document could not be decoded.
    #[error(transparent)]
    Request(#[from] RequestError),
    /// The source could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The payload could not be turned into a table.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    /// The artifact could not be encoded or stored.
    #[error(transparent)]
    Sink(#[from] SinkError),
    /// The request ran past the processing deadline.
    #[error("processing exceeded the {limit:?} limit")]
    ProcessingTimeout {
        /// Deadline that elapsed.
        limit: Duration,
    },
    /// The service stopped accepting work.
    #[error("service is shutting down")]
    ShuttingDown,
}

impl IngestError {
    /// Category reported in the result envelope.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Limit(_) | Self::Request(_) => ErrorKind::Validation,
            Self::Fetch(err) => err.kind(),
            Self::Normalize(err) => err.kind(),
            Self::Sink(err) => err.kind(),
            Self::ProcessingTimeout { .. } | Self::ShuttingDown => ErrorKind::SourceUnavailable,
        }
    }
}

/// Failures while constructing an [`crate::pipeline::IngestService`].
#[derive(Debug, Error)]
pub enum ServiceBuildError {
    /// The HTTP client could not be built.
    #[error(transparent)]
    Transport(#[from] TransportBuildError),
    /// The scratch directory is unusable.
    #[error("invalid scratch directory: {source}")]
    Scratch {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },
}
