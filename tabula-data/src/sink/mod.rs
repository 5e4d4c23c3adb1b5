//! Encoding tables as Parquet artifacts and uploading them.
#![forbid(unsafe_code)]

mod parquet;
mod upload;

use ::parquet::errors::ParquetError;
use arrow::error::ArrowError;
use tabula_core::ErrorKind;
use thiserror::Error;

use crate::fetch::FetchError;

pub use self::parquet::encode_parquet;
pub use upload::{ARTIFACT_CONTENT_TYPE, upload_artifact};

/// Failures while producing or delivering an artifact.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SinkError {
    /// Arrow rejected the record batch.
    #[error("failed to build record batch: {source}")]
    Arrow {
        /// Underlying Arrow error.
        #[from]
        source: ArrowError,
    },
    /// The Parquet writer failed.
    #[error("failed to encode parquet: {source}")]
    Parquet {
        /// Underlying Parquet error.
        #[from]
        source: ParquetError,
    },
    /// The artifact could not be stored.
    #[error("failed to upload artifact to {url}: {source}")]
    Upload {
        /// Destination with its query string removed.
        url: String,
        /// Transport failure.
        #[source]
        source: FetchError,
    },
}

impl SinkError {
    /// Category reported to callers.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::UploadFailure
    }
}
