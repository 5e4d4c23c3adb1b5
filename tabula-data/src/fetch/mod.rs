//! Resource-bounded retrieval of remote payloads.
//!
//! [`BoundedFetcher`] wraps an [`HttpTransport`] and enforces a
//! [`tabula_core::FetchBudget`] on every transfer: a byte cap checked against
//! the declared size and again while streaming, and a deadline covering the
//! whole transfer. File downloads are staged in [`ScratchSpace`]; API and SQL
//! responses are decoded in memory.
#![forbid(unsafe_code)]

mod bounded;
mod error;
mod http;
mod scratch;
mod transport;

#[doc(hidden)]
pub mod test_support;

pub use bounded::{BoundedFetcher, DownloadedFile, JsonResponse};
pub use error::{FetchError, SizeOrigin, redact};
pub use http::{ReqwestTransport, TransportBuildError};
pub use scratch::{SCRATCH_PREFIX, ScratchSpace};
pub use transport::{ByteStream, HttpTransport, OutboundRequest, ResponseBody};

/// A fetched payload awaiting normalization.
#[derive(Debug)]
pub enum RawPayload {
    /// A file staged in scratch storage.
    File(DownloadedFile),
    /// A decoded API or SQL response.
    Json(JsonResponse),
}

impl RawPayload {
    /// Bytes received on the wire.
    #[must_use]
    pub const fn bytes_transferred(&self) -> u64 {
        match self {
            Self::File(file) => file.bytes(),
            Self::Json(response) => response.bytes_transferred,
        }
    }
}
