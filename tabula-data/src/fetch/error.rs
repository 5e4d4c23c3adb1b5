//! Errors produced while retrieving remote payloads.

use std::fmt;
use std::io;
use std::time::Duration;

use tabula_core::ErrorKind;
use thiserror::Error;
use url::Url;

/// Where an oversized payload was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeOrigin {
    /// The `Content-Length` announced by the server.
    Declared,
    /// Bytes counted while streaming.
    Streamed,
    /// Size of the decoded response once re-serialized.
    Decoded,
}

impl fmt::Display for SizeOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Declared => "declared",
            Self::Streamed => "received",
            Self::Decoded => "after decoding",
        })
    }
}

/// Transport and budget failures.
///
/// URLs are stored without their query string so pre-signed tokens do not
/// leak into messages or logs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// The body exceeded its byte budget, either as declared or as streamed.
    #[error("payload from {url} exceeds the {limit} byte limit ({size} bytes {origin})")]
    TooLarge {
        /// Redacted request URL.
        url: String,
        /// Budget in bytes.
        limit: u64,
        /// Declared or observed size.
        size: u64,
        /// Where `size` came from.
        origin: SizeOrigin,
    },
    /// The upstream rejected the credentials.
    #[error("request to {url} was rejected with status {status}")]
    Unauthorized {
        /// Redacted request URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// The upstream answered with a non-success status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Redacted request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short status description.
        message: String,
    },
    /// The connection failed or broke mid-transfer.
    #[error("network error contacting {url}: {message}")]
    Network {
        /// Redacted request URL.
        url: String,
        /// Transport message.
        message: String,
    },
    /// The transfer did not finish in time.
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout {
        /// Redacted request URL.
        url: String,
        /// Deadline that elapsed.
        timeout: Duration,
    },
    /// The request could not be built, for example because of a bad header.
    #[error("invalid request to {url}: {message}")]
    InvalidRequest {
        /// Redacted request URL.
        url: String,
        /// Builder message.
        message: String,
    },
    /// The response body was not valid JSON.
    #[error("response from {url} is not valid JSON: {message}")]
    Decode {
        /// Redacted request URL.
        url: String,
        /// Parser message.
        message: String,
    },
    /// Scratch storage could not be created or written.
    #[error("scratch storage failed: {source}")]
    Scratch {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },
}

impl FetchError {
    /// Category reported to callers.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::TooLarge { .. } => ErrorKind::PayloadTooLarge,
            Self::Unauthorized { .. } => ErrorKind::UpstreamAuthFailure,
            Self::Http { .. } | Self::Network { .. } | Self::Timeout { .. } | Self::Scratch { .. } => {
                ErrorKind::SourceUnavailable
            }
            Self::InvalidRequest { .. } => ErrorKind::Validation,
            Self::Decode { .. } => ErrorKind::MalformedPayload,
        }
    }

    /// Map an HTTP status to the matching error.
    #[must_use]
    pub fn from_status(url: &str, status: u16, message: impl Into<String>) -> Self {
        match status {
            401 | 403 => Self::Unauthorized {
                url: redact(url),
                status,
            },
            _ => Self::Http {
                url: redact(url),
                status,
                message: message.into(),
            },
        }
    }

    pub(crate) fn network(url: &str, message: impl Into<String>) -> Self {
        Self::Network {
            url: redact(url),
            message: message.into(),
        }
    }

    pub(crate) fn timeout(url: &str, timeout: Duration) -> Self {
        Self::Timeout {
            url: redact(url),
            timeout,
        }
    }

    pub(crate) fn too_large(url: &str, limit: u64, size: u64, origin: SizeOrigin) -> Self {
        Self::TooLarge {
            url: redact(url),
            limit,
            size,
            origin,
        }
    }
}

/// Strip the query string and fragment from `url`.
#[must_use]
pub fn redact(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://bucket.example.com/a.csv?X-Amz-Signature=abc", "https://bucket.example.com/a.csv")]
    #[case("https://api.example.com/items#frag", "https://api.example.com/items")]
    #[case("not a url?token=1", "not a url")]
    fn redacts_query_strings(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(redact(url), expected);
    }

    #[rstest]
    #[case(401, ErrorKind::UpstreamAuthFailure)]
    #[case(403, ErrorKind::UpstreamAuthFailure)]
    #[case(404, ErrorKind::SourceUnavailable)]
    #[case(503, ErrorKind::SourceUnavailable)]
    fn maps_statuses_to_kinds(#[case] status: u16, #[case] kind: ErrorKind) {
        assert_eq!(FetchError::from_status("https://x", status, "nope").kind(), kind);
    }
}
