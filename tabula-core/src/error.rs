//! Request-level error taxonomy.

use std::fmt;

use serde::Serialize;

/// Broad category of a failed request.
///
/// Module errors map onto one of these so callers can react without
/// matching on every concrete error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request itself is invalid.
    Validation,
    /// The source could not be reached, answered with an error, or timed out.
    SourceUnavailable,
    /// A body exceeded its byte budget.
    PayloadTooLarge,
    /// The payload could not be decoded into a table.
    MalformedPayload,
    /// The upstream rejected the supplied credentials.
    UpstreamAuthFailure,
    /// The artifact could not be encoded or stored.
    UploadFailure,
}

impl ErrorKind {
    /// Snake case identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::SourceUnavailable => "source_unavailable",
            Self::PayloadTooLarge => "payload_too_large",
            Self::MalformedPayload => "malformed_payload",
            Self::UpstreamAuthFailure => "upstream_auth_failure",
            Self::UploadFailure => "upload_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
