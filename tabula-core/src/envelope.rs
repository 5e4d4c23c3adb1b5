//! Uniform success/failure wrapper returned for every request.

use std::fmt;

use serde::Serialize;

use crate::error::ErrorKind;
use crate::schema::{ConversionMetadata, ParseMetadata};

/// Rows and metadata returned by an inline parse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsePayload {
    /// Rows keyed by column name, hidden columns included.
    pub data: Vec<serde_json::Map<String, serde_json::Value>>,
    /// Description of the returned rows.
    pub metadata: ParseMetadata,
}

/// Metadata returned by a conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionPayload {
    /// Description of the stored artifact.
    pub metadata: ConversionMetadata,
}

/// Outcome of one request.
///
/// A successful envelope carries a payload and no error; a failed one carries
/// an error and no payload. Only [`ResultEnvelope::success`] and
/// [`ResultEnvelope::failure`] construct values, so the two never mix.
///
/// # Examples
/// ```
/// use tabula_core::{ErrorKind, ResultEnvelope};
///
/// let failed: ResultEnvelope<()> = ResultEnvelope::failure(ErrorKind::Validation, "bad limit");
/// let rendered = serde_json::to_value(&failed).expect("serialize");
/// assert_eq!(rendered, serde_json::json!({
///     "success": false,
///     "error": "bad limit",
///     "error_kind": "validation"
/// }));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEnvelope<T> {
    success: bool,
    #[serde(flatten)]
    payload: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
}

impl<T> ResultEnvelope<T> {
    /// Wrap a successful payload.
    pub const fn success(payload: T) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error: None,
            error_kind: None,
        }
    }

    /// Wrap a failure message.
    pub fn failure(kind: ErrorKind, message: impl fmt::Display) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(message.to_string()),
            error_kind: Some(kind),
        }
    }

    /// Whether the request succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Payload of a successful request.
    #[must_use]
    pub const fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    /// Message of a failed request.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Category of a failed request.
    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }

    /// Unwrap into the payload or the failure category and message.
    pub fn into_result(self) -> Result<T, (ErrorKind, String)> {
        match (self.payload, self.error_kind, self.error) {
            (Some(payload), _, _) => Ok(payload),
            (None, kind, message) => Err((
                kind.unwrap_or(ErrorKind::Validation),
                message.unwrap_or_default(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SourceKind, Table};
    use rstest::rstest;

    #[rstest]
    fn success_flattens_payload() {
        let payload = ParsePayload {
            data: Vec::new(),
            metadata: ParseMetadata::describe(&Table::empty(), SourceKind::File),
        };
        let rendered = serde_json::to_value(ResultEnvelope::success(payload)).expect("serialize");

        assert_eq!(rendered["success"], true);
        assert_eq!(rendered["data"], serde_json::json!([]));
        assert_eq!(rendered["metadata"]["row_count"], 0);
        assert!(rendered.get("error").is_none());
    }

    #[rstest]
    fn failure_has_no_payload() {
        let envelope: ResultEnvelope<ParsePayload> =
            ResultEnvelope::failure(ErrorKind::PayloadTooLarge, "too big");
        assert!(!envelope.is_success());
        assert!(envelope.payload().is_none());
        assert_eq!(
            envelope.into_result(),
            Err((ErrorKind::PayloadTooLarge, "too big".to_owned()))
        );
    }
}
