//! Request construction and record selection for JSON API sources.

use std::time::Duration;

use serde_json::Value as Json;
use tabula_core::{ApiSource, DataPath, HeaderSet, request_headers};

use crate::fetch::OutboundRequest;
use crate::normalize::{NormalizeError, records_from_value};

/// Build the outbound request for `source`.
///
/// `Accept: application/json` is sent unless the caller overrides it; auth
/// headers derived from the credential are applied last and win.
#[must_use]
pub fn build_request(source: &ApiSource, timeout: Duration) -> OutboundRequest {
    let mut headers = HeaderSet::new().with("Accept", "application/json");
    headers.merge(&source.headers);
    let headers = request_headers(headers, source.credential.as_ref());
    OutboundRequest::new(source.method, source.endpoint.clone(), timeout).with_headers(headers)
}

/// Pick the records out of an API response.
///
/// Without a data path the whole response is used. The target must be an
/// array of records or a single object.
///
/// # Errors
///
/// Returns [`NormalizeError::DataPath`] when the path is missing and
/// [`NormalizeError::NotTabular`] when the target is a scalar.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use tabula_core::DataPath;
/// use tabula_data::api::select_records;
///
/// let body = json!({"result": {"items": [{"id": 1}, {"id": 2}]}});
/// let records = select_records(body, Some(&DataPath::new("result.items")))
///     .expect("path exists");
/// assert_eq!(records.len(), 2);
/// ```
pub fn select_records(response: Json, path: Option<&DataPath>) -> Result<Vec<Json>, NormalizeError> {
    let target = match path {
        None => response,
        Some(path) => path.extract(response)?,
    };
    records_from_value(target)
}
