//! Request construction for SQL-over-HTTP sources.

use std::time::Duration;

use serde_json::json;
use tabula_core::sql::{has_limit, inject_limit};
use tabula_core::{HeaderSet, HttpMethod, SqlSource, request_headers};

use crate::fetch::OutboundRequest;

/// A query ready to send, with a note of whether a limit was added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedQuery {
    /// Query text to send.
    pub text: String,
    /// Whether `LIMIT` was appended.
    pub modified: bool,
}

/// Apply `limit` to `query` when one is requested and none is present.
///
/// # Examples
/// ```
/// use tabula_data::sql::prepare_query;
///
/// let prepared = prepare_query("SELECT * FROM t;", Some(5));
/// assert_eq!(prepared.text, "SELECT * FROM t LIMIT 5;");
/// assert!(prepared.modified);
/// ```
#[must_use]
pub fn prepare_query(query: &str, limit: Option<usize>) -> PreparedQuery {
    match limit {
        Some(limit) if !has_limit(query) => PreparedQuery {
            text: inject_limit(query, limit),
            modified: true,
        },
        _ => PreparedQuery {
            text: query.to_owned(),
            modified: false,
        },
    }
}

/// Build the `POST` carrying `query` to the source's endpoint.
#[must_use]
pub fn build_request(source: &SqlSource, query: &str, timeout: Duration) -> OutboundRequest {
    let headers = HeaderSet::new()
        .with("Content-Type", "application/json")
        .with("Accept", "application/json");
    let body = json!({ "query": query, "database": source.database });
    OutboundRequest::new(HttpMethod::Post, source.endpoint.clone(), timeout)
        .with_headers(request_headers(headers, source.credential.as_ref()))
        .with_body(body.to_string())
}
