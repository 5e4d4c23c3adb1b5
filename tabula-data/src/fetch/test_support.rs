//! In-memory transport for tests.
//!
//! [`StubTransport`] serves canned responses keyed by URL and records every
//! request it receives, so tests can assert on headers and bodies without a
//! network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tabula_core::{HeaderSet, HttpMethod};

use super::transport::{HttpTransport, OutboundRequest, ResponseBody};
use super::FetchError;

const DEFAULT_CHUNK_SIZE: usize = 16;

#[derive(Debug, Clone)]
enum StubRoute {
    Body {
        body: Bytes,
        declared_len: Option<u64>,
    },
    Status(u16),
    NetworkFailure(String),
    Stall,
}

/// A request observed by [`StubTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Full URL.
    pub url: String,
    /// Headers in send order.
    pub headers: HeaderSet,
    /// Body, if any.
    pub body: Option<Bytes>,
    /// Deadline the caller attached.
    pub timeout: Duration,
}

impl RecordedRequest {
    /// The body decoded as JSON, if present and valid.
    #[must_use]
    pub fn json_body(&self) -> Option<serde_json::Value> {
        self.body
            .as_ref()
            .and_then(|body| serde_json::from_slice(body).ok())
    }
}

/// Deterministic [`HttpTransport`] for tests.
///
/// Unknown URLs answer 404. Bodies are delivered in small chunks to exercise
/// streaming paths.
///
/// # Example
///
/// ```
/// use tabula_data::fetch::test_support::StubTransport;
///
/// let transport = StubTransport::new()
///     .with_body("https://files.example.com/a.csv", "a,b\n1,2\n")
///     .with_status("https://bucket.example.com/out.parquet", 200);
/// assert!(transport.requests().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StubTransport {
    routes: Arc<Mutex<HashMap<String, StubRoute>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    chunk_size: Option<usize>,
}

impl StubTransport {
    /// A transport with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `url` with a matching declared length.
    #[must_use]
    pub fn with_body(self, url: &str, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let declared_len = Some(body.len() as u64);
        self.route(url, StubRoute::Body { body, declared_len })
    }

    /// Serve `body` at `url`, announcing `declared_len` instead of the real size.
    #[must_use]
    pub fn with_declared_body(
        self,
        url: &str,
        body: impl Into<Bytes>,
        declared_len: Option<u64>,
    ) -> Self {
        self.route(
            url,
            StubRoute::Body {
                body: body.into(),
                declared_len,
            },
        )
    }

    /// Serve `value` serialized as JSON at `url`.
    #[must_use]
    pub fn with_json(self, url: &str, value: &serde_json::Value) -> Self {
        self.with_body(url, value.to_string())
    }

    /// Answer `url` with an empty body and `status`.
    #[must_use]
    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.route(url, StubRoute::Status(status))
    }

    /// Fail requests to `url` with a network error.
    #[must_use]
    pub fn with_network_failure(self, url: &str, message: &str) -> Self {
        self.route(url, StubRoute::NetworkFailure(message.to_owned()))
    }

    /// Never answer requests to `url`.
    #[must_use]
    pub fn with_stall(self, url: &str) -> Self {
        self.route(url, StubRoute::Stall)
    }

    /// Deliver bodies in chunks of `size` bytes.
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }

    /// Requests received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests received for `url`.
    #[must_use]
    pub fn requests_to(&self, url: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.url == url)
            .collect()
    }

    fn route(self, url: &str, route: StubRoute) -> Self {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_owned(), route);
        self
    }

    fn chunked(&self, body: &Bytes) -> Vec<Bytes> {
        let size = self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        let mut rest = body.clone();
        let mut chunks = Vec::new();
        while !rest.is_empty() {
            let take = rest.len().min(size);
            chunks.push(rest.split_to(take));
        }
        chunks
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn send(&self, request: OutboundRequest) -> Result<ResponseBody, FetchError> {
        let OutboundRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedRequest {
                method,
                url: url.clone(),
                headers,
                body,
                timeout,
            });

        let route = self
            .routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&url)
            .cloned();
        match route {
            None => Err(FetchError::from_status(&url, 404, "Not Found")),
            Some(StubRoute::Body { body, declared_len }) => {
                Ok(ResponseBody::from_chunks(declared_len, self.chunked(&body)))
            }
            Some(StubRoute::Status(status)) if (200..300).contains(&status) => {
                Ok(ResponseBody::empty())
            }
            Some(StubRoute::Status(status)) => {
                Err(FetchError::from_status(&url, status, "stubbed status"))
            }
            Some(StubRoute::NetworkFailure(message)) => Err(FetchError::network(&url, message)),
            Some(StubRoute::Stall) => std::future::pending().await,
        }
    }
}
