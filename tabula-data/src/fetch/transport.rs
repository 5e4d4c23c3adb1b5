//! The seam between the fetcher and the HTTP client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use tabula_core::{HeaderSet, HttpMethod};

use super::FetchError;

/// Body chunks as they arrive.
pub type ByteStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// One outbound HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Full URL, query string included.
    pub url: String,
    /// Headers in send order.
    pub headers: HeaderSet,
    /// Optional request body.
    pub body: Option<Bytes>,
    /// Deadline applied by the client.
    pub timeout: Duration,
}

impl OutboundRequest {
    /// A request without headers or body.
    pub fn new(method: HttpMethod, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderSet::new(),
            body: None,
            timeout,
        }
    }

    /// A `GET` request.
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self::new(HttpMethod::Get, url, timeout)
    }

    /// Replace the headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderSet) -> Self {
        self.headers = headers;
        self
    }

    /// Attach a body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A successful response whose body has not been read yet.
pub struct ResponseBody {
    /// Size announced by the server, if any.
    pub declared_len: Option<u64>,
    /// Body chunks.
    pub chunks: ByteStream,
}

impl ResponseBody {
    /// A body served from in-memory chunks.
    pub fn from_chunks<I>(declared_len: Option<u64>, chunks: I) -> Self
    where
        I: IntoIterator<Item = Bytes>,
        I::IntoIter: Send + 'static,
    {
        Self {
            declared_len,
            chunks: stream::iter(chunks.into_iter().map(Ok)).boxed(),
        }
    }

    /// An empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_chunks(Some(0), std::iter::empty())
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody")
            .field("declared_len", &self.declared_len)
            .field("chunks", &"<stream>")
            .finish()
    }
}

/// Sends HTTP requests on behalf of the fetcher.
///
/// Implementations resolve once response headers arrive; the body is read
/// lazily through [`ResponseBody::chunks`]. Non-success statuses are returned
/// as errors, with 401 and 403 reported as [`FetchError::Unauthorized`].
#[async_trait]
pub trait HttpTransport: fmt::Debug + Send + Sync {
    /// Issue `request`.
    async fn send(&self, request: OutboundRequest) -> Result<ResponseBody, FetchError>;
}
