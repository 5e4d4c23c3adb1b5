//! `reqwest` implementation of [`HttpTransport`].

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::{Client, Method, StatusCode};
use tabula_core::HttpMethod;
use thiserror::Error;

use super::transport::{HttpTransport, OutboundRequest, ResponseBody};
use super::{FetchError, redact};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure to construct a [`ReqwestTransport`].
#[derive(Debug, Error)]
pub enum TransportBuildError {
    /// The HTTP client rejected its configuration.
    #[error("failed to build HTTP client: {source}")]
    HttpClient {
        /// Underlying client error.
        #[from]
        source: reqwest::Error,
    },
}

/// HTTP transport backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport sending `user_agent` with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend or client cannot be initialised.
    pub fn new(user_agent: &str) -> Result<Self, TransportBuildError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<ResponseBody, FetchError> {
        let OutboundRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;

        let mut builder = self
            .client
            .request(to_reqwest_method(method), &url)
            .timeout(timeout);
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| convert_reqwest_error(&err, &url, timeout))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(
                &url,
                status.as_u16(),
                status_message(status),
            ));
        }

        let declared_len = response.content_length();
        let chunks = response
            .bytes_stream()
            .map_err(move |err| convert_reqwest_error(&err, &url, timeout))
            .boxed();
        Ok(ResponseBody {
            declared_len,
            chunks,
        })
    }
}

const fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn status_message(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("unexpected status")
}

fn convert_reqwest_error(error: &reqwest::Error, url: &str, timeout: Duration) -> FetchError {
    if error.is_timeout() {
        return FetchError::timeout(url, timeout);
    }
    if error.is_builder() {
        return FetchError::InvalidRequest {
            url: redact(url),
            message: message_without_url(error),
        };
    }
    if let Some(status) = error.status() {
        return FetchError::from_status(url, status.as_u16(), status_message(status));
    }
    FetchError::network(url, message_without_url(error))
}

/// `reqwest` embeds the request URL in its messages; drop the signed query.
fn message_without_url(error: &reqwest::Error) -> String {
    let message = error.to_string();
    match error.url() {
        Some(url) => message.replace(url.as_str(), &redact(url.as_str())),
        None => message,
    }
}
