//! Delivery of encoded artifacts to a pre-signed URL.

use std::time::Duration;

use bytes::Bytes;
use futures_util::TryStreamExt;
use log::info;
use tabula_core::{HeaderSet, HttpMethod};

use super::SinkError;
use crate::fetch::{FetchError, HttpTransport, OutboundRequest, redact};

/// Content type sent with uploaded artifacts.
pub const ARTIFACT_CONTENT_TYPE: &str = "application/octet-stream";

/// `PUT` `artifact` to `url`.
///
/// The response body is drained and discarded. The whole exchange runs under
/// `timeout`.
///
/// # Errors
///
/// Returns [`SinkError::Upload`] when the request fails, the store answers
/// with an error status, or the deadline passes.
pub async fn upload_artifact(
    transport: &dyn HttpTransport,
    url: &str,
    artifact: Bytes,
    timeout: Duration,
) -> Result<(), SinkError> {
    let size = artifact.len();
    let request = OutboundRequest::new(HttpMethod::Put, url, timeout)
        .with_headers(HeaderSet::new().with("Content-Type", ARTIFACT_CONTENT_TYPE))
        .with_body(artifact);

    let exchange = async {
        let mut response = transport.send(request).await?;
        while response.chunks.try_next().await?.is_some() {}
        Ok::<(), FetchError>(())
    };
    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| FetchError::timeout(url, timeout))
        .and_then(|outcome| outcome)
        .map_err(|source| SinkError::Upload {
            url: redact(url),
            source,
        })?;

    info!("uploaded {size} bytes to {}", redact(url));
    Ok(())
}
