//! Budget-enforcing fetch operations.

use std::fs::File;
use std::future::Future;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::TryStreamExt;
use log::debug;
use tabula_core::FetchBudget;
use tempfile::NamedTempFile;

use super::error::SizeOrigin;
use super::scratch::ScratchSpace;
use super::transport::{ByteStream, HttpTransport, OutboundRequest};
use super::FetchError;
use crate::nesting::{MAX_JSON_DEPTH, depth_message, exceeds_depth};

/// A downloaded body held in scratch storage.
///
/// The backing file is deleted when this value is dropped.
#[derive(Debug)]
pub struct DownloadedFile {
    file: NamedTempFile,
    bytes: u64,
}

impl DownloadedFile {
    /// Bytes written to scratch storage.
    #[must_use]
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Path of the scratch file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Open an independent read handle positioned at the start.
    ///
    /// # Errors
    ///
    /// Fails when the scratch file cannot be reopened.
    pub fn reopen(&self) -> io::Result<File> {
        self.file.reopen()
    }
}

/// A decoded JSON response.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonResponse {
    /// Parsed body; an empty body decodes to `null`.
    pub value: serde_json::Value,
    /// Bytes received on the wire.
    pub bytes_transferred: u64,
}

/// Fetches remote payloads without exceeding a [`FetchBudget`].
///
/// A declared size over budget fails before the body is read. Otherwise the
/// body is streamed and the transfer aborts as soon as the running total
/// passes the budget. The whole transfer runs under the budget's deadline.
#[derive(Debug, Clone)]
pub struct BoundedFetcher {
    transport: Arc<dyn HttpTransport>,
    scratch: ScratchSpace,
}

impl BoundedFetcher {
    /// Fetch through `transport`, staging downloads in `scratch`.
    pub fn new(transport: Arc<dyn HttpTransport>, scratch: ScratchSpace) -> Self {
        Self { transport, scratch }
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    /// Scratch storage used for downloads.
    #[must_use]
    pub const fn scratch(&self) -> &ScratchSpace {
        &self.scratch
    }

    /// Download `url` into a scratch file.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::TooLarge`] when the body exceeds the budget,
    /// [`FetchError::Timeout`] when the deadline passes, and transport errors
    /// otherwise. The scratch file is removed on every error path.
    pub async fn download(
        &self,
        url: &str,
        budget: FetchBudget,
    ) -> Result<DownloadedFile, FetchError> {
        let request = OutboundRequest::get(url, budget.timeout);
        within_deadline(url, budget.timeout, async {
            let mut body = self.transport.send(request).await?;
            check_declared(url, body.declared_len, budget)?;

            let mut file = self.scratch.create()?;
            let bytes = {
                let mut writer = BufWriter::with_capacity(budget.chunk_size, &mut file);
                let bytes = drain_within_budget(&mut body.chunks, &mut writer, url, budget).await?;
                writer.flush()?;
                bytes
            };
            debug!("staged {bytes} bytes at {}", file.path().display());
            Ok(DownloadedFile { file, bytes })
        })
        .await
    }

    /// Send `request` and decode the response body as JSON.
    ///
    /// The budget applies to the bytes received and again to the decoded
    /// value's serialized size.
    ///
    /// # Errors
    ///
    /// As for [`BoundedFetcher::download`], plus [`FetchError::Decode`] when
    /// the body is not valid JSON.
    pub async fn fetch_json(
        &self,
        request: OutboundRequest,
        budget: FetchBudget,
    ) -> Result<JsonResponse, FetchError> {
        let url = request.url.clone();
        within_deadline(&url, budget.timeout, async {
            let mut body = self.transport.send(request).await?;
            check_declared(&url, body.declared_len, budget)?;

            let mut buffer = Vec::new();
            let bytes_transferred =
                drain_within_budget(&mut body.chunks, &mut buffer, &url, budget).await?;
            let value = decode_json(&url, buffer)?;

            let decoded_len = serialized_len(&value);
            if !budget.admits(decoded_len) {
                return Err(FetchError::too_large(
                    &url,
                    budget.max_bytes,
                    decoded_len,
                    SizeOrigin::Decoded,
                ));
            }
            Ok(JsonResponse {
                value,
                bytes_transferred,
            })
        })
        .await
    }
}

async fn within_deadline<T, F>(url: &str, timeout: Duration, transfer: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    tokio::time::timeout(timeout, transfer)
        .await
        .map_err(|_| FetchError::timeout(url, timeout))?
}

fn check_declared(url: &str, declared: Option<u64>, budget: FetchBudget) -> Result<(), FetchError> {
    match declared {
        Some(size) if !budget.admits(size) => Err(FetchError::too_large(
            url,
            budget.max_bytes,
            size,
            SizeOrigin::Declared,
        )),
        _ => Ok(()),
    }
}

async fn drain_within_budget<W: Write>(
    chunks: &mut ByteStream,
    sink: &mut W,
    url: &str,
    budget: FetchBudget,
) -> Result<u64, FetchError> {
    let mut received: u64 = 0;
    while let Some(chunk) = chunks.try_next().await? {
        received = received.saturating_add(chunk.len() as u64);
        if !budget.admits(received) {
            return Err(FetchError::too_large(
                url,
                budget.max_bytes,
                received,
                SizeOrigin::Streamed,
            ));
        }
        sink.write_all(&chunk)?;
    }
    Ok(received)
}

fn decode_json(url: &str, mut buffer: Vec<u8>) -> Result<serde_json::Value, FetchError> {
    if buffer.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Null);
    }
    if exceeds_depth(&buffer, MAX_JSON_DEPTH) {
        return Err(FetchError::Decode {
            url: super::redact(url),
            message: depth_message(),
        });
    }
    simd_json::serde::from_slice(&mut buffer).map_err(|err| FetchError::Decode {
        url: super::redact(url),
        message: err.to_string(),
    })
}

/// Counts bytes written without storing them.
#[derive(Default)]
struct ByteCounter(u64);

impl Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 = self.0.saturating_add(buf.len() as u64);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn serialized_len(value: &serde_json::Value) -> u64 {
    let mut counter = ByteCounter::default();
    // The counter never fails a write, so neither does serialization.
    serde_json::to_writer(&mut counter, value).ok();
    counter.0
}
