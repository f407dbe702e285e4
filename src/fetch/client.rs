use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::range::parse_content_range;
use super::{check_cancelled, ByteRange, FetchedChunk};
use crate::error::{Error, Result};

/// HTTP client for range and whole-resource GETs.
///
/// One instance is shared across an archive handle; it keeps a running
/// count of bytes pulled over the network so callers can report traffic.
pub struct RangeClient {
    client: Client,
    transferred_bytes: AtomicU64,
}

impl RangeClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            transferred_bytes: AtomicU64::new(0),
        })
    }

    /// Total bytes received from the network by this client.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Fetch one byte range of `url`.
    ///
    /// Requires a 206 response carrying a parseable `Content-Range`; the
    /// returned chunk's offset is the start the server declared, which for
    /// suffix ranges may differ from anything in the request. A 200 answer
    /// means the server ignored the header and yields
    /// [`Error::RangeNotSupported`] so the caller can fall back to
    /// [`fetch_all`](Self::fetch_all).
    pub async fn fetch_range(
        &self,
        url: &str,
        range: ByteRange,
        cancel: Option<&CancellationToken>,
    ) -> Result<FetchedChunk> {
        check_cancelled(cancel)?;
        debug!(url, range = %range.header_value(), "range fetch");

        let request = async {
            let resp = self
                .client
                .get(url)
                .header(RANGE, range.header_value())
                .send()
                .await?;

            match resp.status() {
                StatusCode::PARTIAL_CONTENT => {},
                StatusCode::OK => return Err(Error::RangeNotSupported),
                status => return Err(Error::Http(status.as_u16())),
            }

            let (start, end, _total) = resp
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .ok_or(Error::MalformedRangeResponse)
                .and_then(parse_content_range)?;

            // Servers clamp suffix requests, so the declared start is
            // authoritative; for absolute requests it must echo ours.
            if let Some(want) = range.start() {
                if start != want {
                    return Err(Error::RangeMismatch { want, got: start });
                }
            }

            if end < start {
                return Err(Error::MalformedRangeResponse);
            }

            let bytes = resp.bytes().await?.to_vec();
            // The declaration must account for every byte actually sent.
            if bytes.len() as u64 != end - start + 1 {
                return Err(Error::MalformedRangeResponse);
            }
            Ok(FetchedChunk {
                bytes,
                offset: start,
            })
        };

        let chunk = self.race_cancel(request, cancel).await?;
        self.transferred_bytes
            .fetch_add(chunk.bytes.len() as u64, Ordering::Relaxed);
        Ok(chunk)
    }

    /// Fetch the whole resource. Any status other than 200 fails with
    /// [`Error::Http`].
    pub async fn fetch_all(
        &self,
        url: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<u8>> {
        check_cancelled(cancel)?;
        debug!(url, "whole-resource fetch");

        let request = async {
            let resp = self.client.get(url).send().await?;
            if resp.status() != StatusCode::OK {
                return Err(Error::Http(resp.status().as_u16()));
            }
            Ok(resp.bytes().await?.to_vec())
        };

        let bytes = self.race_cancel(request, cancel).await?;
        self.transferred_bytes
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        Ok(bytes)
    }

    /// Run `request` to completion unless the token fires first; a fired
    /// token aborts the transfer and surfaces [`Error::Cancelled`], never a
    /// partial result.
    async fn race_cancel<T>(
        &self,
        request: impl Future<Output = Result<T>>,
        cancel: Option<&CancellationToken>,
    ) -> Result<T> {
        match cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => Err(Error::Cancelled),
                    result = request => result,
                }
            },
            None => request.await,
        }
    }
}
