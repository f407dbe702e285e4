use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::RangeCache;
use crate::error::Result;
use crate::fetch::{ByteRange, FetchedChunk, RangeClient};

/// Cache-backed view of one remote resource.
///
/// Every absolute-range read consults the cache first; a hit short-circuits
/// the network, a miss fetches through the [`RangeClient`] and stores the
/// span under its resolved offset. Suffix and whole-resource reads cannot
/// be keyed before the server resolves them, so they go to the network and
/// populate the cache afterwards.
pub struct CachedSource {
    client: Arc<RangeClient>,
    cache: Arc<RangeCache>,
    url: String,
}

impl CachedSource {
    pub fn new(client: Arc<RangeClient>, cache: Arc<RangeCache>, url: String) -> Self {
        Self { client, cache, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Read `len` bytes at absolute offset `start`.
    pub async fn read_span(
        &self,
        start: u64,
        len: u64,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }

        if let Some(bytes) = self.cache.get(&self.url, start, len).await? {
            debug!(url = %self.url, start, len, "cache hit");
            return Ok(bytes);
        }

        let chunk = self
            .client
            .fetch_range(&self.url, ByteRange::span_len(start, len), cancel)
            .await?;
        self.cache
            .put(&self.url, chunk.offset, chunk.bytes.clone())
            .await?;
        Ok(chunk.bytes)
    }

    /// Read the last `len` bytes, wherever the resource ends. The returned
    /// chunk carries the server-resolved start offset.
    pub async fn read_suffix(
        &self,
        len: u64,
        cancel: Option<&CancellationToken>,
    ) -> Result<FetchedChunk> {
        let chunk = self
            .client
            .fetch_range(&self.url, ByteRange::suffix(len), cancel)
            .await?;
        self.cache
            .put(&self.url, chunk.offset, chunk.bytes.clone())
            .await?;
        Ok(chunk)
    }

    /// Read the whole resource, for servers without range support.
    pub async fn read_all(&self, cancel: Option<&CancellationToken>) -> Result<Vec<u8>> {
        let bytes = self.client.fetch_all(&self.url, cancel).await?;
        self.cache.put(&self.url, 0, bytes.clone()).await?;
        Ok(bytes)
    }
}
