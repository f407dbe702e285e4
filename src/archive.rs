//! Top-level archive handles.
//!
//! [`ArchiveOpener`] wires the download layer, the range cache and the
//! decompression executor together, and memoizes entry tables per URL so a
//! repeat `open` skips the tail fetch. [`RemoteArchive`] is the per-archive
//! handle: a read-only entry table plus lazy entry reads.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::{CachedSource, MemoryStore, RangeCache, RangeStore};
use crate::error::{Error, Result};
use crate::fetch::RangeClient;
use crate::rpc::InflateExecutor;
use crate::zip::{ArchiveEntry, ArchiveIndex, EntryFetcher};

/// Shared entry point for opening remote archives.
///
/// One opener holds one HTTP client, one range cache and one decompression
/// executor; archives opened through it share all three.
pub struct ArchiveOpener {
    client: Arc<RangeClient>,
    cache: Arc<RangeCache>,
    inflate: Arc<InflateExecutor>,
    indexes: Mutex<HashMap<String, Arc<ArchiveIndex>>>,
}

impl ArchiveOpener {
    /// Opener backed by an in-memory range cache.
    pub fn new() -> Result<Self> {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    /// Opener backed by a caller-provided store, e.g. a
    /// [`DiskStore`](crate::cache::DiskStore) for persistence across runs.
    pub fn with_store(store: Arc<dyn RangeStore>) -> Result<Self> {
        Ok(Self {
            client: Arc::new(RangeClient::new()?),
            cache: Arc::new(RangeCache::new(store)),
            inflate: Arc::new(InflateExecutor::spawn()),
            indexes: Mutex::new(HashMap::new()),
        })
    }

    /// Open the archive at `url`, building or reusing its entry table.
    pub async fn open(
        &self,
        url: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<RemoteArchive> {
        let source = Arc::new(CachedSource::new(
            Arc::clone(&self.client),
            Arc::clone(&self.cache),
            url.to_string(),
        ));

        let index = {
            let cached = self.indexes.lock().await.get(url).cloned();
            match cached {
                Some(index) => {
                    debug!(url, "reusing cached entry table");
                    index
                },
                None => {
                    let index = Arc::new(ArchiveIndex::load(&source, cancel).await?);
                    self.indexes
                        .lock()
                        .await
                        .insert(url.to_string(), Arc::clone(&index));
                    index
                },
            }
        };

        Ok(RemoteArchive {
            fetcher: EntryFetcher::new(source, Arc::clone(&self.inflate)),
            index,
        })
    }

    /// Total bytes this opener's client has pulled over the network.
    pub fn transferred_bytes(&self) -> u64 {
        self.client.transferred_bytes()
    }
}

/// Handle to one opened archive.
///
/// The entry table is written once during open and read-only afterwards;
/// any number of entry reads may run concurrently against the same handle.
pub struct RemoteArchive {
    fetcher: EntryFetcher,
    index: Arc<ArchiveIndex>,
}

impl std::fmt::Debug for RemoteArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteArchive")
            .field("entries", &self.index.entries().len())
            .field("total_size", &self.index.total_size())
            .finish_non_exhaustive()
    }
}

impl RemoteArchive {
    /// All entries, in central-directory order.
    pub fn entries(&self) -> &[ArchiveEntry] {
        self.index.entries()
    }

    /// Look up one entry by name; duplicates resolve to the last occurrence.
    pub fn entry(&self, name: &str) -> Option<&ArchiveEntry> {
        self.index.entry(name)
    }

    /// Total length of the remote resource in bytes.
    pub fn total_size(&self) -> u64 {
        self.index.total_size()
    }

    /// Fetch and decompress the named entry.
    pub async fn read_entry(
        &self,
        name: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<u8>> {
        let entry = self
            .entry(name)
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))?
            .clone();
        self.read(&entry, cancel).await
    }

    /// Fetch and decompress an entry from this archive's table.
    pub async fn read(
        &self,
        entry: &ArchiveEntry,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<u8>> {
        self.fetcher.read_entry(&self.index, entry, cancel).await
    }
}
