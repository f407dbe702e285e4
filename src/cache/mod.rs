//! Persistent range cache.
//!
//! Fetched byte spans are stored keyed by (archive identity, offset,
//! length) so repeat reads of the same region skip the network. The storage
//! itself is behind the [`RangeStore`] trait: a key-indexed byte store with
//! point lookup, insert, delete, and forward iteration with early stop. The
//! [`RangeCache`] layer on top adds covering-range lookup and drives the
//! pluggable eviction policy.

mod disk;
mod memory;
mod source;

pub use disk::DiskStore;
pub use memory::MemoryStore;
pub use source::CachedSource;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;

/// Identity of one stored span.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub archive_id: String,
    pub start: u64,
    pub len: u64,
}

impl RecordKey {
    pub fn new<S: Into<String>>(archive_id: S, start: u64, len: u64) -> Self {
        Self {
            archive_id: archive_id.into(),
            start,
            len,
        }
    }

    fn covers(&self, start: u64, len: u64) -> bool {
        self.start <= start && start + len <= self.start + self.len
    }
}

/// One cached span. Never mutated in place; a later put for the same key
/// replaces the whole record.
#[derive(Debug, Clone)]
pub struct CacheRecord {
    pub key: RecordKey,
    pub bytes: Vec<u8>,
}

/// Backing store contract.
///
/// Implementations hand out owned copies of stored bytes, so eviction can
/// never invalidate a value a reader already holds.
#[async_trait]
pub trait RangeStore: Send + Sync {
    /// Point lookup by exact key.
    async fn get(&self, key: &RecordKey) -> Result<Option<Vec<u8>>>;

    /// Insert or replace. Idempotent for identical records.
    async fn put(&self, record: CacheRecord) -> Result<()>;

    /// Remove a record; removing an absent key is not an error.
    async fn delete(&self, key: &RecordKey) -> Result<()>;

    /// Visit the archive's records in insertion order. A visitor returning
    /// true stops the scan; remaining records are not visited.
    async fn scan(
        &self,
        archive_id: &str,
        visit: &mut (dyn for<'a> FnMut(&'a CacheRecord) -> bool + Send),
    ) -> Result<()>;
}

/// Picks cache victims after an insert. The policy only sees record keys
/// (lengths included), never payloads.
pub trait EvictionPolicy: Send + Sync {
    /// `keys` is the archive's records in insertion order.
    fn plan(&self, keys: &[RecordKey]) -> Vec<RecordKey>;
}

/// Evicts oldest records first until the archive's total stored bytes fit
/// the budget.
pub struct ByteBudget {
    pub max_bytes: u64,
}

impl EvictionPolicy for ByteBudget {
    fn plan(&self, keys: &[RecordKey]) -> Vec<RecordKey> {
        let mut total: u64 = keys.iter().map(|k| k.len).sum();
        let mut victims = Vec::new();
        for key in keys {
            if total <= self.max_bytes {
                break;
            }
            total -= key.len;
            victims.push(key.clone());
        }
        victims
    }
}

/// Cache façade over a [`RangeStore`].
pub struct RangeCache {
    store: Arc<dyn RangeStore>,
    policy: Option<Box<dyn EvictionPolicy>>,
}

impl RangeCache {
    pub fn new(store: Arc<dyn RangeStore>) -> Self {
        Self {
            store,
            policy: None,
        }
    }

    pub fn with_policy(store: Arc<dyn RangeStore>, policy: Box<dyn EvictionPolicy>) -> Self {
        Self {
            store,
            policy: Some(policy),
        }
    }

    /// Look up `len` bytes at `start`. Hits require an exact or fully
    /// covering record; partial overlaps are misses, the caller just
    /// fetches again.
    pub async fn get(&self, archive_id: &str, start: u64, len: u64) -> Result<Option<Vec<u8>>> {
        let key = RecordKey::new(archive_id, start, len);
        if let Some(bytes) = self.store.get(&key).await? {
            return Ok(Some(bytes));
        }

        let mut found = None;
        self.store
            .scan(archive_id, &mut |record| {
                if record.key.covers(start, len) {
                    let lo = (start - record.key.start) as usize;
                    let hi = lo + len as usize;
                    found = Some(record.bytes[lo..hi].to_vec());
                    return true;
                }
                false
            })
            .await?;
        Ok(found)
    }

    /// Store a fetched span under its resolved absolute range, then let the
    /// eviction policy trim the archive's records.
    pub async fn put(&self, archive_id: &str, start: u64, bytes: Vec<u8>) -> Result<()> {
        let key = RecordKey::new(archive_id, start, bytes.len() as u64);
        self.store.put(CacheRecord { key, bytes }).await?;
        self.evict(archive_id).await
    }

    /// Visit the archive's records in insertion order; the visitor returns
    /// true to stop early.
    pub async fn scan(
        &self,
        archive_id: &str,
        visit: &mut (dyn for<'a> FnMut(&'a CacheRecord) -> bool + Send),
    ) -> Result<()> {
        self.store.scan(archive_id, visit).await
    }

    async fn evict(&self, archive_id: &str) -> Result<()> {
        let Some(policy) = &self.policy else {
            return Ok(());
        };

        let mut keys = Vec::new();
        self.store
            .scan(archive_id, &mut |record| {
                keys.push(record.key.clone());
                false
            })
            .await?;

        for victim in policy.plan(&keys) {
            debug!(archive = archive_id, start = victim.start, len = victim.len, "evicting span");
            self.store.delete(&victim).await?;
        }
        Ok(())
    }
}
