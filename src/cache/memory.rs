use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheRecord, RangeStore, RecordKey};
use crate::error::Result;

/// In-memory [`RangeStore`], the default backing when no persistence is
/// configured. Records are kept per archive in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<HashMap<String, Vec<CacheRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn total_bytes(&self) -> u64 {
        let state = self.state.read().await;
        state
            .values()
            .flat_map(|records| records.iter())
            .map(|record| record.bytes.len() as u64)
            .sum()
    }
}

#[async_trait]
impl RangeStore for MemoryStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<Vec<u8>>> {
        let state = self.state.read().await;
        let bytes = state
            .get(&key.archive_id)
            .and_then(|records| records.iter().find(|record| record.key == *key))
            .map(|record| record.bytes.clone());
        Ok(bytes)
    }

    async fn put(&self, record: CacheRecord) -> Result<()> {
        let mut state = self.state.write().await;
        let records = state.entry(record.key.archive_id.clone()).or_default();
        // A new record replaces the old one wholesale, taking a fresh
        // position at the end of the iteration order.
        records.retain(|existing| existing.key != record.key);
        records.push(record);
        Ok(())
    }

    async fn delete(&self, key: &RecordKey) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(records) = state.get_mut(&key.archive_id) {
            records.retain(|record| record.key != *key);
        }
        Ok(())
    }

    async fn scan(
        &self,
        archive_id: &str,
        visit: &mut (dyn for<'a> FnMut(&'a CacheRecord) -> bool + Send),
    ) -> Result<()> {
        let state = self.state.read().await;
        if let Some(records) = state.get(archive_id) {
            for record in records {
                if visit(record) {
                    break;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_is_idempotent_and_replaces() {
        let store = MemoryStore::new();
        let key = RecordKey::new("a", 0, 2);
        store
            .put(CacheRecord {
                key: key.clone(),
                bytes: vec![1, 2],
            })
            .await
            .unwrap();
        store
            .put(CacheRecord {
                key: key.clone(),
                bytes: vec![9, 9],
            })
            .await
            .unwrap();

        assert_eq!(store.get(&key).await.unwrap(), Some(vec![9, 9]));
        assert_eq!(store.total_bytes().await, 2);
    }

    #[tokio::test]
    async fn delete_is_tolerant_of_absent_keys() {
        let store = MemoryStore::new();
        let key = RecordKey::new("a", 0, 2);
        store.delete(&key).await.unwrap();

        store
            .put(CacheRecord {
                key: key.clone(),
                bytes: vec![1, 2],
            })
            .await
            .unwrap();
        store.delete(&key).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), None);
    }
}
