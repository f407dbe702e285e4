use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use tracing::warn;

use super::{CacheRecord, RangeStore, RecordKey};
use crate::error::Result;

/// File-per-record [`RangeStore`] rooted at a directory.
///
/// File names are `<base64url(archive_id)>.<start>.<len>`, so a record is
/// addressable without an index file and survives process restarts. Writes
/// go through a temp file and a rename, so a reader never observes a
/// half-written record. Scan order approximates insertion order by file
/// modification time.
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        std::fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
        })
    }

    fn path_for(&self, key: &RecordKey) -> PathBuf {
        let archive = URL_SAFE_NO_PAD.encode(&key.archive_id);
        self.root.join(format!("{archive}.{}.{}", key.start, key.len))
    }

    fn key_from_file_name(name: &str) -> Option<RecordKey> {
        let mut parts = name.rsplitn(3, '.');
        let len: u64 = parts.next()?.parse().ok()?;
        let start: u64 = parts.next()?.parse().ok()?;
        let archive = URL_SAFE_NO_PAD.decode(parts.next()?).ok()?;
        Some(RecordKey::new(String::from_utf8(archive).ok()?, start, len))
    }
}

#[async_trait]
impl RangeStore for DiskStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, record: CacheRecord) -> Result<()> {
        let path = self.path_for(&record.key);
        let mut staging = path.clone().into_os_string();
        staging.push(".tmp");
        tokio::fs::write(&staging, &record.bytes).await?;
        tokio::fs::rename(&staging, &path).await?;
        Ok(())
    }

    async fn delete(&self, key: &RecordKey) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn scan(
        &self,
        archive_id: &str,
        visit: &mut (dyn for<'a> FnMut(&'a CacheRecord) -> bool + Send),
    ) -> Result<()> {
        let prefix = format!("{}.", URL_SAFE_NO_PAD.encode(archive_id));

        let mut files: Vec<(SystemTime, String, RecordKey)> = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(&prefix) || name.ends_with(".tmp") {
                continue;
            }
            let Some(key) = Self::key_from_file_name(&name) else {
                warn!(file = %name, "skipping unrecognized cache file");
                continue;
            };
            let modified = entry.metadata().await?.modified()?;
            files.push((modified, name, key));
        }
        files.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));

        for (_, _, key) in files {
            match self.get(&key).await? {
                // Deleted between listing and read; skip.
                None => continue,
                Some(bytes) => {
                    if visit(&CacheRecord { key, bytes }) {
                        break;
                    }
                },
            }
        }
        Ok(())
    }
}
