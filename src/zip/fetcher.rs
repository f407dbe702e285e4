//! Entry retrieval: local header resolution, payload fetch, decompression.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::index::ArchiveIndex;
use super::structures::*;
use crate::cache::CachedSource;
use crate::error::{Error, Result};
use crate::rpc::InflateExecutor;

/// Bytes fetched up front at the local-header offset. Covers the fixed
/// header plus typical name and extra fields; longer ones trigger one
/// re-fetch.
const LOCAL_HEADER_PROBE: u64 = LFH_SIZE as u64 + 512;

/// Produces decompressed entry bytes from their resolved index entries.
///
/// Every range fetch on this path goes through the [`CachedSource`], so a
/// cached span short-circuits the network, and decompression is handed to
/// the out-of-line executor.
pub struct EntryFetcher {
    source: Arc<CachedSource>,
    inflate: Arc<InflateExecutor>,
}

impl EntryFetcher {
    pub fn new(source: Arc<CachedSource>, inflate: Arc<InflateExecutor>) -> Self {
        Self { source, inflate }
    }

    /// Fetch and decompress one entry.
    ///
    /// Touches only the span from the entry's local header to the end of
    /// its compressed payload.
    pub async fn read_entry(
        &self,
        index: &ArchiveIndex,
        entry: &ArchiveEntry,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<u8>> {
        match entry.compression_method {
            CompressionMethod::Stored | CompressionMethod::Deflate => {},
            CompressionMethod::Unknown(method) => {
                return Err(Error::UnsupportedCompressionMethod(method));
            },
        }
        if entry.is_encrypted {
            return Err(Error::EncryptedEntry(entry.name.clone()));
        }

        let header_len = self.resolve_header(index, entry, cancel).await?;
        let data_start = entry.local_header_offset + header_len;
        debug!(
            name = %entry.name,
            data_start,
            compressed = entry.compressed_size,
            "fetching entry payload"
        );

        let payload = self
            .source
            .read_span(data_start, entry.compressed_size, cancel)
            .await?;

        let bytes = match entry.compression_method {
            CompressionMethod::Stored => payload,
            CompressionMethod::Deflate => {
                self.inflate
                    .decompress(
                        CompressionMethod::Deflate.as_u16(),
                        payload,
                        entry.uncompressed_size,
                    )
                    .await?
            },
            CompressionMethod::Unknown(_) => unreachable!(),
        };

        if bytes.len() as u64 != entry.uncompressed_size {
            return Err(Error::corrupt(format!(
                "entry {} decompressed to {} bytes, expected {}",
                entry.name,
                bytes.len(),
                entry.uncompressed_size
            )));
        }
        Ok(bytes)
    }

    /// Read the entry's local header and return its total length (fixed
    /// fields plus name and extra field), cross-checking it against the
    /// central directory.
    async fn resolve_header(
        &self,
        index: &ArchiveIndex,
        entry: &ArchiveEntry,
        cancel: Option<&CancellationToken>,
    ) -> Result<u64> {
        if entry.local_header_offset + LFH_SIZE as u64 > index.total_size() {
            return Err(Error::corrupt("local header offset past end of resource"));
        }

        let probe_len = LOCAL_HEADER_PROBE.min(index.total_size() - entry.local_header_offset);
        let mut head = self
            .source
            .read_span(entry.local_header_offset, probe_len, cancel)
            .await?;

        if head.len() < LFH_SIZE {
            return Err(Error::corrupt("local file header truncated"));
        }
        if &head[0..4] != LFH_SIGNATURE {
            return Err(Error::corrupt("local file header signature mismatch"));
        }

        let mut cursor = Cursor::new(&head[..]);
        cursor.set_position(8);
        let method = cursor.read_u16::<LittleEndian>()?;
        if method != entry.compression_method.as_u16() {
            return Err(Error::corrupt("local header disagrees with central directory"));
        }

        cursor.set_position(26);
        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;
        let header_len = LFH_SIZE as u64 + file_name_length + extra_field_length;

        // The declared name/extra ran past the probe; fetch the full header.
        if header_len > head.len() as u64 {
            head = self
                .source
                .read_span(entry.local_header_offset, header_len, cancel)
                .await?;
        }

        let name_end = LFH_SIZE + file_name_length as usize;
        if name_end > head.len() {
            return Err(Error::corrupt("local file header truncated"));
        }
        let name = String::from_utf8_lossy(&head[LFH_SIZE..name_end]);
        if name != entry.name {
            return Err(Error::corrupt("local header disagrees with central directory"));
        }

        Ok(header_len)
    }
}
