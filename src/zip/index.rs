//! Central directory location and parsing.
//!
//! The index is built with the minimum network traffic: one suffix-range
//! fetch for the largest possible EOCD window, and a second absolute fetch
//! only when the central directory does not already lie inside that tail.

use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::{Cursor, Read};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::structures::*;
use crate::cache::CachedSource;
use crate::error::{Error, Result};
use crate::fetch::FetchedChunk;

/// Parsed entry table of one remote archive.
///
/// Built once per archive, read-only afterwards; concurrent entry reads
/// share it without locking.
pub struct ArchiveIndex {
    entries: Vec<ArchiveEntry>,
    by_name: HashMap<String, usize>,
    total_size: u64,
}

impl ArchiveIndex {
    /// Locate, fetch and parse the central directory of the archive behind
    /// `source`.
    ///
    /// Issues a suffix-range fetch for the last [`TAIL_WINDOW`] bytes
    /// (servers clamp the window to the resource size). If the server has
    /// no range support, the whole resource is downloaded instead and
    /// indexed from memory.
    pub async fn load(
        source: &CachedSource,
        cancel: Option<&CancellationToken>,
    ) -> Result<ArchiveIndex> {
        let tail = match source.read_suffix(TAIL_WINDOW, cancel).await {
            Ok(chunk) => chunk,
            Err(Error::RangeNotSupported) => {
                warn!(url = source.url(), "no range support, downloading whole resource");
                let bytes = source.read_all(cancel).await?;
                FetchedChunk { bytes, offset: 0 }
            },
            Err(e) => return Err(e),
        };

        let total_size = tail.offset + tail.bytes.len() as u64;
        if total_size < EndOfCentralDirectory::SIZE as u64 {
            return Err(Error::ArchiveTooSmall);
        }

        let (eocd, eocd_pos) = find_eocd(&tail.bytes)?;
        debug!(
            url = source.url(),
            entries = eocd.total_entries,
            eocd_offset = tail.offset + eocd_pos as u64,
            "located end of central directory"
        );

        if eocd.is_multi_volume() {
            return Err(Error::corrupt("multi-volume archives are not supported"));
        }
        if eocd.is_zip64() {
            return Err(Error::corrupt("ZIP64 archives are not supported"));
        }

        let cd_offset = eocd.cd_offset as u64;
        let cd_size = eocd.cd_size as u64;
        if cd_offset + cd_size > total_size {
            return Err(Error::corrupt("central directory extends past end of resource"));
        }

        let count = eocd.total_entries as usize;
        let entries = if cd_offset >= tail.offset {
            // Common case: the directory sits inside the tail we already hold.
            let lo = (cd_offset - tail.offset) as usize;
            parse_central_directory(&tail.bytes[lo..lo + cd_size as usize], count)?
        } else {
            let bytes = source.read_span(cd_offset, cd_size, cancel).await?;
            parse_central_directory(&bytes, count)?
        };

        Ok(Self::from_entries(entries, total_size))
    }

    fn from_entries(entries: Vec<ArchiveEntry>, total_size: u64) -> ArchiveIndex {
        // Last occurrence wins on duplicate names, per central-directory
        // semantics.
        let mut by_name = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            by_name.insert(entry.name.clone(), idx);
        }
        ArchiveIndex {
            entries,
            by_name,
            total_size,
        }
    }

    /// All entries, in central-directory order.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Look up an entry by name.
    pub fn entry(&self, name: &str) -> Option<&ArchiveEntry> {
        self.by_name.get(name).map(|&idx| &self.entries[idx])
    }

    /// Total length of the remote resource in bytes.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scan a tail buffer backward for the EOCD record.
///
/// Comment bytes may coincidentally contain the signature, so a match only
/// counts when its declared comment length reaches exactly to the end of
/// the buffer; scanning backward returns the last such record in the file.
fn find_eocd(buf: &[u8]) -> Result<(EndOfCentralDirectory, usize)> {
    if buf.len() < EndOfCentralDirectory::SIZE {
        return Err(Error::ArchiveTooSmall);
    }

    for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
        if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
            continue;
        }
        let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
        if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
            let eocd = EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
            return Ok((eocd, i));
        }
    }

    Err(Error::EocdNotFound)
}

/// Parse `count` central-directory file headers out of `data`.
fn parse_central_directory(data: &[u8], count: usize) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::with_capacity(count);
    let mut cursor = Cursor::new(data);

    while entries.len() < count {
        entries.push(parse_cdfh(&mut cursor, data.len())?);
    }

    Ok(entries)
}

fn parse_cdfh(cursor: &mut Cursor<&[u8]>, data_len: usize) -> Result<ArchiveEntry> {
    let remaining = data_len - cursor.position() as usize;
    if remaining < CDFH_MIN_SIZE {
        return Err(Error::corrupt("central directory truncated"));
    }

    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        return Err(Error::corrupt("central directory file header signature mismatch"));
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let file_name_length = cursor.read_u16::<LittleEndian>()? as usize;
    let extra_field_length = cursor.read_u16::<LittleEndian>()? as usize;
    let file_comment_length = cursor.read_u16::<LittleEndian>()? as usize;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let local_header_offset = cursor.read_u32::<LittleEndian>()? as u64;

    let variable_len = file_name_length + extra_field_length + file_comment_length;
    if cursor.position() as usize + variable_len > data_len {
        return Err(Error::corrupt("central directory record runs past buffer end"));
    }

    let mut file_name_bytes = vec![0u8; file_name_length];
    cursor.read_exact(&mut file_name_bytes)?;
    // Lossy conversion keeps non-UTF8 names readable rather than fatal.
    let name = String::from_utf8_lossy(&file_name_bytes).to_string();
    let is_directory = name.ends_with('/');

    cursor.set_position(cursor.position() + (extra_field_length + file_comment_length) as u64);

    Ok(ArchiveEntry {
        name,
        compression_method: CompressionMethod::from_u16(compression_method),
        compressed_size,
        uncompressed_size,
        crc32,
        local_header_offset,
        last_mod_time,
        last_mod_date,
        is_directory,
        is_encrypted: flags & 1 == 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eocd_bytes(entry_count: u16, cd_size: u32, cd_offset: u32, comment: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(EndOfCentralDirectory::SIGNATURE);
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&entry_count.to_le_bytes());
        data.extend_from_slice(&entry_count.to_le_bytes());
        data.extend_from_slice(&cd_size.to_le_bytes());
        data.extend_from_slice(&cd_offset.to_le_bytes());
        data.extend_from_slice(&(comment.len() as u16).to_le_bytes());
        data.extend_from_slice(comment);
        data
    }

    fn cdfh_bytes(name: &str, method: u16, lfh_offset: u32, sizes: (u32, u32)) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(CDFH_SIGNATURE);
        data.extend_from_slice(&20u16.to_le_bytes()); // version made by
        data.extend_from_slice(&20u16.to_le_bytes()); // version needed
        data.extend_from_slice(&0u16.to_le_bytes()); // flags
        data.extend_from_slice(&method.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes()); // time
        data.extend_from_slice(&0u16.to_le_bytes()); // date
        data.extend_from_slice(&0u32.to_le_bytes()); // crc32
        data.extend_from_slice(&sizes.0.to_le_bytes()); // compressed
        data.extend_from_slice(&sizes.1.to_le_bytes()); // uncompressed
        data.extend_from_slice(&(name.len() as u16).to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes()); // extra len
        data.extend_from_slice(&0u16.to_le_bytes()); // comment len
        data.extend_from_slice(&0u16.to_le_bytes()); // disk start
        data.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        data.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        data.extend_from_slice(&lfh_offset.to_le_bytes());
        data.extend_from_slice(name.as_bytes());
        data
    }

    #[test]
    fn finds_eocd_without_comment() {
        let mut buf = vec![0u8; 100];
        buf.extend(eocd_bytes(2, 92, 8, &[]));

        let (eocd, pos) = find_eocd(&buf).unwrap();
        assert_eq!(pos, 100);
        assert_eq!(eocd.total_entries, 2);
        assert_eq!(eocd.comment_len, 0);
    }

    #[test]
    fn finds_eocd_behind_a_comment() {
        let mut buf = vec![0u8; 50];
        buf.extend(eocd_bytes(1, 40, 10, b"created by a test"));

        let (eocd, pos) = find_eocd(&buf).unwrap();
        assert_eq!(pos, 50);
        assert_eq!(eocd.comment_len, 17);
    }

    #[test]
    fn signature_bytes_inside_the_comment_do_not_fool_the_scan() {
        // Comment contains the magic followed by bytes that do not form a
        // record whose comment length reaches the buffer end.
        let mut comment = Vec::new();
        comment.extend_from_slice(b"prefix ");
        comment.extend_from_slice(EndOfCentralDirectory::SIGNATURE);
        comment.extend_from_slice(&[0u8; 30]);

        let mut buf = vec![0u8; 64];
        buf.extend(eocd_bytes(5, 60, 4, &comment));

        let (eocd, pos) = find_eocd(&buf).unwrap();
        assert_eq!(pos, 64);
        assert_eq!(eocd.total_entries, 5);
    }

    #[test]
    fn missing_signature_is_eocd_not_found() {
        let buf = vec![0xAAu8; 4096];
        assert_eq!(find_eocd(&buf).unwrap_err(), Error::EocdNotFound);
    }

    #[test]
    fn tiny_buffer_is_archive_too_small() {
        assert_eq!(find_eocd(&[0u8; 10]).unwrap_err(), Error::ArchiveTooSmall);
    }

    #[test]
    fn parses_directory_entries_in_order() {
        let mut cd = Vec::new();
        cd.extend(cdfh_bytes("mimetype", 0, 0, (20, 20)));
        cd.extend(cdfh_bytes("OEBPS/chapter1.xhtml", 8, 58, (100, 300)));

        let entries = parse_central_directory(&cd, 2).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "mimetype");
        assert_eq!(entries[0].compression_method, CompressionMethod::Stored);
        assert_eq!(entries[1].name, "OEBPS/chapter1.xhtml");
        assert_eq!(entries[1].compression_method, CompressionMethod::Deflate);
        assert_eq!(entries[1].local_header_offset, 58);
        assert_eq!(entries[1].uncompressed_size, 300);
    }

    #[test]
    fn fewer_records_than_declared_is_corrupt() {
        let cd = cdfh_bytes("only.txt", 0, 0, (1, 1));
        assert_eq!(
            parse_central_directory(&cd, 2).unwrap_err(),
            Error::CorruptArchive(String::new())
        );
    }

    #[test]
    fn name_running_past_buffer_end_is_corrupt() {
        let mut cd = cdfh_bytes("name.txt", 0, 0, (1, 1));
        // Claim a name longer than the remaining bytes.
        cd[28] = 0xFF;
        cd[29] = 0xFF;
        assert_eq!(
            parse_central_directory(&cd, 1).unwrap_err(),
            Error::CorruptArchive(String::new())
        );
    }

    #[test]
    fn bad_record_signature_is_corrupt() {
        let mut cd = cdfh_bytes("name.txt", 0, 0, (1, 1));
        cd[0] = b'X';
        assert!(matches!(
            parse_central_directory(&cd, 1).unwrap_err(),
            Error::CorruptArchive(_)
        ));
    }

    #[test]
    fn duplicate_names_resolve_to_the_last_occurrence() {
        let entries = vec![
            ArchiveEntry {
                name: "a.txt".into(),
                compression_method: CompressionMethod::Stored,
                compressed_size: 1,
                uncompressed_size: 1,
                crc32: 0,
                local_header_offset: 0,
                last_mod_time: 0,
                last_mod_date: 0,
                is_directory: false,
                is_encrypted: false,
            },
            ArchiveEntry {
                name: "a.txt".into(),
                compression_method: CompressionMethod::Stored,
                compressed_size: 1,
                uncompressed_size: 1,
                crc32: 0,
                local_header_offset: 40,
                last_mod_time: 0,
                last_mod_date: 0,
                is_directory: false,
                is_encrypted: false,
            },
        ];

        let index = ArchiveIndex::from_entries(entries, 1000);
        assert_eq!(index.len(), 2);
        assert_eq!(index.entry("a.txt").unwrap().local_header_offset, 40);
        assert!(index.entry("missing.txt").is_none());
    }
}
