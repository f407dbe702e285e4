//! ZIP archive indexing and lazy entry retrieval.
//!
//! ## Architecture
//!
//! - [`structures`]: data structures for the ZIP format elements consumed
//!   here (EOCD, central directory and local file headers)
//! - [`index`]: locates and parses the central directory into an entry table
//! - [`fetcher`]: resolves one entry to its exact byte span and produces its
//!   decompressed bytes
//!
//! ## Reading strategy
//!
//! A ZIP file is designed to be read from the end: the End of Central
//! Directory record sits in the final 22..=65557 bytes, and points at the
//! Central Directory, which in turn points at each entry's local header.
//! One suffix-range fetch therefore yields the whole entry table, and each
//! entry read touches only the bytes of that entry - ideal for HTTP Range
//! requests against large remote archives.
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No ZIP64 extensions
//! - No BZIP2, LZMA, or other compression methods beyond STORED/DEFLATE

mod fetcher;
mod index;
mod structures;

pub use fetcher::EntryFetcher;
pub use index::ArchiveIndex;
pub use structures::*;
