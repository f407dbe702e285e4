//! # lazyzip
//!
//! Lazy random-access reader for remote ZIP/EPUB archives over HTTP Range
//! requests.
//!
//! This library lets a client read single files out of a large remote
//! archive without downloading the whole thing. It locates and parses the
//! archive's central directory from a tail-byte fetch, computes the exact
//! byte span of a requested entry, fetches and decompresses only that span,
//! and persists fetched spans in a local range cache so repeat reads skip
//! the network.
//!
//! ## Features
//!
//! - Absolute and suffix HTTP Range requests with strict Content-Range
//!   validation, and fallback to whole-resource download when the server
//!   has no range support
//! - Entry table built from a single tail fetch (one extra fetch when the
//!   central directory is larger than the tail window)
//! - STORED (uncompressed) and DEFLATE compression methods, decompressed
//!   by an out-of-line executor reached through a correlation-id bridge
//! - Pluggable persistent range cache (in-memory and on-disk stores)
//! - Cooperative cancellation before and during every network operation
//!
//! ## Example
//!
//! ```no_run
//! use lazyzip::ArchiveOpener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let opener = ArchiveOpener::new()?;
//!     let archive = opener.open("https://example.com/book.epub", None).await?;
//!
//!     for entry in archive.entries() {
//!         println!("{}", entry.name);
//!     }
//!
//!     let content = archive.read_entry("OEBPS/content.opf", None).await?;
//!     println!("{} bytes", content.len());
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cache;
pub mod cli;
pub mod error;
pub mod fetch;
pub mod rpc;
pub mod util;
pub mod zip;

pub use archive::{ArchiveOpener, RemoteArchive};
pub use cache::{ByteBudget, CachedSource, DiskStore, MemoryStore, RangeCache, RangeStore};
pub use cli::Cli;
pub use error::{Error, Result};
pub use fetch::{ByteRange, FetchedChunk, RangeClient};
pub use rpc::{InflateExecutor, Resolver, ResolverStatus, RpcChannel};
pub use zip::{ArchiveEntry, ArchiveIndex, CompressionMethod};
