//! Range-aware HTTP download layer.
//!
//! A [`RangeClient`] issues one GET per call, either for a byte range
//! (absolute or suffix form) or for the whole resource. Partial responses
//! are validated against their `Content-Range` declaration so the caller
//! always learns the true offset of the returned bytes, which matters for
//! suffix requests where the server picks the start.

mod client;
mod range;

pub use client::RangeClient;
pub use range::{ByteRange, FetchedChunk};

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Fail fast if the token is already cancelled, before any I/O is issued.
pub(crate) fn check_cancelled(cancel: Option<&CancellationToken>) -> Result<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(Error::Cancelled),
        _ => Ok(()),
    }
}
