use thiserror::Error;

/// Errors surfaced by the lazy archive reader.
///
/// Lower layers never retry on their own; every failure is reported to the
/// immediate caller as one of these kinds so it can decide whether to retry,
/// fall back to a whole-resource download, or give up.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// The server answered a `Range` request with a full 200 response.
    /// The caller may retry via [`fetch_all`](crate::fetch::RangeClient::fetch_all).
    #[error("server ignored the Range header and returned a full response")]
    RangeNotSupported,

    /// A 206 response without a parseable `Content-Range` header.
    #[error("Content-Range not found.")]
    MalformedRangeResponse,

    /// A 206 response whose `Content-Range` declares a different span than
    /// the one requested.
    #[error("server returned range starting at {got}, requested {want}")]
    RangeMismatch { want: u64, got: u64 },

    /// Non-success status on a whole-resource fetch.
    #[error("Get request failed. status code: {0}")]
    Http(u16),

    /// The operation was aborted through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// No End-Of-Central-Directory signature in the tail window; the
    /// resource is not a ZIP archive.
    #[error("end of central directory not found")]
    EocdNotFound,

    /// The resource is shorter than the minimum EOCD record (22 bytes).
    #[error("resource too small to be a ZIP archive")]
    ArchiveTooSmall,

    /// Internal inconsistency in the archive structures.
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    /// Compression method other than STORED or DEFLATE.
    #[error("unsupported compression method: {0}")]
    UnsupportedCompressionMethod(u16),

    /// The entry carries the encryption flag.
    #[error("entry is encrypted: {0}")]
    EncryptedEntry(String),

    /// No entry with the given name in the archive.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// The decompression executor rejected the request or went away.
    #[error("decompression failed: {0}")]
    Inflate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn corrupt<T: Into<String>>(reason: T) -> Error {
        Error::CorruptArchive(reason.into())
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        match (self, other) {
            (Error::Http(a), Error::Http(b)) => a == b,
            (Error::UnsupportedCompressionMethod(a), Error::UnsupportedCompressionMethod(b)) => {
                a == b
            },
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}
