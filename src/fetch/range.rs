use crate::error::{Error, Result};

/// A byte span of a remote resource, in `Range` header terms.
///
/// Three shapes exist: an absolute inclusive span `[start, end]`, an
/// open-ended span `[start, ..)`, and a suffix span covering the last N
/// bytes. At least one bound is always present; the constructors are the
/// only way to build one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start: Option<u64>,
    end: Option<u64>,
}

impl ByteRange {
    /// Absolute inclusive span `[start, end]`.
    pub fn span(start: u64, end: u64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Absolute span of `len` bytes beginning at `start`.
    ///
    /// `len` must be non-zero; HTTP ranges cannot express an empty span.
    pub fn span_len(start: u64, len: u64) -> Self {
        debug_assert!(len > 0);
        Self::span(start, start + len - 1)
    }

    /// Open-ended span from `start` to the end of the resource.
    pub fn from_offset(start: u64) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// The last `len` bytes of the resource, wherever it ends.
    pub fn suffix(len: u64) -> Self {
        Self {
            start: None,
            end: Some(len),
        }
    }

    pub fn start(&self) -> Option<u64> {
        self.start
    }

    pub fn is_suffix(&self) -> bool {
        self.start.is_none()
    }

    /// Encode as a `Range` header value.
    pub fn header_value(&self) -> String {
        match (self.start, self.end) {
            (Some(start), Some(end)) => format!("bytes={start}-{end}"),
            (Some(start), None) => format!("bytes={start}-"),
            (None, Some(len)) => format!("bytes=-{len}"),
            (None, None) => unreachable!("ByteRange with no bound"),
        }
    }
}

/// Bytes returned by a range fetch, plus the absolute position of
/// `bytes[0]` in the resource as declared by the server.
///
/// The offset comes from the response's `Content-Range`, not from the
/// request, so suffix fetches report where the tail actually starts.
#[derive(Debug, Clone)]
pub struct FetchedChunk {
    pub bytes: Vec<u8>,
    pub offset: u64,
}

/// Parse a `Content-Range` value of the strict shape
/// `bytes <start>-<end>/<total>`, yielding `(start, end, total)`.
pub(crate) fn parse_content_range(value: &str) -> Result<(u64, u64, u64)> {
    let rest = value
        .strip_prefix("bytes ")
        .ok_or(Error::MalformedRangeResponse)?;
    let (span, total) = rest.split_once('/').ok_or(Error::MalformedRangeResponse)?;
    let (start, end) = span.split_once('-').ok_or(Error::MalformedRangeResponse)?;

    let start: u64 = start.parse().map_err(|_| Error::MalformedRangeResponse)?;
    let end: u64 = end.parse().map_err(|_| Error::MalformedRangeResponse)?;
    let total: u64 = total.parse().map_err(|_| Error::MalformedRangeResponse)?;

    Ok((start, end, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_value_absolute() {
        assert_eq!(ByteRange::span(100, 200).header_value(), "bytes=100-200");
        assert_eq!(ByteRange::span_len(100, 101).header_value(), "bytes=100-200");
    }

    #[test]
    fn header_value_open_ended() {
        assert_eq!(ByteRange::from_offset(42).header_value(), "bytes=42-");
    }

    #[test]
    fn header_value_suffix() {
        assert_eq!(ByteRange::suffix(65557).header_value(), "bytes=-65557");
        assert!(ByteRange::suffix(65557).is_suffix());
    }

    #[test]
    fn parses_strict_content_range() {
        assert_eq!(
            parse_content_range("bytes 100-200/1000").unwrap(),
            (100, 200, 1000)
        );
        assert_eq!(
            parse_content_range("bytes 934443-1000000/1000000").unwrap(),
            (934443, 1000000, 1000000)
        );
    }

    #[test]
    fn rejects_malformed_content_range() {
        for value in [
            "invalid-format",
            "bytes */1000",
            "bytes 100-200",
            "bytes a-200/1000",
            "100-200/1000",
            "",
        ] {
            assert_eq!(
                parse_content_range(value).unwrap_err(),
                Error::MalformedRangeResponse,
                "value {value:?} should not parse"
            );
        }
    }
}
