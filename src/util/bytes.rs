//! Byte sequence <-> text conversion.
//!
//! Values crossing the executor message boundary are copied, and fault
//! reasons travel as raw bytes. These helpers map each byte to the char with
//! the same code point (and back), so every value 0..=255 round-trips
//! exactly, printable or not.

/// Decode bytes into a string, one char per byte.
pub fn bytes_to_text(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode a string produced by [`bytes_to_text`] back into bytes.
///
/// Chars above U+00FF are truncated to their low byte.
pub fn text_to_bytes(text: &str) -> Vec<u8> {
    text.chars().map(|c| c as u8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_ascii() {
        assert_eq!(bytes_to_text(b"Hello"), "Hello");
        assert_eq!(text_to_bytes("Hello"), b"Hello");
    }

    #[test]
    fn empty_round_trip() {
        assert_eq!(bytes_to_text(&[]), "");
        assert!(text_to_bytes("").is_empty());
    }

    #[test]
    fn every_byte_value_round_trips() {
        let all: Vec<u8> = (0..=255u8).collect();
        let text = bytes_to_text(&all);
        assert_eq!(text_to_bytes(&text), all);
    }

    #[test]
    fn unprintable_bytes_round_trip() {
        let bytes = [0u8, 127, 255, 128, 1];
        assert_eq!(text_to_bytes(&bytes_to_text(&bytes)), bytes);
    }
}
