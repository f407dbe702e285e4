mod bytes;

pub use bytes::{bytes_to_text, text_to_bytes};
