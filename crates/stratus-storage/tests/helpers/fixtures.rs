//! Test fixtures: payloads of known size and content.

/// JSON document uploaded by the string tests.
pub const JSON_PAYLOAD: &str = r#"{"foo":"bar"}"#;

/// `count` bytes cycling through 0..=255.
pub fn patterned_bytes(count: usize) -> Vec<u8> {
    (0..count).map(|i| (i % 256) as u8).collect()
}
