//! Core type aliases shared across the crate.

/// A SHA-256 digest: 32 raw bytes.
pub type Digest = [u8; 32];

/// Render a digest as lowercase hex for report output.
pub fn to_hex(digest: &Digest) -> String {
    hex::encode(digest)
}
