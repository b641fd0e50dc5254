use sha2::{Digest, Sha256};

/// Compute SHA-256 of an in-memory byte slice.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Encode a raw 32-byte hash as a lowercase hex string (64 chars).
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Stable identifier for image bytes that arrived without a file name.
/// Layout: `sha256:<first 12 hex chars>`
pub fn content_source_id(data: &[u8]) -> String {
    let hex = to_hex(&sha256_bytes(data));
    format!("sha256:{}", &hex[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_bytes_known_vector() {
        // SHA-256 of empty bytes is a known constant.
        let hex = to_hex(&sha256_bytes(b""));
        assert_eq!(
            hex,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn content_source_id_is_short_and_stable() {
        let id = content_source_id(b"invoice");
        assert_eq!(id.len(), "sha256:".len() + 12);
        assert_eq!(id, content_source_id(b"invoice"));
        assert_ne!(id, content_source_id(b"receipt"));
        assert_eq!(content_source_id(b""), "sha256:e3b0c44298fc");
    }
}
