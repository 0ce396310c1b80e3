use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Content digest of an input image; the recognition cache key.
///
/// Computed from the bytes only, so the same picture uploaded under two
/// different paths maps to the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageDigest(pub [u8; 32]);

impl ImageDigest {
    pub fn of_bytes(data: &[u8]) -> Self {
        ImageDigest(sha256_bytes(data))
    }

    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    /// Namespaced key used by cache backends. `engines` names the engine
    /// set, so a result is only reused by a pipeline with the same engines.
    pub fn cache_key(&self, engines: &str) -> String {
        format!("ocr:{}:{engines}", self.to_hex())
    }
}

impl fmt::Display for ImageDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Lowercase hex (64 chars).
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_bytes_known_vector() {
        let hex = to_hex(&sha256_bytes(b""));
        assert_eq!(
            hex,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn digest_depends_on_content_only() {
        assert_eq!(ImageDigest::of_bytes(b"card"), ImageDigest::of_bytes(b"card"));
        assert_ne!(ImageDigest::of_bytes(b"card"), ImageDigest::of_bytes(b"cart"));
    }

    #[test]
    fn cache_key_is_namespaced_hex() {
        let digest = ImageDigest::of_bytes(b"x");
        let key = digest.cache_key("tesseract+transcript");
        assert_eq!(key, format!("ocr:{}:tesseract+transcript", digest.to_hex()));
        assert_ne!(key, digest.cache_key("tesseract"));
    }
}
