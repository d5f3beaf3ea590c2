use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const HASH_HEX_LEN: usize = 64;

pub struct HashUtils;

impl HashUtils {
    pub fn hash_data(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Recomputes the digest of `data` and compares it byte-for-byte with `expected_hash`.
    pub fn verify_data(data: &[u8], expected_hash: &str) -> bool {
        let actual_hash = Self::hash_data(data);
        actual_hash.as_bytes() == expected_hash.as_bytes()
    }

    /// Lowercase hex of the right length, i.e. something `hash_data` could have produced.
    pub fn is_well_formed(hash: &str) -> bool {
        hash.len() == HASH_HEX_LEN
            && hash
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }
}
