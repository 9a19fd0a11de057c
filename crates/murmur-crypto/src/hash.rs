//! BLAKE3 digests and key derivation.
//!
//! Plaintext digests key the encryption cache, keyed digests bind stream
//! headers to their key, and [`hkdf`] turns Diffie-Hellman output into
//! session chain keys.

/// A 32-byte BLAKE3 digest.
pub type HashOutput = [u8; 32];

/// Unkeyed digest of `data`.
#[must_use]
pub fn hash(data: &[u8]) -> HashOutput {
    *blake3::hash(data).as_bytes()
}

/// Keyed digest over the concatenation of `parts`.
#[must_use]
pub fn keyed_hash(key: &[u8; 32], parts: &[&[u8]]) -> HashOutput {
    let mut hasher = blake3::Hasher::new_keyed(key);
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Extract-then-expand derivation in the shape of RFC 5869 with BLAKE3 as
/// the PRF. Fills all of `output`.
///
/// An empty `salt` extracts with the unkeyed hash.
pub fn hkdf(salt: &[u8], ikm: &[u8], info: &[u8], output: &mut [u8]) {
    let prk = if salt.is_empty() {
        hash(ikm)
    } else {
        keyed_hash(&hash(salt), &[ikm])
    };

    let mut hasher = blake3::Hasher::new_keyed(&prk);
    hasher.update(info);
    hasher.finalize_xof().fill(output);
}
