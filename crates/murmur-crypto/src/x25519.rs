//! X25519 key agreement.
//!
//! Identity keys, prekeys and per-session ephemeral keys are all plain
//! X25519 keys; what differs is only how long they live.

use rand_core::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::CryptoError;

/// Size of secret and public keys.
pub const KEY_SIZE: usize = 32;

/// Secret half of an X25519 key pair.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(x25519_dalek::StaticSecret);

/// Public half of an X25519 key pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey(x25519_dalek::PublicKey);

/// Output of one Diffie-Hellman agreement. Never use it directly as a key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret(x25519_dalek::SharedSecret);

impl SecretKey {
    /// Fresh key from the OS random source.
    #[must_use]
    pub fn random() -> Self {
        Self(x25519_dalek::StaticSecret::random_from_rng(OsRng))
    }

    /// Restore a persisted key. Clamping happens at agreement time.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(x25519_dalek::StaticSecret::from(bytes))
    }

    /// Restore a persisted key from a slice.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKeyLength` unless `bytes` is [`KEY_SIZE`] long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Raw key bytes for persistence, wiped when dropped.
    #[must_use]
    pub fn to_bytes(&self) -> Zeroizing<[u8; KEY_SIZE]> {
        Zeroizing::new(self.0.to_bytes())
    }

    /// Matching public key.
    #[must_use]
    pub fn public(&self) -> PublicKey {
        PublicKey(x25519_dalek::PublicKey::from(&self.0))
    }

    /// Agree on a shared secret with `theirs`.
    ///
    /// # Errors
    ///
    /// Returns `WeakPublicKey` when `theirs` is a low-order point and the
    /// result would not depend on our secret.
    pub fn agree(&self, theirs: &PublicKey) -> Result<SharedSecret, CryptoError> {
        let shared = self.0.diffie_hellman(&theirs.0);
        if !shared.was_contributory() {
            return Err(CryptoError::WeakPublicKey);
        }
        Ok(SharedSecret(shared))
    }
}

impl PublicKey {
    /// Wrap raw public key bytes. Any 32 bytes are accepted here; weak
    /// points are caught by [`SecretKey::agree`].
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(x25519_dalek::PublicKey::from(bytes))
    }

    /// Raw bytes, copied.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Raw bytes, borrowed.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        self.0.as_bytes()
    }
}

impl SharedSecret {
    /// Raw secret, to be fed through a KDF.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        self.0.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_sides_agree() {
        let ours = SecretKey::random();
        let theirs = SecretKey::random();

        let a = ours.agree(&theirs.public()).unwrap();
        let b = theirs.agree(&ours.public()).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_low_order_point_rejected() {
        let ours = SecretKey::random();
        assert_eq!(
            ours.agree(&PublicKey::from_bytes([0u8; KEY_SIZE])).err(),
            Some(CryptoError::WeakPublicKey)
        );
    }

    #[test]
    fn test_persisted_key_restores_public() {
        let key = SecretKey::random();
        let restored = SecretKey::from_slice(key.to_bytes().as_slice()).unwrap();
        assert_eq!(key.public(), restored.public());

        assert_eq!(
            SecretKey::from_slice(&[1u8; 31]).err(),
            Some(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: 31
            })
        );
    }
}
