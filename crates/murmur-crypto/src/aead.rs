//! `XChaCha20-Poly1305` sealing.
//!
//! Secret streams seal each chunk under a per-stream subkey with a counter
//! nonce; the key box seals each session message under a one-time message
//! key.

use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::CryptoError;
use crate::random::random_array;

/// Poly1305 tag appended to every sealed message.
pub const TAG_SIZE: usize = 16;

/// Extended nonce size.
pub const NONCE_SIZE: usize = 24;

/// Key size.
pub const KEY_SIZE: usize = 32;

/// A 24-byte extended nonce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Use `bytes` as the nonce.
    #[must_use]
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// `counter` little-endian in the first 8 bytes, `salt` in the rest.
    #[must_use]
    pub fn from_counter(counter: u64, salt: &[u8; 16]) -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        let (head, tail) = bytes.split_at_mut(8);
        head.copy_from_slice(&counter.to_le_bytes());
        tail.copy_from_slice(salt);
        Self(bytes)
    }

    /// Raw nonce bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// Symmetric key, wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AeadKey([u8; KEY_SIZE]);

impl AeadKey {
    /// Use `bytes` as the key.
    #[must_use]
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Key from a slice of exactly [`KEY_SIZE`] bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKeyLength` for any other length.
    pub fn from_slice(slice: &[u8]) -> Result<Self, CryptoError> {
        slice
            .try_into()
            .map(Self)
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: slice.len(),
            })
    }

    /// Fresh random key.
    ///
    /// # Errors
    ///
    /// Returns `RandomFailed` if the OS random source is unavailable.
    pub fn generate() -> Result<Self, CryptoError> {
        random_array().map(Self)
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Seal `plaintext`, authenticating `aad` alongside it. The output is
    /// [`TAG_SIZE`] bytes longer than the input.
    ///
    /// # Errors
    ///
    /// Returns `EncryptionFailed` if the cipher refuses the input.
    pub fn encrypt(&self, nonce: &Nonce, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.cipher()
            .encrypt(XNonce::from_slice(&nonce.0), Payload { msg: plaintext, aad })
            .map_err(|_| CryptoError::EncryptionFailed)
    }

    /// Open a sealed message produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns `DecryptionFailed` if the input is shorter than a tag or does
    /// not authenticate under this key, nonce and `aad`.
    pub fn decrypt(&self, nonce: &Nonce, sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() < TAG_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }
        self.cipher()
            .decrypt(XNonce::from_slice(&nonce.0), Payload { msg: sealed, aad })
            .map_err(|_| CryptoError::DecryptionFailed)
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new((&self.0).into())
    }
}
