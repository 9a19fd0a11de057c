//! Error type shared by every primitive in this crate.

use thiserror::Error;

/// Failure of a cryptographic primitive.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Sealing failed
    #[error("encryption failed")]
    EncryptionFailed,

    /// Ciphertext did not authenticate
    #[error("decryption failed")]
    DecryptionFailed,

    /// Key material of the wrong size
    #[error("key must be {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required size
        expected: usize,
        /// Size supplied
        actual: usize,
    },

    /// Stream header is short or was made under another key
    #[error("invalid stream header")]
    InvalidHeader,

    /// Operation not allowed in the current stream state
    #[error("stream already finished")]
    InvalidState,

    /// Authenticated chunk carries a tag byte we do not know
    #[error("unknown chunk tag 0x{0:02X}")]
    UnknownTag(u8),

    /// The OS random source failed
    #[error("random number generation failed")]
    RandomFailed,

    /// Chunk counter exhausted
    #[error("stream chunk counter exhausted")]
    NonceOverflow,

    /// Key agreement produced an all-zero secret
    #[error("peer public key is a low-order point")]
    WeakPublicKey,
}
