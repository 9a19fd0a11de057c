//! Error types for the Murmur session layer.

use thiserror::Error;

/// Failures reported by a session engine.
///
/// Every variant maps to a stable numeric [`code`](EngineError::code) so the
/// caller can react to specific engine conditions (for example, fetching a
/// fresh prekey after `PrekeyNotFound`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Durable storage failed
    #[error("storage error: {0}")]
    Storage(String),

    /// No session exists for the requested client
    #[error("session not found")]
    SessionNotFound,

    /// Input bytes could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// The peer's identity differs from the one bound to the session
    #[error("remote identity changed")]
    RemoteIdentityChanged,

    /// Message failed authentication or is structurally invalid
    #[error("invalid message")]
    InvalidMessage,

    /// Message counter was already consumed
    #[error("duplicate message")]
    DuplicateMessage,

    /// Message counter is too far ahead of the receive chain
    #[error("message too far in the future")]
    TooDistantFuture,

    /// Message is older than the receive window
    #[error("outdated message")]
    OutdatedMessage,

    /// Referenced prekey does not exist
    #[error("prekey not found")]
    PrekeyNotFound,

    /// Key agreement produced a degenerate (low-order) shared secret
    #[error("degenerated key")]
    DegeneratedKey,
}

impl EngineError {
    /// Stable numeric code for this failure.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::Storage(_) => 1,
            Self::SessionNotFound => 2,
            Self::Decode(_) => 3,
            Self::RemoteIdentityChanged => 4,
            Self::InvalidMessage => 6,
            Self::DuplicateMessage => 7,
            Self::TooDistantFuture => 8,
            Self::OutdatedMessage => 9,
            Self::PrekeyNotFound => 14,
            Self::DegeneratedKey => 17,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Recoverable session-directory errors.
///
/// Not-found conditions are reported as `Ok(None)`, and persistence
/// failures abort, so neither appears here.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Prekey material is not valid base64
    #[error("invalid prekey encoding: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    /// The engine rejected a create/encrypt/decrypt request
    #[error("crypto failure (code {}): {}", .0.code(), .0)]
    Crypto(EngineError),

    /// Prekey id reserved for the last-resort prekey
    #[error("prekey id {0} is reserved for the last prekey")]
    ReservedPrekeyId(u16),
}

impl SessionError {
    /// Engine error code, if this failure came from the engine.
    #[must_use]
    pub fn engine_code(&self) -> Option<u16> {
        match self {
            Self::Crypto(err) => Some(err.code()),
            _ => None,
        }
    }
}

/// Streaming encryption errors.
///
/// Stream input is untrusted, so every failure is returned to the caller.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Header has the wrong length or does not match the key
    #[error("malformed stream header")]
    MalformedHeader,

    /// A chunk failed to open, or the stream ended without a final chunk
    #[error("stream decryption failed")]
    DecryptionFailed,

    /// Sealing a chunk failed
    #[error("stream encryption failed: {0}")]
    EncryptionFailed(murmur_crypto::CryptoError),

    /// Reading from the input failed
    #[error("read error: {0}")]
    ReadError(#[source] std::io::Error),

    /// Writing to the output failed
    #[error("write error: {0}")]
    WriteError(#[source] std::io::Error),
}
