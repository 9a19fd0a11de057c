//! Session engine capability interface.
//!
//! The engine owns every cryptographic and persistence detail of a session:
//! key agreement, ratcheting, per-message sealing, and durable storage. The
//! session layer only moves opaque handles in and out of it.

use std::fmt;

use crate::error::EngineError;

/// Prekey id reserved for the last-resort prekey, which is never consumed.
pub const LAST_PREKEY_ID: u16 = u16::MAX;

/// Identifier of a remote client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(String);

impl ClientId {
    /// Wrap a client identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Capabilities the session layer consumes from a cryptographic engine.
///
/// All calls are synchronous and may block on storage. A `Handle` is an
/// owned session resource; it is released exactly once through
/// [`close`](Engine::close), which takes it by value.
pub trait Engine {
    /// Opaque per-client session resource.
    type Handle;

    /// Establish a session from a peer's decoded prekey bundle.
    fn init_from_prekey(&self, client: &ClientId, prekey: &[u8])
    -> Result<Self::Handle, EngineError>;

    /// Establish a session from an inbound prekey message, returning the
    /// session and the message plaintext.
    fn init_from_message(
        &self,
        client: &ClientId,
        message: &[u8],
    ) -> Result<(Self::Handle, Vec<u8>), EngineError>;

    /// Load a persisted session. Fails with [`EngineError::SessionNotFound`]
    /// if none exists.
    fn load(&self, client: &ClientId) -> Result<Self::Handle, EngineError>;

    /// Persist a session.
    fn save(&self, handle: &Self::Handle) -> Result<(), EngineError>;

    /// Permanently delete any persisted session for `client`.
    fn delete(&self, client: &ClientId) -> Result<(), EngineError>;

    /// Release a session handle.
    fn close(&self, handle: Self::Handle);

    /// Encrypt one message, advancing session state.
    fn encrypt(&self, handle: &mut Self::Handle, plaintext: &[u8])
    -> Result<Vec<u8>, EngineError>;

    /// Decrypt one message, advancing session state.
    fn decrypt(&self, handle: &mut Self::Handle, ciphertext: &[u8])
    -> Result<Vec<u8>, EngineError>;

    /// Fingerprint of the local identity.
    fn local_fingerprint(&self) -> Vec<u8>;

    /// Fingerprint of the peer identity bound to `handle`.
    fn remote_fingerprint(&self, handle: &Self::Handle) -> Vec<u8>;

    /// Create (or replace) the prekey with `id`, returning its public bundle.
    fn new_prekey(&self, id: u16) -> Result<Vec<u8>, EngineError>;
}
