//! A single per-client session.

use tracing::trace;

use crate::engine::{ClientId, Engine};
use crate::error::SessionError;

/// One open session with a remote client.
///
/// Owns exactly one engine handle, which is closed when the session is
/// dropped, whether or not it was saved. The remote fingerprint is read once
/// when the session is opened.
pub struct Session<'e, E: Engine> {
    engine: &'e E,
    client: ClientId,
    handle: Option<E::Handle>,
    remote_fingerprint: Vec<u8>,
    dirty: bool,
}

impl<'e, E: Engine> Session<'e, E> {
    /// Wrap a freshly opened handle.
    ///
    /// `dirty` should be `true` for newly established sessions and `false`
    /// for sessions loaded from storage.
    pub fn new(engine: &'e E, client: ClientId, handle: E::Handle, dirty: bool) -> Self {
        let remote_fingerprint = engine.remote_fingerprint(&handle);
        Self {
            engine,
            client,
            handle: Some(handle),
            remote_fingerprint,
            dirty,
        }
    }

    /// Client this session talks to.
    pub fn client(&self) -> &ClientId {
        &self.client
    }

    /// Fingerprint of the remote identity.
    pub fn remote_fingerprint(&self) -> &[u8] {
        &self.remote_fingerprint
    }

    /// Whether the session has state changes not yet saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Encrypt a message for the remote client.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Crypto` with the engine's error if encryption fails.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, SessionError> {
        let engine = self.engine;
        let ciphertext = engine
            .encrypt(self.handle_mut(), plaintext)
            .map_err(SessionError::Crypto)?;
        self.dirty = true;
        Ok(ciphertext)
    }

    /// Decrypt a message from the remote client.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Crypto` with the engine's error if decryption fails.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, SessionError> {
        let engine = self.engine;
        let plaintext = engine
            .decrypt(self.handle_mut(), ciphertext)
            .map_err(SessionError::Crypto)?;
        self.dirty = true;
        Ok(plaintext)
    }

    /// Persist the session if it changed since it was opened or last saved.
    ///
    /// # Panics
    ///
    /// Panics if the engine fails to persist the session. The transient and
    /// durable state would otherwise diverge.
    pub fn save(&mut self) {
        if !self.dirty {
            return;
        }
        let Some(handle) = self.handle.as_ref() else {
            return;
        };
        if let Err(err) = self.engine.save(handle) {
            panic!("failed to persist session for {}: {err}", self.client);
        }
        self.dirty = false;
        trace!(client = %self.client, "session saved");
    }

    fn handle_mut(&mut self) -> &mut E::Handle {
        // Only `Drop` takes the handle.
        self.handle
            .as_mut()
            .unwrap_or_else(|| unreachable!("session handle used after close"))
    }
}

impl<E: Engine> Drop for Session<'_, E> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.engine.close(handle);
            trace!(client = %self.client, "session closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::testing::MockEngine;

    fn open<'a>(engine: &'a MockEngine, client: &str) -> Session<'a, MockEngine> {
        let id = ClientId::from(client);
        let handle = engine.init_from_prekey(&id, b"prekey").unwrap();
        Session::new(engine, id, handle, true)
    }

    #[test]
    fn test_remote_fingerprint_captured_at_open() {
        let engine = MockEngine::new();
        let session = open(&engine, "alice");
        assert_eq!(session.remote_fingerprint(), b"fp:alice");
        assert_eq!(session.client().as_str(), "alice");
    }

    #[test]
    fn test_mutation_marks_dirty_and_save_clears() {
        let engine = MockEngine::new();
        let id = ClientId::from("bob");
        engine.seed(&id, 0);
        let mut session = Session::new(&engine, id.clone(), engine.load(&id).unwrap(), false);
        assert!(!session.is_dirty());

        session.save();
        assert_eq!(engine.saves(), 0);

        session.encrypt(b"hi").unwrap();
        assert!(session.is_dirty());
        session.save();
        assert!(!session.is_dirty());
        assert_eq!(engine.saves(), 1);
        assert_eq!(engine.stored_counter(&id), Some(1));

        session.save();
        assert_eq!(engine.saves(), 1);
    }

    #[test]
    fn test_engine_failure_carries_code_and_keeps_clean() {
        let engine = MockEngine::new();
        let id = ClientId::from("carol");
        engine.seed(&id, 0);
        let mut session = Session::new(&engine, id.clone(), engine.load(&id).unwrap(), false);

        let err = session.decrypt(MockEngine::GARBAGE).unwrap_err();
        assert!(matches!(err, SessionError::Crypto(EngineError::InvalidMessage)));
        assert_eq!(err.engine_code(), Some(6));
        assert!(!session.is_dirty());
    }

    #[test]
    fn test_drop_closes_exactly_once() {
        let engine = MockEngine::new();
        {
            let mut session = open(&engine, "dave");
            session.save();
        }
        {
            let _unsaved = open(&engine, "erin");
        }
        assert_eq!(engine.opened(), 2);
        assert_eq!(engine.closed(), 2);
    }

    #[test]
    #[should_panic(expected = "failed to persist session")]
    fn test_save_failure_is_fatal() {
        let engine = MockEngine::new();
        let mut session = open(&engine, "frank");
        engine.fail_saves();
        session.save();
    }
}
