//! Session directory and its generating context.
//!
//! A [`SessionContext`] owns the engine and hands out one valid
//! [`SessionDirectory`] at a time. The directory keeps a transient map of open
//! sessions for one unit of work and commits them when it goes out of scope.
//!
//! ## Lifecycle
//!
//! ```text
//! open_directory() ──► resolve / create / encrypt / decrypt ──► commit (Drop)
//!        │                                                    └─► discard
//!        └── a newer open_directory() invalidates this one
//! ```
//!
//! Using an invalidated directory is a programming error and panics. The
//! context is neither `Send` nor `Sync`, so a directory cannot leave the
//! thread that opened it.

use std::cell::Cell;
use std::collections::HashMap;
use std::ops::Range;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, warn};

use crate::engine::{ClientId, Engine, LAST_PREKEY_ID};
use crate::error::{EngineError, SessionError};
use crate::session::Session;

/// Owner of an engine and of the single currently valid directory.
pub struct SessionContext<E: Engine> {
    engine: E,
    current: Cell<Option<u64>>,
    next_generation: Cell<u64>,
}

impl<E: Engine> SessionContext<E> {
    /// Create a context around `engine`. No directory is open yet.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            current: Cell::new(None),
            next_generation: Cell::new(0),
        }
    }

    /// The underlying engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Consume the context, returning the engine.
    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Whether a directory is currently open.
    pub fn has_open_directory(&self) -> bool {
        self.current.get().is_some()
    }

    /// Open a new directory, invalidating any previously opened one.
    ///
    /// The directory commits its pending sessions when dropped.
    pub fn open_directory(&self) -> SessionDirectory<'_, E> {
        let generation = self.next_generation.get();
        self.next_generation.set(generation.wrapping_add(1));
        if let Some(previous) = self.current.replace(Some(generation)) {
            debug!(previous, generation, "superseding open session directory");
        }

        SessionDirectory {
            context: self,
            generation,
            local_fingerprint: self.engine.local_fingerprint(),
            sessions: HashMap::new(),
        }
    }

    /// Run `f` against a fresh directory and commit when it returns.
    pub fn with_directory<'a, R>(
        &'a self,
        f: impl FnOnce(&mut SessionDirectory<'a, E>) -> R,
    ) -> R {
        let mut directory = self.open_directory();
        f(&mut directory)
    }
}

/// Transient view of all sessions for one unit of work.
pub struct SessionDirectory<'a, E: Engine> {
    context: &'a SessionContext<E>,
    generation: u64,
    local_fingerprint: Vec<u8>,
    sessions: HashMap<ClientId, Session<'a, E>>,
}

impl<'a, E: Engine> SessionDirectory<'a, E> {
    /// Establish a session with `client` from a base64-encoded prekey bundle.
    ///
    /// Does nothing if a session with `client` already exists.
    ///
    /// # Errors
    ///
    /// - `InvalidEncoding` if `prekey` is not valid base64
    /// - `Crypto` if the engine rejects the prekey
    pub fn create_session(&mut self, client: &ClientId, prekey: &str) -> Result<(), SessionError> {
        self.validate();
        let prekey = BASE64.decode(prekey)?;

        if self.resolve(client).is_some() {
            debug!(client = %client, "session already exists");
            return Ok(());
        }

        let context = self.context;
        let engine = context.engine();
        let handle = engine
            .init_from_prekey(client, &prekey)
            .map_err(SessionError::Crypto)?;
        self.sessions
            .insert(client.clone(), Session::new(engine, client.clone(), handle, true));
        debug!(client = %client, "session created from prekey");
        Ok(())
    }

    /// Establish a session from an inbound prekey message and return its plaintext.
    ///
    /// Replaces any session with `client` held in this directory; the
    /// replaced one is closed without being saved.
    ///
    /// # Errors
    ///
    /// Returns `Crypto` if the engine rejects the message.
    pub fn create_session_from_message(
        &mut self,
        client: &ClientId,
        message: &[u8],
    ) -> Result<Vec<u8>, SessionError> {
        self.validate();

        let context = self.context;
        let engine = context.engine();
        let (handle, plaintext) = engine
            .init_from_message(client, message)
            .map_err(SessionError::Crypto)?;
        let session = Session::new(engine, client.clone(), handle, true);
        if self.sessions.insert(client.clone(), session).is_some() {
            debug!(client = %client, "replaced pending session");
        }
        debug!(client = %client, "session created from message");
        Ok(plaintext)
    }

    /// Permanently delete the session with `client`, pending changes included.
    ///
    /// # Panics
    ///
    /// Panics if the engine fails to delete the durable session.
    pub fn delete_session(&mut self, client: &ClientId) {
        self.validate();
        self.sessions.remove(client);

        if let Err(err) = self.context.engine().delete(client) {
            panic!("failed to delete session for {client}: {err}");
        }
        debug!(client = %client, "session deleted");
    }

    /// Encrypt `plaintext` for `recipient`.
    ///
    /// Returns `Ok(None)` if no session with `recipient` exists. A session
    /// that encrypted successfully is saved and closed right away, unlike
    /// [`decrypt`](Self::decrypt), so fanning one message out to many
    /// recipients does not accumulate open sessions.
    ///
    /// # Errors
    ///
    /// Returns `Crypto` if the engine fails to encrypt.
    pub fn encrypt(
        &mut self,
        plaintext: &[u8],
        recipient: &ClientId,
    ) -> Result<Option<Vec<u8>>, SessionError> {
        self.validate();
        let Some(session) = self.resolve(recipient) else {
            return Ok(None);
        };
        let ciphertext = session.encrypt(plaintext)?;

        if let Some(mut session) = self.sessions.remove(recipient) {
            session.save();
        }
        debug!(client = %recipient, "encrypted and evicted session");
        Ok(Some(ciphertext))
    }

    /// Decrypt `ciphertext` from `sender`.
    ///
    /// Returns `Ok(None)` if no session with `sender` exists. The session
    /// stays pending until [`commit`](Self::commit).
    ///
    /// # Errors
    ///
    /// Returns `Crypto` if the engine fails to decrypt.
    pub fn decrypt(
        &mut self,
        ciphertext: &[u8],
        sender: &ClientId,
    ) -> Result<Option<Vec<u8>>, SessionError> {
        self.validate();
        let Some(session) = self.resolve(sender) else {
            return Ok(None);
        };
        session.decrypt(ciphertext).map(Some)
    }

    /// Remote fingerprint of the session with `client`, if one exists.
    pub fn fingerprint(&mut self, client: &ClientId) -> Option<Vec<u8>> {
        self.validate();
        self.resolve(client)
            .map(|session| session.remote_fingerprint().to_vec())
    }

    /// Whether a session with `client` exists, pending or durable.
    pub fn has_session(&mut self, client: &ClientId) -> bool {
        self.validate();
        self.resolve(client).is_some()
    }

    /// Fingerprint of the local identity, read when the directory was opened.
    pub fn local_fingerprint(&self) -> &[u8] {
        self.validate();
        &self.local_fingerprint
    }

    /// Number of sessions currently held in memory.
    pub fn pending(&self) -> usize {
        self.validate();
        self.sessions.len()
    }

    /// Generate the prekey `id` and return its base64 bundle.
    ///
    /// An existing prekey with the same id is replaced.
    ///
    /// # Errors
    ///
    /// Returns `ReservedPrekeyId` for [`LAST_PREKEY_ID`]; use
    /// [`generate_last_prekey`](Self::generate_last_prekey) instead.
    ///
    /// # Panics
    ///
    /// Panics if the engine fails to store the prekey.
    pub fn generate_prekey(&self, id: u16) -> Result<String, SessionError> {
        self.validate();
        if id == LAST_PREKEY_ID {
            return Err(SessionError::ReservedPrekeyId(id));
        }
        Ok(self.new_prekey(id))
    }

    /// Generate the last-resort prekey and return its base64 bundle.
    ///
    /// # Panics
    ///
    /// Panics if the engine fails to store the prekey.
    pub fn generate_last_prekey(&self) -> String {
        self.validate();
        self.new_prekey(LAST_PREKEY_ID)
    }

    /// Generate one prekey per id in `ids`, in ascending id order.
    ///
    /// A `Range<u16>` never reaches [`LAST_PREKEY_ID`].
    ///
    /// # Panics
    ///
    /// Panics if the engine fails to store a prekey.
    pub fn generate_prekeys(&self, ids: Range<u16>) -> Vec<(u16, String)> {
        self.validate();
        ids.map(|id| (id, self.new_prekey(id))).collect()
    }

    /// Save every modified session, then close all of them.
    ///
    /// # Panics
    ///
    /// Panics if a session fails to save.
    pub fn commit(&mut self) {
        self.validate();
        self.commit_pending();
    }

    /// Close all pending sessions without saving them.
    pub fn discard(&mut self) {
        self.validate();
        let count = self.sessions.len();
        self.sessions.clear();
        debug!(count, "discarded pending sessions");
    }

    fn is_current(&self) -> bool {
        self.context.current.get() == Some(self.generation)
    }

    fn validate(&self) {
        if !self.is_current() {
            panic!(
                "session directory {} used outside its scope (current: {:?})",
                self.generation,
                self.context.current.get()
            );
        }
    }

    fn resolve(&mut self, client: &ClientId) -> Option<&mut Session<'a, E>> {
        if !self.sessions.contains_key(client) {
            let context = self.context;
            let engine = context.engine();
            match engine.load(client) {
                Ok(handle) => {
                    debug!(client = %client, "session loaded");
                    self.sessions
                        .insert(client.clone(), Session::new(engine, client.clone(), handle, false));
                }
                Err(EngineError::SessionNotFound) => return None,
                Err(err) => panic!("failed to load session for {client}: {err}"),
            }
        }
        self.sessions.get_mut(client)
    }

    fn new_prekey(&self, id: u16) -> String {
        match self.context.engine().new_prekey(id) {
            Ok(bundle) => {
                debug!(id, "prekey generated");
                BASE64.encode(bundle)
            }
            Err(err) => panic!("failed to generate prekey {id}: {err}"),
        }
    }

    fn commit_pending(&mut self) {
        let count = self.sessions.len();
        for (_, mut session) in self.sessions.drain() {
            session.save();
        }
        debug!(count, "committed pending sessions");
    }
}

impl<E: Engine> Drop for SessionDirectory<'_, E> {
    fn drop(&mut self) {
        if !self.is_current() {
            if !self.sessions.is_empty() {
                warn!(
                    generation = self.generation,
                    count = self.sessions.len(),
                    "superseded session directory dropped, discarding pending sessions"
                );
            }
            self.sessions.clear();
            return;
        }

        if std::thread::panicking() {
            self.sessions.clear();
        } else {
            self.commit_pending();
        }
        self.context.current.set(None);
    }
}
