//! Durable storage backends for the key box.
//!
//! A store keeps three kinds of records as opaque bytes: the local identity,
//! prekey secrets by id, and serialized session state by client.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::trace;
use zeroize::Zeroizing;

use crate::engine::ClientId;
use crate::error::EngineError;

/// Secret bytes read back from a store.
pub type Record = Zeroizing<Vec<u8>>;

/// Storage for identity, prekeys and sessions.
///
/// Deleting a missing record is not an error.
pub trait KeyStore {
    /// Load the identity secret, if one was stored.
    fn load_identity(&self) -> Result<Option<Record>, EngineError>;

    /// Store the identity secret.
    fn store_identity(&self, secret: &[u8]) -> Result<(), EngineError>;

    /// Load a prekey secret.
    fn load_prekey(&self, id: u16) -> Result<Option<Record>, EngineError>;

    /// Store a prekey secret, replacing any with the same id.
    fn store_prekey(&self, id: u16, secret: &[u8]) -> Result<(), EngineError>;

    /// Remove a prekey secret.
    fn delete_prekey(&self, id: u16) -> Result<(), EngineError>;

    /// Load serialized session state.
    fn load_session(&self, client: &ClientId) -> Result<Option<Record>, EngineError>;

    /// Store serialized session state.
    fn store_session(&self, client: &ClientId, state: &[u8]) -> Result<(), EngineError>;

    /// Remove a session.
    fn delete_session(&self, client: &ClientId) -> Result<(), EngineError>;
}

/// In-process store, lost when dropped.
#[derive(Default)]
pub struct MemoryStore {
    identity: RefCell<Option<Record>>,
    prekeys: RefCell<HashMap<u16, Record>>,
    sessions: RefCell<HashMap<ClientId, Record>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored prekeys.
    pub fn prekey_count(&self) -> usize {
        self.prekeys.borrow().len()
    }

    /// Number of stored sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.borrow().len()
    }
}

impl KeyStore for MemoryStore {
    fn load_identity(&self) -> Result<Option<Record>, EngineError> {
        Ok(self.identity.borrow().clone())
    }

    fn store_identity(&self, secret: &[u8]) -> Result<(), EngineError> {
        *self.identity.borrow_mut() = Some(Zeroizing::new(secret.to_vec()));
        Ok(())
    }

    fn load_prekey(&self, id: u16) -> Result<Option<Record>, EngineError> {
        Ok(self.prekeys.borrow().get(&id).cloned())
    }

    fn store_prekey(&self, id: u16, secret: &[u8]) -> Result<(), EngineError> {
        self.prekeys
            .borrow_mut()
            .insert(id, Zeroizing::new(secret.to_vec()));
        Ok(())
    }

    fn delete_prekey(&self, id: u16) -> Result<(), EngineError> {
        self.prekeys.borrow_mut().remove(&id);
        Ok(())
    }

    fn load_session(&self, client: &ClientId) -> Result<Option<Record>, EngineError> {
        Ok(self.sessions.borrow().get(client).cloned())
    }

    fn store_session(&self, client: &ClientId, state: &[u8]) -> Result<(), EngineError> {
        self.sessions
            .borrow_mut()
            .insert(client.clone(), Zeroizing::new(state.to_vec()));
        Ok(())
    }

    fn delete_session(&self, client: &ClientId) -> Result<(), EngineError> {
        self.sessions.borrow_mut().remove(client);
        Ok(())
    }
}

/// Directory-backed store.
///
/// ```text
/// <root>/identity
/// <root>/prekeys/<id>
/// <root>/sessions/<hex(client id)>
/// ```
///
/// Records are written to a temporary file and renamed into place.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Storage` if the directories cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let root = root.into();
        fs::create_dir_all(root.join("prekeys"))?;
        fs::create_dir_all(root.join("sessions"))?;
        Ok(Self { root })
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn identity_path(&self) -> PathBuf {
        self.root.join("identity")
    }

    fn prekey_path(&self, id: u16) -> PathBuf {
        self.root.join("prekeys").join(id.to_string())
    }

    fn session_path(&self, client: &ClientId) -> PathBuf {
        self.root
            .join("sessions")
            .join(hex::encode(client.as_str().as_bytes()))
    }

    fn read(path: &Path) -> Result<Option<Record>, EngineError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(Zeroizing::new(bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(path: &Path, bytes: &[u8]) -> Result<(), EngineError> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        trace!(path = %path.display(), "record written");
        Ok(())
    }

    fn remove(path: &Path) -> Result<(), EngineError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl KeyStore for FileStore {
    fn load_identity(&self) -> Result<Option<Record>, EngineError> {
        Self::read(&self.identity_path())
    }

    fn store_identity(&self, secret: &[u8]) -> Result<(), EngineError> {
        Self::write(&self.identity_path(), secret)
    }

    fn load_prekey(&self, id: u16) -> Result<Option<Record>, EngineError> {
        Self::read(&self.prekey_path(id))
    }

    fn store_prekey(&self, id: u16, secret: &[u8]) -> Result<(), EngineError> {
        Self::write(&self.prekey_path(id), secret)
    }

    fn delete_prekey(&self, id: u16) -> Result<(), EngineError> {
        Self::remove(&self.prekey_path(id))
    }

    fn load_session(&self, client: &ClientId) -> Result<Option<Record>, EngineError> {
        Self::read(&self.session_path(client))
    }

    fn store_session(&self, client: &ClientId, state: &[u8]) -> Result<(), EngineError> {
        Self::write(&self.session_path(client), state)
    }

    fn delete_session(&self, client: &ClientId) -> Result<(), EngineError> {
        Self::remove(&self.session_path(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &impl KeyStore) {
        let alice = ClientId::from("alice@example.org");

        assert!(store.load_identity().unwrap().is_none());
        store.store_identity(b"identity").unwrap();
        assert_eq!(store.load_identity().unwrap().unwrap().as_slice(), b"identity");

        store.store_prekey(3, b"one").unwrap();
        store.store_prekey(3, b"two").unwrap();
        assert_eq!(store.load_prekey(3).unwrap().unwrap().as_slice(), b"two");
        store.delete_prekey(3).unwrap();
        store.delete_prekey(3).unwrap();
        assert!(store.load_prekey(3).unwrap().is_none());

        assert!(store.load_session(&alice).unwrap().is_none());
        store.store_session(&alice, b"state").unwrap();
        assert_eq!(store.load_session(&alice).unwrap().unwrap().as_slice(), b"state");
        store.delete_session(&alice).unwrap();
        store.delete_session(&alice).unwrap();
        assert!(store.load_session(&alice).unwrap().is_none());
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("keys")).unwrap();
        exercise(&store);

        store
            .store_session(&ClientId::from("../escape"), b"x")
            .unwrap();
        let names: Vec<_> = fs::read_dir(store.root().join("sessions"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![hex::encode("../escape")]);
    }
}
