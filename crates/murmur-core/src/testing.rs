//! In-memory engine double for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::engine::{ClientId, Engine};
use crate::error::EngineError;

#[derive(Debug)]
pub struct MockHandle {
    client: ClientId,
    counter: u64,
}

/// Engine whose sessions are a per-client counter. Every encrypt or decrypt
/// bumps the counter, so ciphertexts of equal plaintexts differ.
#[derive(Default)]
pub struct MockEngine {
    durable: RefCell<HashMap<ClientId, u64>>,
    opened: Cell<usize>,
    closed: Cell<usize>,
    saves: Cell<usize>,
    loads: Cell<usize>,
    fail_save: Cell<bool>,
    fail_delete: Cell<bool>,
    fail_load: Cell<bool>,
}

impl MockEngine {
    /// Ciphertext the mock refuses to decrypt.
    pub const GARBAGE: &'static [u8] = b"garbage";

    /// Prekey the mock refuses to accept.
    pub const STALE_PREKEY: &'static [u8] = b"stale";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, client: &ClientId, counter: u64) {
        self.durable.borrow_mut().insert(client.clone(), counter);
    }

    pub fn stored_counter(&self, client: &ClientId) -> Option<u64> {
        self.durable.borrow().get(client).copied()
    }

    pub fn opened(&self) -> usize {
        self.opened.get()
    }

    pub fn closed(&self) -> usize {
        self.closed.get()
    }

    pub fn saves(&self) -> usize {
        self.saves.get()
    }

    pub fn loads(&self) -> usize {
        self.loads.get()
    }

    pub fn fail_saves(&self) {
        self.fail_save.set(true);
    }

    pub fn fail_deletes(&self) {
        self.fail_delete.set(true);
    }

    pub fn fail_loads(&self) {
        self.fail_load.set(true);
    }

    fn open(&self, client: &ClientId, counter: u64) -> MockHandle {
        self.opened.set(self.opened.get() + 1);
        MockHandle {
            client: client.clone(),
            counter,
        }
    }
}

impl Engine for MockEngine {
    type Handle = MockHandle;

    fn init_from_prekey(&self, client: &ClientId, prekey: &[u8]) -> Result<MockHandle, EngineError> {
        if prekey == Self::STALE_PREKEY {
            return Err(EngineError::PrekeyNotFound);
        }
        Ok(self.open(client, 0))
    }

    fn init_from_message(
        &self,
        client: &ClientId,
        message: &[u8],
    ) -> Result<(MockHandle, Vec<u8>), EngineError> {
        let payload = message
            .strip_prefix(b"hello:")
            .ok_or(EngineError::InvalidMessage)?;
        Ok((self.open(client, 1), payload.to_vec()))
    }

    fn load(&self, client: &ClientId) -> Result<MockHandle, EngineError> {
        self.loads.set(self.loads.get() + 1);
        if self.fail_load.get() {
            return Err(EngineError::Storage("load refused".into()));
        }
        let counter = self
            .stored_counter(client)
            .ok_or(EngineError::SessionNotFound)?;
        Ok(self.open(client, counter))
    }

    fn save(&self, handle: &MockHandle) -> Result<(), EngineError> {
        if self.fail_save.get() {
            return Err(EngineError::Storage("save refused".into()));
        }
        self.saves.set(self.saves.get() + 1);
        self.seed(&handle.client, handle.counter);
        Ok(())
    }

    fn delete(&self, client: &ClientId) -> Result<(), EngineError> {
        if self.fail_delete.get() {
            return Err(EngineError::Storage("delete refused".into()));
        }
        self.durable.borrow_mut().remove(client);
        Ok(())
    }

    fn close(&self, _handle: MockHandle) {
        self.closed.set(self.closed.get() + 1);
    }

    fn encrypt(&self, handle: &mut MockHandle, plaintext: &[u8]) -> Result<Vec<u8>, EngineError> {
        handle.counter += 1;
        let mut out = format!("{}#{}:", handle.client, handle.counter).into_bytes();
        out.extend_from_slice(plaintext);
        Ok(out)
    }

    fn decrypt(&self, handle: &mut MockHandle, ciphertext: &[u8]) -> Result<Vec<u8>, EngineError> {
        if ciphertext == Self::GARBAGE {
            return Err(EngineError::InvalidMessage);
        }
        handle.counter += 1;
        Ok(ciphertext.to_vec())
    }

    fn local_fingerprint(&self) -> Vec<u8> {
        b"fp:local".to_vec()
    }

    fn remote_fingerprint(&self, handle: &MockHandle) -> Vec<u8> {
        format!("fp:{}", handle.client).into_bytes()
    }

    fn new_prekey(&self, id: u16) -> Result<Vec<u8>, EngineError> {
        let mut bundle = id.to_be_bytes().to_vec();
        bundle.extend_from_slice(b"prekey");
        Ok(bundle)
    }
}
