//! Shared fixtures for Murmur integration tests.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use murmur_core::{ClientId, KeyBox, KeyStore, MemoryStore, SessionContext};

/// Session context over an in-memory key box.
pub type MemoryContext = SessionContext<KeyBox<MemoryStore>>;

/// A fresh in-memory party.
pub fn memory_context() -> MemoryContext {
    SessionContext::new(KeyBox::open(MemoryStore::new()).expect("memory store never fails"))
}

/// Establish a session between two parties.
///
/// `initiator` fetches a prekey from `responder`, creates its session and
/// sends `greeting`; `responder` accepts it. Both sides commit. Returns the
/// plaintext the responder recovered.
pub fn introduce<A: KeyStore, B: KeyStore>(
    initiator: &SessionContext<KeyBox<A>>,
    initiator_id: &ClientId,
    responder: &SessionContext<KeyBox<B>>,
    responder_id: &ClientId,
    prekey_id: u16,
    greeting: &[u8],
) -> Vec<u8> {
    let bundle = responder.with_directory(|dir| dir.generate_prekey(prekey_id).unwrap());

    let first = initiator.with_directory(|dir| {
        dir.create_session(responder_id, &bundle).unwrap();
        dir.encrypt(greeting, responder_id).unwrap().unwrap()
    });

    responder.with_directory(|dir| dir.create_session_from_message(initiator_id, &first).unwrap())
}

/// Send one message from `sender` to `recipient` and return what arrived.
pub fn relay<A: KeyStore, B: KeyStore>(
    sender: &SessionContext<KeyBox<A>>,
    sender_id: &ClientId,
    recipient: &SessionContext<KeyBox<B>>,
    recipient_id: &ClientId,
    message: &[u8],
) -> Option<Vec<u8>> {
    let ciphertext = sender.with_directory(|dir| dir.encrypt(message, recipient_id).unwrap())?;
    recipient.with_directory(|dir| dir.decrypt(&ciphertext, sender_id).unwrap())
}

/// Deterministic test payload.
pub fn sample(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

/// Base64 helper matching the prekey encoding.
pub fn b64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}
