//! Reference session engine.
//!
//! `KeyBox` implements [`Engine`] on top of the `murmur-crypto` primitives
//! and a [`KeyStore`]. It gives the session layer real, stateful
//! cryptography: every encrypt advances a ratchet, so equal plaintexts never
//! produce equal ciphertexts.
//!
//! ## Key agreement
//!
//! The initiator combines its identity key `IK_a` and a fresh ephemeral key
//! `EK_a` with the responder's identity `IK_b` and prekey `PK_b`:
//!
//! ```text
//! DH1 = DH(IK_a, PK_b)   DH2 = DH(EK_a, IK_b)   DH3 = DH(EK_a, PK_b)
//! initiator_chain || responder_chain = HKDF(DH1 || DH2 || DH3)
//! ```
//!
//! Until the initiator receives a reply, each of its messages repeats the
//! prekey id, `EK_a` and `IK_a` so the responder can derive the same chains
//! from whichever message arrives first.

mod message;
mod state;
mod store;

use std::cell::Cell;

use murmur_crypto::aead::{AeadKey, Nonce};
use murmur_crypto::hash::hkdf;
use murmur_crypto::ratchet::MessageKey;
use murmur_crypto::x25519::{PublicKey, SecretKey, SharedSecret};
use tracing::{debug, info, trace};
use zeroize::Zeroizing;

use crate::engine::{ClientId, Engine, LAST_PREKEY_ID};
use crate::error::EngineError;

pub use message::{BUNDLE_SIZE, BUNDLE_VERSION, Message, PrekeyBundle, PrekeyHeader};
pub use state::MAX_SKIP;
use state::{Chain, PendingPrekey, SessionState};
pub use store::{FileStore, KeyStore, MemoryStore, Record};

const SESSION_INFO: &[u8] = b"murmur-keybox-session-v1";

/// An open key box session.
pub struct SessionHandle {
    client: ClientId,
    state: SessionState,
    consumed_prekey: Cell<Option<u16>>,
}

impl SessionHandle {
    fn new(client: &ClientId, state: SessionState) -> Self {
        Self {
            client: client.clone(),
            state,
            consumed_prekey: Cell::new(None),
        }
    }

    /// Client this session belongs to.
    pub fn client(&self) -> &ClientId {
        &self.client
    }

    /// Whether outgoing messages still carry the prekey header.
    pub fn is_pending(&self) -> bool {
        self.state.pending_prekey.is_some()
    }
}

/// Engine backed by X25519 key agreement and a symmetric ratchet.
pub struct KeyBox<S: KeyStore> {
    store: S,
    identity: SecretKey,
    identity_public: PublicKey,
}

impl<S: KeyStore> KeyBox<S> {
    /// Open the key box in `store`, creating an identity on first use.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the store fails and `Decode` if the stored
    /// identity is malformed.
    pub fn open(store: S) -> Result<Self, EngineError> {
        let identity = match store.load_identity()? {
            Some(secret) => secret_key(&secret)?,
            None => {
                let key = SecretKey::random();
                store.store_identity(key.to_bytes().as_slice())?;
                info!("generated new identity key");
                key
            }
        };
        let identity_public = identity.public();

        Ok(Self {
            store,
            identity,
            identity_public,
        })
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Public identity key.
    pub fn identity(&self) -> PublicKey {
        self.identity_public
    }

    /// Authenticate and open `message`, advancing the receive chain only on
    /// success.
    fn receive(state: &mut SessionState, message: &Message) -> Result<Vec<u8>, EngineError> {
        if let Some(prekey) = &message.prekey {
            if prekey.identity != state.remote_identity {
                return Err(EngineError::RemoteIdentityChanged);
            }
        }

        let (recv, key) = state.recv.seek(message.counter)?;
        let plaintext = open(&key, &message.header(), &message.ciphertext)?;
        state.recv = recv;
        state.pending_prekey = None;
        Ok(plaintext)
    }
}

impl<S: KeyStore> Engine for KeyBox<S> {
    type Handle = SessionHandle;

    fn init_from_prekey(
        &self,
        client: &ClientId,
        prekey: &[u8],
    ) -> Result<SessionHandle, EngineError> {
        let bundle = PrekeyBundle::decode(prekey)?;
        let their_identity = PublicKey::from_bytes(bundle.identity);
        let their_prekey = PublicKey::from_bytes(bundle.prekey);
        let ephemeral = SecretKey::random();

        let (initiator, responder) = derive_chains(&[
            agree(&self.identity, &their_prekey)?,
            agree(&ephemeral, &their_identity)?,
            agree(&ephemeral, &their_prekey)?,
        ]);

        debug!(client = %client, prekey_id = bundle.prekey_id, "session initiated from prekey");
        Ok(SessionHandle::new(
            client,
            SessionState {
                remote_identity: bundle.identity,
                send: Chain::new(initiator),
                recv: Chain::new(responder),
                pending_prekey: Some(PendingPrekey {
                    prekey_id: bundle.prekey_id,
                    ephemeral: ephemeral.public().to_bytes(),
                }),
            },
        ))
    }

    fn init_from_message(
        &self,
        client: &ClientId,
        message: &[u8],
    ) -> Result<(SessionHandle, Vec<u8>), EngineError> {
        let message = Message::decode(message)?;
        let header = message.prekey.clone().ok_or(EngineError::InvalidMessage)?;

        let secret = self
            .store
            .load_prekey(header.prekey_id)?
            .ok_or(EngineError::PrekeyNotFound)?;
        let prekey = secret_key(&secret)?;
        let their_identity = PublicKey::from_bytes(header.identity);
        let their_ephemeral = PublicKey::from_bytes(header.ephemeral);

        let (initiator, responder) = derive_chains(&[
            agree(&prekey, &their_identity)?,
            agree(&self.identity, &their_ephemeral)?,
            agree(&prekey, &their_ephemeral)?,
        ]);

        let mut handle = SessionHandle::new(
            client,
            SessionState {
                remote_identity: header.identity,
                send: Chain::new(responder),
                recv: Chain::new(initiator),
                pending_prekey: None,
            },
        );
        let plaintext = Self::receive(&mut handle.state, &message)?;

        if header.prekey_id != LAST_PREKEY_ID {
            handle.consumed_prekey.set(Some(header.prekey_id));
        }
        debug!(client = %client, prekey_id = header.prekey_id, "session accepted from message");
        Ok((handle, plaintext))
    }

    fn load(&self, client: &ClientId) -> Result<SessionHandle, EngineError> {
        let bytes = self
            .store
            .load_session(client)?
            .ok_or(EngineError::SessionNotFound)?;
        Ok(SessionHandle::new(client, SessionState::from_bytes(&bytes)?))
    }

    fn save(&self, handle: &SessionHandle) -> Result<(), EngineError> {
        let bytes = Zeroizing::new(handle.state.to_bytes()?);
        self.store.store_session(&handle.client, &bytes)?;

        if let Some(id) = handle.consumed_prekey.take() {
            self.store.delete_prekey(id)?;
            debug!(client = %handle.client, prekey_id = id, "consumed prekey removed");
        }
        Ok(())
    }

    fn delete(&self, client: &ClientId) -> Result<(), EngineError> {
        self.store.delete_session(client)
    }

    fn close(&self, handle: SessionHandle) {
        trace!(client = %handle.client, "closing key box session");
    }

    fn encrypt(
        &self,
        handle: &mut SessionHandle,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, EngineError> {
        let state = &mut handle.state;
        let (counter, key) = state.send.step();
        let prekey = state.pending_prekey.as_ref().map(|pending| PrekeyHeader {
            prekey_id: pending.prekey_id,
            ephemeral: pending.ephemeral,
            identity: self.identity_public.to_bytes(),
        });

        let mut message = Message {
            prekey,
            counter,
            ciphertext: Vec::new(),
        };
        message.ciphertext = seal(&key, &message.header(), plaintext)?;
        Ok(message.encode())
    }

    fn decrypt(
        &self,
        handle: &mut SessionHandle,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, EngineError> {
        let message = Message::decode(ciphertext)?;
        Self::receive(&mut handle.state, &message)
    }

    fn local_fingerprint(&self) -> Vec<u8> {
        hex::encode(self.identity_public.as_bytes()).into_bytes()
    }

    fn remote_fingerprint(&self, handle: &SessionHandle) -> Vec<u8> {
        hex::encode(handle.state.remote_identity).into_bytes()
    }

    fn new_prekey(&self, id: u16) -> Result<Vec<u8>, EngineError> {
        let key = SecretKey::random();
        self.store.store_prekey(id, key.to_bytes().as_slice())?;

        Ok(PrekeyBundle {
            prekey_id: id,
            prekey: key.public().to_bytes(),
            identity: self.identity_public.to_bytes(),
        }
        .encode())
    }
}

fn secret_key(record: &[u8]) -> Result<SecretKey, EngineError> {
    SecretKey::from_slice(record).map_err(|e| EngineError::Decode(format!("stored secret key: {e}")))
}

fn agree(ours: &SecretKey, theirs: &PublicKey) -> Result<SharedSecret, EngineError> {
    ours.agree(theirs).map_err(|_| EngineError::DegeneratedKey)
}

fn derive_chains(secrets: &[SharedSecret; 3]) -> ([u8; 32], [u8; 32]) {
    let mut ikm = Zeroizing::new([0u8; 96]);
    for (slot, secret) in ikm.chunks_exact_mut(32).zip(secrets) {
        slot.copy_from_slice(secret.as_bytes());
    }

    let mut okm = Zeroizing::new([0u8; 64]);
    hkdf(&[], ikm.as_slice(), SESSION_INFO, okm.as_mut_slice());

    let mut initiator = [0u8; 32];
    let mut responder = [0u8; 32];
    initiator.copy_from_slice(&okm[..32]);
    responder.copy_from_slice(&okm[32..]);
    (initiator, responder)
}

// Every message key seals exactly one message, so a fixed nonce is safe.
fn seal(key: &MessageKey, header: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, EngineError> {
    AeadKey::new(*key.as_bytes())
        .encrypt(&Nonce::from_bytes([0u8; 24]), plaintext, header)
        .map_err(|_| EngineError::InvalidMessage)
}

fn open(key: &MessageKey, header: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, EngineError> {
    AeadKey::new(*key.as_bytes())
        .decrypt(&Nonce::from_bytes([0u8; 24]), ciphertext, header)
        .map_err(|_| EngineError::InvalidMessage)
}
