//! Wire formats for prekey bundles and session messages.
//!
//! ## Prekey bundle
//!
//! ```text
//! [version=1: 1][prekey id: 2 BE][prekey public: 32][identity public: 32]
//! ```
//!
//! ## Messages
//!
//! ```text
//! prekey message: [kind=1][prekey id: 2 BE][ephemeral: 32][identity: 32][counter: 8 BE][ciphertext]
//! message:        [kind=2][counter: 8 BE][ciphertext]
//! ```
//!
//! Everything before the ciphertext is authenticated as associated data.

use murmur_crypto::aead::TAG_SIZE;

use crate::error::EngineError;

/// Current prekey bundle version.
pub const BUNDLE_VERSION: u8 = 1;

/// Encoded prekey bundle length.
pub const BUNDLE_SIZE: usize = 1 + 2 + 32 + 32;

const KIND_PREKEY: u8 = 1;
const KIND_MESSAGE: u8 = 2;

const PREKEY_HEADER_SIZE: usize = 1 + 2 + 32 + 32 + 8;
const MESSAGE_HEADER_SIZE: usize = 1 + 8;

/// Public half of a prekey, as published to peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrekeyBundle {
    /// Prekey id.
    pub prekey_id: u16,
    /// Prekey public key.
    pub prekey: [u8; 32],
    /// Identity public key of the publisher.
    pub identity: [u8; 32],
}

impl PrekeyBundle {
    /// Encode to wire format.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BUNDLE_SIZE);
        out.push(BUNDLE_VERSION);
        out.extend_from_slice(&self.prekey_id.to_be_bytes());
        out.extend_from_slice(&self.prekey);
        out.extend_from_slice(&self.identity);
        out
    }

    /// Decode from wire format.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Decode` on a wrong length or unknown version.
    pub fn decode(bytes: &[u8]) -> Result<Self, EngineError> {
        if bytes.len() != BUNDLE_SIZE {
            return Err(EngineError::Decode(format!(
                "prekey bundle is {} bytes, expected {BUNDLE_SIZE}",
                bytes.len()
            )));
        }
        if bytes[0] != BUNDLE_VERSION {
            return Err(EngineError::Decode(format!(
                "unsupported prekey bundle version {}",
                bytes[0]
            )));
        }

        Ok(Self {
            prekey_id: u16::from_be_bytes([bytes[1], bytes[2]]),
            prekey: array32(&bytes[3..35]),
            identity: array32(&bytes[35..67]),
        })
    }
}

/// First messages of an initiator, carrying what the responder needs to
/// establish the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrekeyHeader {
    /// Prekey the initiator used.
    pub prekey_id: u16,
    /// Initiator's ephemeral public key.
    pub ephemeral: [u8; 32],
    /// Initiator's identity public key.
    pub identity: [u8; 32],
}

/// A decoded session message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Present until the initiator has heard back from the responder.
    pub prekey: Option<PrekeyHeader>,
    /// Position in the sender's chain.
    pub counter: u64,
    /// Sealed payload.
    pub ciphertext: Vec<u8>,
}

impl Message {
    /// Serialized header, used as associated data.
    #[must_use]
    pub fn header(&self) -> Vec<u8> {
        let mut out;
        match &self.prekey {
            Some(prekey) => {
                out = Vec::with_capacity(PREKEY_HEADER_SIZE);
                out.push(KIND_PREKEY);
                out.extend_from_slice(&prekey.prekey_id.to_be_bytes());
                out.extend_from_slice(&prekey.ephemeral);
                out.extend_from_slice(&prekey.identity);
            }
            None => {
                out = Vec::with_capacity(MESSAGE_HEADER_SIZE);
                out.push(KIND_MESSAGE);
            }
        }
        out.extend_from_slice(&self.counter.to_be_bytes());
        out
    }

    /// Encode to wire format.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.header();
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Decode from wire format.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Decode` on truncated input or an unknown kind.
    pub fn decode(bytes: &[u8]) -> Result<Self, EngineError> {
        let (&kind, _) = bytes
            .split_first()
            .ok_or_else(|| EngineError::Decode("empty message".into()))?;

        let header_size = match kind {
            KIND_PREKEY => PREKEY_HEADER_SIZE,
            KIND_MESSAGE => MESSAGE_HEADER_SIZE,
            other => return Err(EngineError::Decode(format!("unknown message kind {other}"))),
        };
        if bytes.len() < header_size + TAG_SIZE {
            return Err(EngineError::Decode(format!(
                "message is {} bytes, need at least {}",
                bytes.len(),
                header_size + TAG_SIZE
            )));
        }

        let prekey = (kind == KIND_PREKEY).then(|| PrekeyHeader {
            prekey_id: u16::from_be_bytes([bytes[1], bytes[2]]),
            ephemeral: array32(&bytes[3..35]),
            identity: array32(&bytes[35..67]),
        });
        let mut counter = [0u8; 8];
        counter.copy_from_slice(&bytes[header_size - 8..header_size]);

        Ok(Self {
            prekey,
            counter: u64::from_be_bytes(counter),
            ciphertext: bytes[header_size..].to_vec(),
        })
    }
}

fn array32(slice: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(slice);
    out
}
