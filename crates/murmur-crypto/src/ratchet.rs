//! Symmetric chain-key ratchet.
//!
//! ```text
//! chain[n+1]   = BLAKE3(chain[n] || 0x01)
//! message[n]   = BLAKE3(chain[n] || 0x02)
//! ```
//!
//! Stepping overwrites the chain key, so a captured chain cannot recompute
//! keys for messages already sent or received.

use zeroize::{Zeroize, ZeroizeOnDrop};

const CHAIN_STEP: u8 = 0x01;
const MESSAGE_STEP: u8 = 0x02;

/// Current position of one sending or receiving chain.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ChainKey([u8; 32]);

impl ChainKey {
    /// Resume a chain from persisted bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw chain key, for persisting session state.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive the message key for the current position and advance.
    pub fn ratchet(&mut self) -> MessageKey {
        let message = derive(&self.0, MESSAGE_STEP);
        self.0 = derive(&self.0, CHAIN_STEP);
        MessageKey(message)
    }
}

fn derive(chain: &[u8; 32], step: u8) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(chain);
    hasher.update(&[step]);
    *hasher.finalize().as_bytes()
}

/// One-time key for a single message.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MessageKey([u8; 32]);

impl MessageKey {
    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}
