//! Persisted session state.

use murmur_crypto::ratchet::{ChainKey, MessageKey};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::EngineError;

/// Largest gap between the expected and a received counter.
pub const MAX_SKIP: u64 = 1000;

/// Prekey information the initiator repeats until the responder replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct PendingPrekey {
    pub prekey_id: u16,
    pub ephemeral: [u8; 32],
}

/// One direction of a session: a chain key and the next counter on it.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Chain {
    key: [u8; 32],
    counter: u64,
}

impl Chain {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key, counter: 0 }
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Step forward once, returning the counter used and its message key.
    pub fn step(&mut self) -> (u64, MessageKey) {
        let mut chain = ChainKey::from_bytes(self.key);
        let key = chain.ratchet();
        let counter = self.counter;
        self.key = *chain.as_bytes();
        self.counter += 1;
        (counter, key)
    }

    /// Message key for `counter` together with the chain as it would be
    /// after accepting it. `self` is left untouched.
    ///
    /// # Errors
    ///
    /// - `DuplicateMessage` for the counter accepted last
    /// - `OutdatedMessage` for anything older
    /// - `TooDistantFuture` if more than [`MAX_SKIP`] keys would be skipped
    pub fn seek(&self, counter: u64) -> Result<(Chain, MessageKey), EngineError> {
        if counter < self.counter {
            return Err(if counter + 1 == self.counter {
                EngineError::DuplicateMessage
            } else {
                EngineError::OutdatedMessage
            });
        }
        if counter - self.counter > MAX_SKIP {
            return Err(EngineError::TooDistantFuture);
        }

        let mut advanced = self.clone();
        for _ in self.counter..counter {
            advanced.step();
        }
        let (_, key) = advanced.step();
        Ok((advanced, key))
    }
}

/// Everything needed to resume a session, serialized with bincode.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SessionState {
    pub remote_identity: [u8; 32],
    pub send: Chain,
    pub recv: Chain,
    pub pending_prekey: Option<PendingPrekey>,
}

impl SessionState {
    pub fn to_bytes(&self) -> Result<Vec<u8>, EngineError> {
        bincode::serialize(self).map_err(|e| EngineError::Storage(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
        bincode::deserialize(bytes).map_err(|e| EngineError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_matches_sequential_steps() {
        let mut sender = Chain::new([4u8; 32]);
        let keys: Vec<[u8; 32]> = (0..5).map(|_| *sender.step().1.as_bytes()).collect();

        let receiver = Chain::new([4u8; 32]);
        let (advanced, key) = receiver.seek(3).unwrap();
        assert_eq!(key.as_bytes(), &keys[3]);
        assert_eq!(advanced.counter(), 4);
        assert_eq!(receiver.counter(), 0);

        let (_, key) = advanced.seek(4).unwrap();
        assert_eq!(key.as_bytes(), &keys[4]);
    }

    #[test]
    fn test_seek_rejects_old_and_far_counters() {
        let (chain, _) = Chain::new([1u8; 32]).seek(5).unwrap();

        assert!(chain.seek(6).is_ok());
        assert_eq!(chain.seek(5).err(), Some(EngineError::DuplicateMessage));
        assert_eq!(chain.seek(2).err(), Some(EngineError::OutdatedMessage));
        assert_eq!(
            chain.seek(6 + MAX_SKIP + 1).err(),
            Some(EngineError::TooDistantFuture)
        );
        assert!(chain.seek(6 + MAX_SKIP).is_ok());
    }

    #[test]
    fn test_state_serialization() {
        let state = SessionState {
            remote_identity: [9u8; 32],
            send: Chain::new([1u8; 32]),
            recv: Chain::new([2u8; 32]),
            pending_prekey: Some(PendingPrekey {
                prekey_id: 12,
                ephemeral: [3u8; 32],
            }),
        };
        let restored = SessionState::from_bytes(&state.to_bytes().unwrap()).unwrap();

        assert_eq!(restored.remote_identity, state.remote_identity);
        assert_eq!(restored.pending_prekey, state.pending_prekey);
        assert!(SessionState::from_bytes(&[1, 2, 3]).is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Receiving any increasing subset of counters yields the sender's keys
            #[test]
            fn seek_agrees_with_sender(
                seed in any::<[u8; 32]>(),
                gaps in prop::collection::vec(0u64..20, 1..20),
            ) {
                let mut sender = Chain::new(seed);
                let total: u64 = gaps.iter().map(|g| g + 1).sum();
                let keys: Vec<[u8; 32]> = (0..total).map(|_| *sender.step().1.as_bytes()).collect();

                let mut receiver = Chain::new(seed);
                let mut counter = 0u64;
                for gap in gaps {
                    counter += gap;
                    let (advanced, key) = receiver.seek(counter).unwrap();
                    prop_assert_eq!(key.as_bytes(), &keys[counter as usize]);
                    receiver = advanced;
                    counter += 1;
                }
                prop_assert_eq!(receiver.counter(), counter);
            }
        }
    }
}
