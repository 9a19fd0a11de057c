//! Chunked secret streams.
//!
//! A secret stream seals an unbounded sequence of chunks under one key. The
//! sender produces a fixed-size header once, then seals each chunk with a tag
//! saying whether more chunks follow. The receiver initializes from the same
//! key and header and opens chunks strictly in order.
//!
//! ## Wire Format
//!
//! ```text
//! header  = random (24B) || commitment (16B)
//! chunk_i = XChaCha20-Poly1305(subkey, nonce(i), tag_byte || plaintext_i)
//! ```
//!
//! The commitment is a keyed BLAKE3 of the random part, so a header paired
//! with the wrong key is rejected before any chunk is opened. Chunk nonces
//! are derived from a running counter; reordered, replayed, or dropped
//! chunks fail authentication.

use crate::aead::{AeadKey, KEY_SIZE, Nonce, TAG_SIZE};
use crate::constant_time::ct_eq;
use crate::hash::keyed_hash;
use crate::random::random_array;
use crate::CryptoError;
use zeroize::ZeroizeOnDrop;

/// Domain separator for the header commitment.
const COMMIT_CONTEXT: &[u8] = b"murmur-stream-commit-v1";

/// Domain separator for the per-stream subkey.
const SUBKEY_CONTEXT: &[u8] = b"murmur-stream-subkey-v1";

const RANDOM_SIZE: usize = 24;
const COMMITMENT_SIZE: usize = 16;

const TAG_BYTE_MORE: u8 = 0x00;
const TAG_BYTE_FINAL: u8 = 0x03;

/// Tag carried by every sealed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTag {
    /// More chunks follow.
    More,
    /// Last chunk of the stream.
    Final,
}

impl StreamTag {
    fn to_byte(self) -> u8 {
        match self {
            Self::More => TAG_BYTE_MORE,
            Self::Final => TAG_BYTE_FINAL,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            TAG_BYTE_MORE => Some(Self::More),
            TAG_BYTE_FINAL => Some(Self::Final),
            _ => None,
        }
    }
}

/// Push/pull primitive for chunked authenticated encryption.
///
/// Implementations own all cryptographic detail; callers only see a header,
/// opaque chunks, and per-chunk tags.
pub trait StreamCipher {
    /// Stream key type.
    type Key;
    /// Sender state.
    type PushState;
    /// Receiver state.
    type PullState;

    /// Exact header length in bytes.
    const HEADER_SIZE: usize;
    /// Ciphertext bytes added to every chunk.
    const ABYTES: usize;

    /// Generate a fresh random key.
    fn generate_key() -> Result<Self::Key, CryptoError>;

    /// Start a stream, returning the sender state and the header to transmit first.
    fn init_push(key: &Self::Key) -> Result<(Self::PushState, Vec<u8>), CryptoError>;

    /// Seal one chunk.
    fn push(
        state: &mut Self::PushState,
        plaintext: &[u8],
        tag: StreamTag,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Validate a header against the key and set up the receiver.
    fn init_pull(key: &Self::Key, header: &[u8]) -> Result<Self::PullState, CryptoError>;

    /// Open one chunk, returning its plaintext and tag.
    fn pull(
        state: &mut Self::PullState,
        ciphertext: &[u8],
    ) -> Result<(Vec<u8>, StreamTag), CryptoError>;
}

/// 32-byte secret stream key.
#[derive(Clone, ZeroizeOnDrop)]
pub struct StreamKey(AeadKey);

impl StreamKey {
    /// Key size in bytes.
    pub const SIZE: usize = KEY_SIZE;

    /// Create a key from raw bytes.
    #[must_use]
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(AeadKey::new(bytes))
    }

    /// Create from slice.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyLength` if slice length is not 32 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, CryptoError> {
        AeadKey::from_slice(slice).map(Self)
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        self.0.as_bytes()
    }
}

/// Per-direction chunk sealing state.
#[derive(ZeroizeOnDrop)]
pub struct ChunkState {
    subkey: AeadKey,
    #[zeroize(skip)]
    nonce_salt: [u8; 16],
    #[zeroize(skip)]
    counter: u64,
    #[zeroize(skip)]
    finished: bool,
}

impl ChunkState {
    fn new(key: &StreamKey, random: &[u8; RANDOM_SIZE]) -> Self {
        let subkey = keyed_hash(key.as_bytes(), &[SUBKEY_CONTEXT, random]);
        let mut nonce_salt = [0u8; 16];
        nonce_salt.copy_from_slice(&random[8..]);

        Self {
            subkey: AeadKey::new(subkey),
            nonce_salt,
            counter: 0,
            finished: false,
        }
    }

    fn next_nonce(&self) -> Result<Nonce, CryptoError> {
        if self.finished {
            return Err(CryptoError::InvalidState);
        }
        if self.counter == u64::MAX {
            return Err(CryptoError::NonceOverflow);
        }
        Ok(Nonce::from_counter(self.counter, &self.nonce_salt))
    }

    /// Number of chunks processed so far.
    #[must_use]
    pub fn chunks(&self) -> u64 {
        self.counter
    }
}

fn commitment(key: &StreamKey, random: &[u8]) -> [u8; COMMITMENT_SIZE] {
    let full = keyed_hash(key.as_bytes(), &[COMMIT_CONTEXT, random]);
    let mut out = [0u8; COMMITMENT_SIZE];
    out.copy_from_slice(&full[..COMMITMENT_SIZE]);
    out
}

/// `XChaCha20-Poly1305` secret stream with a key-committing header.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretStream;

impl StreamCipher for SecretStream {
    type Key = StreamKey;
    type PushState = ChunkState;
    type PullState = ChunkState;

    const HEADER_SIZE: usize = RANDOM_SIZE + COMMITMENT_SIZE;
    const ABYTES: usize = 1 + TAG_SIZE;

    fn generate_key() -> Result<StreamKey, CryptoError> {
        AeadKey::generate().map(StreamKey)
    }

    fn init_push(key: &StreamKey) -> Result<(ChunkState, Vec<u8>), CryptoError> {
        let random: [u8; RANDOM_SIZE] = random_array()?;

        let mut header = Vec::with_capacity(Self::HEADER_SIZE);
        header.extend_from_slice(&random);
        header.extend_from_slice(&commitment(key, &random));

        Ok((ChunkState::new(key, &random), header))
    }

    fn push(
        state: &mut ChunkState,
        plaintext: &[u8],
        tag: StreamTag,
    ) -> Result<Vec<u8>, CryptoError> {
        let nonce = state.next_nonce()?;

        let mut framed = Vec::with_capacity(1 + plaintext.len());
        framed.push(tag.to_byte());
        framed.extend_from_slice(plaintext);

        let sealed = state.subkey.encrypt(&nonce, &framed, &[])?;
        state.counter += 1;
        state.finished = tag == StreamTag::Final;
        Ok(sealed)
    }

    fn init_pull(key: &StreamKey, header: &[u8]) -> Result<ChunkState, CryptoError> {
        if header.len() != Self::HEADER_SIZE {
            return Err(CryptoError::InvalidHeader);
        }

        let (random, received) = header.split_at(RANDOM_SIZE);
        if !ct_eq(&commitment(key, random), received) {
            return Err(CryptoError::InvalidHeader);
        }

        let mut random_bytes = [0u8; RANDOM_SIZE];
        random_bytes.copy_from_slice(random);
        Ok(ChunkState::new(key, &random_bytes))
    }

    fn pull(
        state: &mut ChunkState,
        ciphertext: &[u8],
    ) -> Result<(Vec<u8>, StreamTag), CryptoError> {
        if ciphertext.len() < Self::ABYTES {
            return Err(CryptoError::DecryptionFailed);
        }
        let nonce = state.next_nonce()?;

        let mut framed = state.subkey.decrypt(&nonce, ciphertext, &[])?;
        let tag = StreamTag::from_byte(framed[0]).ok_or(CryptoError::UnknownTag(framed[0]))?;
        framed.remove(0);

        state.counter += 1;
        state.finished = tag == StreamTag::Final;
        Ok((framed, tag))
    }
}
