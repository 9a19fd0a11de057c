//! # Murmur Crypto
//!
//! Primitives underneath Murmur sessions and secret streams. Nothing here
//! knows about clients or sessions; `murmur-core` composes these into the
//! key box engine and the stream codec.
//!
//! | Module | Provides | Built on |
//! |--------|----------|----------|
//! | [`aead`] | per-message and per-chunk sealing | `XChaCha20-Poly1305` |
//! | [`hash`] | cache digests, header commitments, HKDF | BLAKE3 |
//! | [`ratchet`] | one-time message keys | BLAKE3 chain |
//! | [`x25519`] | identity, prekey and ephemeral agreement | X25519 |
//! | [`stream`] | `MORE`/`FINAL` tagged chunk sealing | all of the above |

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod aead;
pub mod constant_time;
pub mod error;
pub mod hash;
pub mod random;
pub mod ratchet;
pub mod stream;
pub mod x25519;

pub use error::CryptoError;
