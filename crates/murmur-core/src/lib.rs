//! # Murmur Core
//!
//! Session lifecycle and caching layer for Murmur.
//!
//! This crate provides:
//! - Session directories with commit-on-drop and strict single-owner access
//! - RAII session handles over a pluggable [`Engine`]
//! - Insertion-ordered bounded caches with cost and count limits
//! - A memoizing encryptor keyed by recipient and plaintext digest
//! - Chunked streaming encryption over `Read`/`Write`
//! - `keybox`, a reference engine with memory and file key stores
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  CachingEncryptor (optional)                     │
//! │        (BoundedCache keyed by recipient + plaintext hash)       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │              SessionContext ──► SessionDirectory                 │
//! │     (one valid directory at a time, pending sessions map)      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                          Session                                 │
//! │          (one engine handle, dirty flag, closed once)           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                   Engine (KeyBox + KeyStore)                     │
//! └─────────────────────────────────────────────────────────────────┘
//!
//!   StreamCodec ──► StreamCipher (SecretStream)      independent
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cache;
pub mod caching;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod keybox;
pub mod session;
pub mod stream;

#[cfg(test)]
mod testing;

pub use cache::{BoundedCache, CacheEntry};
pub use caching::{CachingEncryptor, Encryptor, SessionDelete};
pub use config::{CacheConfig, StreamConfig};
pub use directory::{SessionContext, SessionDirectory};
pub use engine::{ClientId, Engine, LAST_PREKEY_ID};
pub use error::{EngineError, SessionError, StreamError};
pub use keybox::{FileStore, KeyBox, KeyStore, MemoryStore};
pub use session::Session;
pub use stream::StreamCodec;
