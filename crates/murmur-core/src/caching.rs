//! Memoizing encryptor.
//!
//! [`CachingEncryptor`] remembers the ciphertext produced for a
//! `(recipient, plaintext)` pair and returns it again for identical requests
//! instead of asking the wrapped encryptor. With a ratcheting engine this
//! means repeated identical messages share one ciphertext (and one ratchet
//! step) for as long as the entry stays cached.

use murmur_crypto::hash::{HashOutput, hash};
use tracing::trace;

use crate::cache::BoundedCache;
use crate::config::CacheConfig;
use crate::directory::SessionDirectory;
use crate::engine::{ClientId, Engine};
use crate::error::SessionError;

/// Anything that can encrypt a message for a client.
pub trait Encryptor {
    /// Encrypt `plaintext` for `recipient`; `Ok(None)` if there is no session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if encryption fails.
    fn encrypt(
        &mut self,
        plaintext: &[u8],
        recipient: &ClientId,
    ) -> Result<Option<Vec<u8>>, SessionError>;
}

impl<T: Encryptor + ?Sized> Encryptor for &mut T {
    fn encrypt(
        &mut self,
        plaintext: &[u8],
        recipient: &ClientId,
    ) -> Result<Option<Vec<u8>>, SessionError> {
        (**self).encrypt(plaintext, recipient)
    }
}

/// An [`Encryptor`] whose sessions can be deleted.
pub trait SessionDelete: Encryptor {
    /// Permanently delete the session with `client`.
    fn delete_session(&mut self, client: &ClientId);
}

impl<T: SessionDelete + ?Sized> SessionDelete for &mut T {
    fn delete_session(&mut self, client: &ClientId) {
        (**self).delete_session(client);
    }
}

impl<E: Engine> Encryptor for SessionDirectory<'_, E> {
    fn encrypt(
        &mut self,
        plaintext: &[u8],
        recipient: &ClientId,
    ) -> Result<Option<Vec<u8>>, SessionError> {
        SessionDirectory::encrypt(self, plaintext, recipient)
    }
}

impl<E: Engine> SessionDelete for SessionDirectory<'_, E> {
    fn delete_session(&mut self, client: &ClientId) {
        SessionDirectory::delete_session(self, client);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    recipient: ClientId,
    digest: HashOutput,
}

/// Encryptor that memoizes results in a [`BoundedCache`].
pub struct CachingEncryptor<T> {
    inner: T,
    cache: BoundedCache<CacheKey, Vec<u8>>,
    entry_cost: usize,
}

impl<T: Encryptor> CachingEncryptor<T> {
    /// Wrap `inner` with a cache sized by `config`.
    pub fn new(inner: T, config: CacheConfig) -> Self {
        Self {
            inner,
            cache: BoundedCache::with_config(&config),
            entry_cost: config.entry_cost,
        }
    }

    /// The wrapped encryptor.
    ///
    /// Deleting a session through it bypasses the cache; use
    /// [`delete_session`](SessionDelete::delete_session) on the caching
    /// encryptor instead, or [`forget`](Self::forget) the recipient.
    pub fn inner(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Unwrap, dropping the cache.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Forget every cached ciphertext.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Forget every cached ciphertext for `recipient`.
    pub fn forget(&mut self, recipient: &ClientId) {
        let stale: Vec<CacheKey> = self
            .cache
            .keys()
            .filter(|key| &key.recipient == recipient)
            .cloned()
            .collect();
        for key in &stale {
            self.cache.remove(key);
        }
        trace!(client = %recipient, count = stale.len(), "forgot cached ciphertexts");
    }

    /// Number of cached ciphertexts.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl<T: Encryptor> Encryptor for CachingEncryptor<T> {
    fn encrypt(
        &mut self,
        plaintext: &[u8],
        recipient: &ClientId,
    ) -> Result<Option<Vec<u8>>, SessionError> {
        let key = CacheKey {
            recipient: recipient.clone(),
            digest: hash(plaintext),
        };
        if let Some(ciphertext) = self.cache.get(&key) {
            trace!(client = %recipient, "encryption cache hit");
            return Ok(Some(ciphertext.clone()));
        }

        let result = self.inner.encrypt(plaintext, recipient)?;
        if let Some(ciphertext) = &result {
            self.cache.set(key, ciphertext.clone(), self.entry_cost);
        }
        Ok(result)
    }
}

impl<T: SessionDelete> SessionDelete for CachingEncryptor<T> {
    fn delete_session(&mut self, client: &ClientId) {
        self.forget(client);
        self.inner.delete_session(client);
    }
}
