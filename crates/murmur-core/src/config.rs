//! Configuration for caches and streams.

use serde::{Deserialize, Serialize};

/// Default total cost a [`BoundedCache`](crate::BoundedCache) may hold.
pub const DEFAULT_MAX_COST: usize = 1024;

/// Default number of entries a [`BoundedCache`](crate::BoundedCache) may hold.
pub const DEFAULT_MAX_ELEMENTS: usize = 1024;

/// Default plaintext bytes per stream chunk (64 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Limits for a bounded cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum sum of entry costs.
    #[serde(default = "default_max_cost")]
    pub max_cost: usize,

    /// Maximum number of entries.
    #[serde(default = "default_max_elements")]
    pub max_elements: usize,

    /// Cost charged per memoized ciphertext by the caching encryptor.
    #[serde(default = "default_entry_cost")]
    pub entry_cost: usize,
}

fn default_max_cost() -> usize {
    DEFAULT_MAX_COST
}

fn default_max_elements() -> usize {
    DEFAULT_MAX_ELEMENTS
}

fn default_entry_cost() -> usize {
    1
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cost: DEFAULT_MAX_COST,
            max_elements: DEFAULT_MAX_ELEMENTS,
            entry_cost: 1,
        }
    }
}

impl CacheConfig {
    /// Set the maximum total cost.
    #[must_use]
    pub fn with_max_cost(mut self, max_cost: usize) -> Self {
        self.max_cost = max_cost;
        self
    }

    /// Set the maximum number of entries.
    #[must_use]
    pub fn with_max_elements(mut self, max_elements: usize) -> Self {
        self.max_elements = max_elements;
        self
    }

    /// Set the cost charged per entry.
    #[must_use]
    pub fn with_entry_cost(mut self, entry_cost: usize) -> Self {
        self.entry_cost = entry_cost;
        self
    }
}

/// Streaming encryption parameters.
///
/// Both ends of a stream must agree on `buffer_size`; the decrypting side
/// reads chunks of `buffer_size + ABYTES` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Plaintext bytes sealed per chunk. Must be non-zero.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}
