//! Fuzz test for configuration parsing
//!
//! Arbitrary TOML must not panic when parsed as stream or cache settings.

#![no_main]

use libfuzzer_sys::fuzz_target;
use murmur_core::{CacheConfig, StreamConfig};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _: Result<toml::Value, _> = toml::from_str(s);
        let _: Result<StreamConfig, _> = toml::from_str(s);
        let _: Result<CacheConfig, _> = toml::from_str(s);
    }
});
