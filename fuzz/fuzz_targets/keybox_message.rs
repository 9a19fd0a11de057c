//! Fuzz target for key box wire formats
//!
//! Prekey bundles and session messages arrive from peers; decoding must
//! never panic and anything accepted must re-encode to the same bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use murmur_core::keybox::{Message, PrekeyBundle};

fuzz_target!(|data: &[u8]| {
    if let Ok(bundle) = PrekeyBundle::decode(data) {
        assert_eq!(bundle.encode(), data);
    }

    if let Ok(message) = Message::decode(data) {
        assert_eq!(message.encode(), data);
    }
});
