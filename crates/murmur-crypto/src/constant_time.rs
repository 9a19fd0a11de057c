//! Constant-time comparison.

use subtle::ConstantTimeEq;

/// Compare two byte strings without an early exit on the first difference.
///
/// Only the lengths leak.
#[must_use]
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}
