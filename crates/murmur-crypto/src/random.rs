//! OS randomness.

use crate::CryptoError;

/// Fill `buf` from the operating system's random source.
///
/// # Errors
///
/// Returns [`CryptoError::RandomFailed`] if the source is unavailable.
pub fn fill_random(buf: &mut [u8]) -> Result<(), CryptoError> {
    getrandom::getrandom(buf).map_err(|_| CryptoError::RandomFailed)
}

/// `N` random bytes.
///
/// # Errors
///
/// Returns [`CryptoError::RandomFailed`] if the source is unavailable.
pub fn random_array<const N: usize>() -> Result<[u8; N], CryptoError> {
    let mut buf = [0u8; N];
    fill_random(&mut buf)?;
    Ok(buf)
}
