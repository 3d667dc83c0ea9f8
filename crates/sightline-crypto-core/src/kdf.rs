//! PBKDF2 sub-key derivation and constant-time verification.
//!
//! This module provides:
//! - [`derive_sub_key`] — derive a sub-key from a password + salt with a chosen PRF
//! - `verify_sub_key` (crate-internal) — recompute and compare against a stored sub-key
//!
//! Both delegate to `ring::pbkdf2`. Verification uses `ring::pbkdf2::verify`,
//! which compares the recomputed output in constant time.

use std::num::NonZeroU32;

use ring::pbkdf2;

use crate::envelope::{MIN_SALT_LEN, MIN_SUB_KEY_LEN};
use crate::error::CryptoError;
use crate::prf::KeyDerivationPrf;

/// Derive `output_len` bytes from `password` and `salt` using PBKDF2.
///
/// Accepts any password, including empty. Password policy is enforced by
/// the identity layer before reaching this function.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if:
/// - The salt is shorter than 16 bytes
/// - `iterations` is zero
/// - `output_len` is shorter than 16 bytes
pub fn derive_sub_key(
    prf: KeyDerivationPrf,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Result<Vec<u8>, CryptoError> {
    if salt.len() < MIN_SALT_LEN {
        return Err(CryptoError::KeyDerivation(format!(
            "salt too short: {} bytes (minimum {MIN_SALT_LEN})",
            salt.len()
        )));
    }
    if output_len < MIN_SUB_KEY_LEN {
        return Err(CryptoError::KeyDerivation(format!(
            "sub-key too short: {output_len} bytes (minimum {MIN_SUB_KEY_LEN})"
        )));
    }
    let iterations = NonZeroU32::new(iterations)
        .ok_or_else(|| CryptoError::KeyDerivation("iteration count must be non-zero".into()))?;

    let mut out = vec![0u8; output_len];
    pbkdf2::derive(prf.algorithm(), iterations, salt, password, &mut out);
    Ok(out)
}

/// Recompute PBKDF2 over `password` and compare with `expected` in constant time.
///
/// Returns `false` on mismatch, on a zero iteration count, or on an empty
/// `expected` slice. Never panics on malformed parameters.
pub(crate) fn verify_sub_key(
    prf: KeyDerivationPrf,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    expected: &[u8],
) -> bool {
    let Some(iterations) = NonZeroU32::new(iterations) else {
        return false;
    };
    if expected.is_empty() {
        return false;
    }
    pbkdf2::verify(prf.algorithm(), iterations, salt, password, expected).is_ok()
}
