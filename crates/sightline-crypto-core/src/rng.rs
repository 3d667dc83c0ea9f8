//! Injectable secure random source.
//!
//! Production code uses [`OsRandom`], which reads from the operating
//! system CSPRNG on every call and holds no state. Tests may substitute a
//! deterministic implementation to pin salts.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::CryptoError;

/// A source of cryptographically secure random bytes.
///
/// Implementations must be safe to share across threads: a single
/// [`PasswordHasher`](crate::PasswordHasher) may serve concurrent callers.
pub trait SecureRandom: Send + Sync {
    /// Fill `dest` entirely with random bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::RandomSource`] if the source is unavailable.
    fn fill(&self, dest: &mut [u8]) -> Result<(), CryptoError>;
}

/// Operating system CSPRNG (`getrandom` under the hood).
#[derive(Clone, Copy, Debug, Default)]
pub struct OsRandom;

impl SecureRandom for OsRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<(), CryptoError> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| CryptoError::RandomSource(e.to_string()))
    }
}

impl<T: SecureRandom + ?Sized> SecureRandom for std::sync::Arc<T> {
    fn fill(&self, dest: &mut [u8]) -> Result<(), CryptoError> {
        (**self).fill(dest)
    }
}
