//! Cryptographic error types for `sightline-crypto-core`.

use thiserror::Error;

/// Errors produced by password hashing operations.
///
/// Verification never surfaces these: a stored hash that fails to parse is
/// reported as [`PasswordVerificationResult::Failed`](crate::PasswordVerificationResult::Failed).
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The secure random source could not produce bytes.
    #[error("random source failure: {0}")]
    RandomSource(String),

    /// PBKDF2 parameter validation failed (salt, iterations, output length).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Stored hash is not a well-formed version 3 envelope.
    #[error("malformed password hash: {0}")]
    MalformedHash(String),
}
