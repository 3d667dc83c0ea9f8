//! Password hashing and verification over version 3 envelopes.
//!
//! New hashes always use [`CURRENT_PRF`] with a 128-bit salt and a 256-bit
//! sub-key. Verification accepts any well-formed version 3 envelope and
//! reports [`PasswordVerificationResult::SuccessRehashNeeded`] when the
//! stored parameters are weaker than the hasher's current ones.
//!
//! PBKDF2 is CPU-bound and synchronous. Async callers should run these
//! functions on a blocking worker.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::envelope::HashEnvelope;
use crate::error::CryptoError;
use crate::kdf;
use crate::prf::KeyDerivationPrf;
use crate::rng::{OsRandom, SecureRandom};

/// Iteration count used when none (or zero) is configured.
pub const DEFAULT_ITERATION_COUNT: u32 = 100_000;

/// Salt length for new hashes (128 bits).
pub const SALT_LEN: usize = 16;

/// Sub-key length for new hashes (256 bits).
pub const SUB_KEY_LEN: usize = 32;

/// PRF for new hashes.
pub const CURRENT_PRF: KeyDerivationPrf = KeyDerivationPrf::HmacSha512;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Hasher configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordHasherOptions {
    /// PBKDF2 iteration count for new hashes. Zero selects
    /// [`DEFAULT_ITERATION_COUNT`].
    #[serde(default = "default_iteration_count")]
    pub iteration_count: u32,
}

impl Default for PasswordHasherOptions {
    fn default() -> Self {
        Self {
            iteration_count: DEFAULT_ITERATION_COUNT,
        }
    }
}

const fn default_iteration_count() -> u32 {
    DEFAULT_ITERATION_COUNT
}

impl PasswordHasherOptions {
    /// Iteration count after applying the zero-means-default rule.
    #[must_use]
    pub const fn effective_iteration_count(&self) -> u32 {
        if self.iteration_count == 0 {
            DEFAULT_ITERATION_COUNT
        } else {
            self.iteration_count
        }
    }
}

/// Outcome of checking a password against a stored hash.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PasswordVerificationResult {
    /// Wrong password, or the stored hash is malformed.
    Failed,
    /// Password matches and the stored parameters are current.
    Success,
    /// Password matches but the stored hash should be regenerated.
    SuccessRehashNeeded,
}

impl PasswordVerificationResult {
    /// `true` for both success variants.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success | Self::SuccessRehashNeeded)
    }
}

/// PBKDF2 password hasher.
///
/// Stateless apart from its configuration and random source; safe to share
/// across threads when `R` is.
#[derive(Clone)]
pub struct PasswordHasher<R = OsRandom> {
    iteration_count: u32,
    rng: R,
}

impl<R> fmt::Debug for PasswordHasher<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("iteration_count", &self.iteration_count)
            .finish_non_exhaustive()
    }
}

impl PasswordHasher<OsRandom> {
    /// Create a hasher backed by the operating system CSPRNG.
    #[must_use]
    pub const fn new(options: &PasswordHasherOptions) -> Self {
        Self::with_rng(options, OsRandom)
    }
}

impl Default for PasswordHasher<OsRandom> {
    fn default() -> Self {
        Self::new(&PasswordHasherOptions::default())
    }
}

impl<R: SecureRandom> PasswordHasher<R> {
    /// Create a hasher with an explicit random source.
    #[must_use]
    pub const fn with_rng(options: &PasswordHasherOptions, rng: R) -> Self {
        Self {
            iteration_count: options.effective_iteration_count(),
            rng,
        }
    }

    /// Iteration count applied to new hashes.
    #[must_use]
    pub const fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    /// Hash `password` into a base64 version 3 envelope.
    ///
    /// Every call draws a fresh salt, so hashing the same password twice
    /// yields different strings.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::RandomSource`] if the salt cannot be generated.
    pub fn hash_password(&self, password: &str) -> Result<String, CryptoError> {
        let mut salt = vec![0u8; SALT_LEN];
        self.rng.fill(&mut salt)?;

        let sub_key = kdf::derive_sub_key(
            CURRENT_PRF,
            password.as_bytes(),
            &salt,
            self.iteration_count,
            SUB_KEY_LEN,
        )?;

        HashEnvelope::new(CURRENT_PRF, self.iteration_count, salt, sub_key)?.encode()
    }

    /// Check `provided_password` against `hashed_password`.
    ///
    /// Never errors: a hash that is not valid base64 or not a well-formed
    /// envelope yields [`PasswordVerificationResult::Failed`]. The sub-key
    /// comparison is constant-time.
    pub fn verify_hashed_password(
        &self,
        hashed_password: &str,
        provided_password: &str,
    ) -> PasswordVerificationResult {
        match HashEnvelope::decode(hashed_password) {
            Ok(envelope) => self.verify_envelope(&envelope, provided_password),
            Err(_) => PasswordVerificationResult::Failed,
        }
    }

    /// Check `provided_password` against an already decoded envelope.
    ///
    /// Lets callers that decode the stored hash themselves (to report a
    /// malformed one) skip a second decode.
    pub fn verify_envelope(
        &self,
        envelope: &HashEnvelope,
        provided_password: &str,
    ) -> PasswordVerificationResult {
        let matches = kdf::verify_sub_key(
            envelope.prf(),
            provided_password.as_bytes(),
            envelope.salt(),
            envelope.iteration_count(),
            envelope.sub_key(),
        );
        if !matches {
            return PasswordVerificationResult::Failed;
        }

        if envelope.iteration_count() < self.iteration_count || envelope.prf().is_legacy() {
            PasswordVerificationResult::SuccessRehashNeeded
        } else {
            PasswordVerificationResult::Success
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: PasswordHasherOptions = PasswordHasherOptions {
        iteration_count: 1_000,
    };

    struct FixedRandom(u8);

    impl SecureRandom for FixedRandom {
        fn fill(&self, dest: &mut [u8]) -> Result<(), CryptoError> {
            dest.fill(self.0);
            Ok(())
        }
    }

    struct BrokenRandom;

    impl SecureRandom for BrokenRandom {
        fn fill(&self, _dest: &mut [u8]) -> Result<(), CryptoError> {
            Err(CryptoError::RandomSource("entropy pool unavailable".into()))
        }
    }

    fn legacy_hash(prf: KeyDerivationPrf, password: &str, iterations: u32) -> String {
        let salt = vec![0x5A; SALT_LEN];
        let sub_key =
            kdf::derive_sub_key(prf, password.as_bytes(), &salt, iterations, SUB_KEY_LEN).unwrap();
        HashEnvelope::new(prf, iterations, salt, sub_key)
            .unwrap()
            .encode()
            .unwrap()
    }

    #[test]
    fn zero_iteration_count_selects_default() {
        let hasher = PasswordHasher::new(&PasswordHasherOptions { iteration_count: 0 });
        assert_eq!(hasher.iteration_count(), DEFAULT_ITERATION_COUNT);
    }

    #[test]
    fn default_hasher_uses_100k_iterations() {
        assert_eq!(PasswordHasher::default().iteration_count(), 100_000);
    }

    #[test]
    fn hash_then_verify_succeeds() {
        let hasher = PasswordHasher::new(&FAST);
        let hash = hasher.hash_password("correct horse").unwrap();
        assert_eq!(
            hasher.verify_hashed_password(&hash, "correct horse"),
            PasswordVerificationResult::Success
        );
    }

    #[test]
    fn wrong_password_fails() {
        let hasher = PasswordHasher::new(&FAST);
        let hash = hasher.hash_password("correct horse").unwrap();
        assert_eq!(
            hasher.verify_hashed_password(&hash, "battery staple"),
            PasswordVerificationResult::Failed
        );
    }

    #[test]
    fn decoded_envelope_verifies_like_encoded_hash() {
        let hasher = PasswordHasher::new(&FAST);
        let legacy = legacy_hash(KeyDerivationPrf::HmacSha256, "pw", 1_000);
        let envelope = HashEnvelope::decode(&legacy).unwrap();
        assert_eq!(
            hasher.verify_envelope(&envelope, "pw"),
            hasher.verify_hashed_password(&legacy, "pw")
        );
        assert_eq!(
            hasher.verify_envelope(&envelope, "pw"),
            PasswordVerificationResult::SuccessRehashNeeded
        );
        assert_eq!(
            hasher.verify_envelope(&envelope, "other"),
            PasswordVerificationResult::Failed
        );
    }

    #[test]
    fn empty_password_is_hashable() {
        let hasher = PasswordHasher::new(&FAST);
        let hash = hasher.hash_password("").unwrap();
        assert_eq!(
            hasher.verify_hashed_password(&hash, ""),
            PasswordVerificationResult::Success
        );
        assert_eq!(
            hasher.verify_hashed_password(&hash, " "),
            PasswordVerificationResult::Failed
        );
    }

    #[test]
    fn new_hash_uses_current_parameters() {
        let hasher = PasswordHasher::new(&FAST);
        let envelope = HashEnvelope::decode(&hasher.hash_password("pw").unwrap()).unwrap();
        assert_eq!(envelope.prf(), CURRENT_PRF);
        assert_eq!(envelope.iteration_count(), 1_000);
        assert_eq!(envelope.salt().len(), SALT_LEN);
        assert_eq!(envelope.sub_key().len(), SUB_KEY_LEN);
    }

    #[test]
    fn fixed_random_source_makes_hash_deterministic() {
        let a = PasswordHasher::with_rng(&FAST, FixedRandom(0x11));
        let b = PasswordHasher::with_rng(&FAST, FixedRandom(0x11));
        assert_eq!(a.hash_password("pw").unwrap(), b.hash_password("pw").unwrap());
    }

    #[test]
    fn random_source_failure_propagates() {
        let hasher = PasswordHasher::with_rng(&FAST, BrokenRandom);
        let err = hasher.hash_password("pw").unwrap_err();
        assert!(matches!(err, CryptoError::RandomSource(_)));
    }

    #[test]
    fn fewer_iterations_than_configured_requests_rehash() {
        let old = PasswordHasher::new(&PasswordHasherOptions {
            iteration_count: 500,
        });
        let hash = old.hash_password("pw").unwrap();
        let current = PasswordHasher::new(&FAST);
        assert_eq!(
            current.verify_hashed_password(&hash, "pw"),
            PasswordVerificationResult::SuccessRehashNeeded
        );
    }

    #[test]
    fn more_iterations_than_configured_is_plain_success() {
        let stronger = PasswordHasher::new(&PasswordHasherOptions {
            iteration_count: 2_000,
        });
        let hash = stronger.hash_password("pw").unwrap();
        assert_eq!(
            PasswordHasher::new(&FAST).verify_hashed_password(&hash, "pw"),
            PasswordVerificationResult::Success
        );
    }

    #[test]
    fn sha1_envelope_requests_rehash() {
        let hash = legacy_hash(KeyDerivationPrf::HmacSha1, "pw", 1_000);
        let hasher = PasswordHasher::new(&FAST);
        assert_eq!(
            hasher.verify_hashed_password(&hash, "pw"),
            PasswordVerificationResult::SuccessRehashNeeded
        );
        assert_eq!(
            hasher.verify_hashed_password(&hash, "px"),
            PasswordVerificationResult::Failed
        );
    }

    #[test]
    fn sha256_envelope_requests_rehash() {
        let hash = legacy_hash(KeyDerivationPrf::HmacSha256, "pw", 1_000);
        assert_eq!(
            PasswordHasher::new(&FAST).verify_hashed_password(&hash, "pw"),
            PasswordVerificationResult::SuccessRehashNeeded
        );
    }

    #[test]
    fn malformed_hashes_fail_without_panicking() {
        let hasher = PasswordHasher::new(&FAST);
        for garbage in ["", "AA==", "AQ==", "%%%", "AQAAAAIAAAPo", "////////"] {
            assert_eq!(
                hasher.verify_hashed_password(garbage, "pw"),
                PasswordVerificationResult::Failed,
                "input {garbage:?} must fail"
            );
        }
    }

    #[test]
    fn is_success_covers_both_success_variants() {
        assert!(PasswordVerificationResult::Success.is_success());
        assert!(PasswordVerificationResult::SuccessRehashNeeded.is_success());
        assert!(!PasswordVerificationResult::Failed.is_success());
    }

    #[test]
    fn options_serde_uses_camel_case_and_defaults() {
        let json = serde_json::to_string(&FAST).unwrap();
        assert_eq!(json, r#"{"iterationCount":1000}"#);
        let parsed: PasswordHasherOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, PasswordHasherOptions::default());
    }

    #[test]
    fn debug_does_not_expose_random_source() {
        let debug = format!("{:?}", PasswordHasher::new(&FAST));
        assert!(debug.contains("iteration_count: 1000"));
    }

    /// A shared hasher must be usable from many threads.
    #[allow(dead_code)]
    const fn assert_send_sync<T: Send + Sync>() {}

    #[allow(dead_code)]
    const _: () = assert_send_sync::<PasswordHasher>();
}
