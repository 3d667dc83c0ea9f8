//! `sightline-crypto-core` — Password hashing primitives for Sightline.
//!
//! Pure computation: zero I/O, zero async, zero storage. Persisting the
//! encoded hashes is the identity layer's job.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod rng;

pub mod prf;

pub mod kdf;

pub mod envelope;

pub mod hasher;

pub use envelope::{HashEnvelope, FORMAT_MARKER, HEADER_LEN, MIN_SALT_LEN, MIN_SUB_KEY_LEN};
pub use error::CryptoError;
pub use hasher::{
    PasswordHasher, PasswordHasherOptions, PasswordVerificationResult, CURRENT_PRF,
    DEFAULT_ITERATION_COUNT, SALT_LEN, SUB_KEY_LEN,
};
pub use kdf::derive_sub_key;
pub use prf::KeyDerivationPrf;
pub use rng::{OsRandom, SecureRandom};
