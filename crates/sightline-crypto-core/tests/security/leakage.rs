//! Plaintext must not appear in stored or logged representations.

use sightline_crypto_core::{HashEnvelope, PasswordHasher, PasswordHasherOptions};

const PASSWORD: &str = "CanaryPasswordValue";

#[test]
fn encoded_hash_does_not_contain_password() {
    let hasher = PasswordHasher::new(&PasswordHasherOptions { iteration_count: 10 });
    let hash = hasher.hash_password(PASSWORD).unwrap();
    assert!(!hash.contains(PASSWORD));

    let raw = data_encoding::BASE64.decode(hash.as_bytes()).unwrap();
    assert!(!raw
        .windows(PASSWORD.len())
        .any(|w| w == PASSWORD.as_bytes()));
}

#[test]
fn envelope_debug_hides_key_material() {
    let hasher = PasswordHasher::new(&PasswordHasherOptions { iteration_count: 10 });
    let envelope = HashEnvelope::decode(&hasher.hash_password(PASSWORD).unwrap()).unwrap();
    let debug = format!("{envelope:?}");
    assert!(debug.contains("***"));
    assert!(!debug.contains(PASSWORD));
}
