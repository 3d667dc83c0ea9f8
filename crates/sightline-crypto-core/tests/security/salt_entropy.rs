//! Salt quality checks for the default CSPRNG-backed hasher.

use std::collections::HashSet;

use sightline_crypto_core::{HashEnvelope, PasswordHasher, PasswordHasherOptions};

const HASH_COUNT: usize = 256;

/// Shannon entropy of a byte slice (bits per byte).
#[allow(clippy::cast_precision_loss)]
fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut freq = [0u64; 256];
    for &b in data {
        freq[b as usize] += 1;
    }
    let len = data.len() as f64;
    freq.iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum()
}

fn collect_salts() -> Vec<Vec<u8>> {
    let hasher = PasswordHasher::new(&PasswordHasherOptions { iteration_count: 1 });
    (0..HASH_COUNT)
        .map(|_| {
            let hash = hasher.hash_password("same password").unwrap();
            HashEnvelope::decode(&hash).unwrap().salt().to_vec()
        })
        .collect()
}

#[test]
fn salts_never_repeat() {
    let salts = collect_salts();
    let unique: HashSet<_> = salts.iter().collect();
    assert_eq!(unique.len(), HASH_COUNT);
}

#[test]
fn concatenated_salts_have_high_entropy() {
    // 4 KB of salt material; uniform bytes measure ~7.95 bits/byte.
    let all: Vec<u8> = collect_salts().concat();
    let entropy = shannon_entropy(&all);
    assert!(entropy > 7.5, "salt entropy too low: {entropy:.3} bits/byte");
}
