//! A single hasher instance shared across threads.

use std::sync::Arc;
use std::thread;

use sightline_crypto_core::{
    PasswordHasher, PasswordHasherOptions, PasswordVerificationResult, SecureRandom,
};

const THREADS: usize = 8;

#[test]
fn shared_hasher_is_safe_across_threads() {
    let hasher = Arc::new(PasswordHasher::new(&PasswordHasherOptions {
        iteration_count: 200,
    }));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let hasher = Arc::clone(&hasher);
            thread::spawn(move || {
                let password = format!("thread-{i}-password");
                let hash = hasher.hash_password(&password).unwrap();
                (password, hash)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for (i, (password, hash)) in results.iter().enumerate() {
        assert_eq!(
            hasher.verify_hashed_password(hash, password),
            PasswordVerificationResult::Success
        );
        for (j, (_, other)) in results.iter().enumerate() {
            if i != j {
                assert_ne!(hash, other);
            }
        }
    }
}

#[test]
fn shared_dyn_random_source_is_usable() {
    let rng: Arc<dyn SecureRandom> = Arc::new(sightline_crypto_core::OsRandom);
    let hasher = PasswordHasher::with_rng(&PasswordHasherOptions { iteration_count: 50 }, rng);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let hash = hasher.hash_password("scoped").unwrap();
                assert!(hasher.verify_hashed_password(&hash, "scoped").is_success());
            });
        }
    });
}
