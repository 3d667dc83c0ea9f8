mod concurrent_hashing;
mod leakage;
mod salt_entropy;
