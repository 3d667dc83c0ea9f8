//! Concurrency/security stamps, lookup normalization, and clock helpers.

use rand::rngs::OsRng;
use rand::RngCore;

/// Generate a random stamp in UUID v4 text form.
///
/// Used for row ids, concurrency stamps, and security stamps.
#[must_use]
pub fn generate_stamp() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);

    // Set version (4) and variant (RFC 4122).
    bytes[6] = (bytes[6] & 0x0F) | 0x40;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;

    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Normalize a user name, email, or role name for case-insensitive lookup.
#[must_use]
pub fn normalize_key(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Current time as seconds since the Unix epoch.
#[must_use]
pub fn unix_now() -> i64 {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    i64::try_from(secs).unwrap_or(i64::MAX)
}
