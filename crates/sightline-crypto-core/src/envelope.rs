//! Version 3 password hash envelope — fixed header, salt, sub-key.
//!
//! # Layout
//!
//! ```text
//! Marker (1 B) | PRF (u32 BE) | Iterations (u32 BE) | Salt Len (u32 BE) | Salt | Sub-key
//! ```
//!
//! - **Marker**: `0x01` — identifies the version 3 scheme
//! - **PRF**: [`KeyDerivationPrf`] identifier
//! - **Salt**: at least 16 bytes
//! - **Sub-key**: every byte after the salt, at least 16 bytes
//!
//! The envelope is stored as standard padded base64. It is never modified
//! in place: upgrading a hash means producing a new envelope.

use std::fmt;

use data_encoding::BASE64;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::prf::KeyDerivationPrf;

/// Format marker for the version 3 scheme.
pub const FORMAT_MARKER: u8 = 0x01;

/// Header length: marker + three big-endian u32 fields.
pub const HEADER_LEN: usize = 13;

/// Minimum salt length in bytes (128 bits).
pub const MIN_SALT_LEN: usize = 16;

/// Minimum sub-key length in bytes (128 bits).
pub const MIN_SUB_KEY_LEN: usize = 16;

const PRF_OFFSET: usize = 1;
const ITERATIONS_OFFSET: usize = 5;
const SALT_LEN_OFFSET: usize = 9;

/// Decoded version 3 envelope.
///
/// Salt and sub-key are zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HashEnvelope {
    #[zeroize(skip)]
    prf: KeyDerivationPrf,
    iteration_count: u32,
    salt: Vec<u8>,
    sub_key: Vec<u8>,
}

impl fmt::Debug for HashEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashEnvelope")
            .field("prf", &self.prf)
            .field("iteration_count", &self.iteration_count)
            .field("salt_len", &self.salt.len())
            .field("sub_key", &"***")
            .finish()
    }
}

impl HashEnvelope {
    /// Build an envelope from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyDerivation`] if the iteration count is zero
    /// or the salt or sub-key is shorter than 16 bytes.
    pub fn new(
        prf: KeyDerivationPrf,
        iteration_count: u32,
        salt: Vec<u8>,
        sub_key: Vec<u8>,
    ) -> Result<Self, CryptoError> {
        if iteration_count == 0 {
            return Err(CryptoError::KeyDerivation(
                "iteration count must be non-zero".into(),
            ));
        }
        if salt.len() < MIN_SALT_LEN {
            return Err(CryptoError::KeyDerivation(format!(
                "salt too short: {} bytes (minimum {MIN_SALT_LEN})",
                salt.len()
            )));
        }
        if sub_key.len() < MIN_SUB_KEY_LEN {
            return Err(CryptoError::KeyDerivation(format!(
                "sub-key too short: {} bytes (minimum {MIN_SUB_KEY_LEN})",
                sub_key.len()
            )));
        }
        Ok(Self {
            prf,
            iteration_count,
            salt,
            sub_key,
        })
    }

    /// PRF used to derive the sub-key.
    #[must_use]
    pub const fn prf(&self) -> KeyDerivationPrf {
        self.prf
    }

    /// PBKDF2 iteration count.
    #[must_use]
    pub const fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    /// Random salt.
    #[must_use]
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Derived sub-key.
    #[must_use]
    pub fn sub_key(&self) -> &[u8] {
        &self.sub_key
    }

    /// Total binary length: header + salt + sub-key.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN
            .saturating_add(self.salt.len())
            .saturating_add(self.sub_key.len())
    }

    /// Serialize to the binary layout.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedHash`] if the salt length does not fit in a u32.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        let salt_len = u32::try_from(self.salt.len())
            .map_err(|_| CryptoError::MalformedHash("salt too large for u32 length".into()))?;

        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(FORMAT_MARKER);
        out.extend_from_slice(&self.prf.id().to_be_bytes());
        out.extend_from_slice(&self.iteration_count.to_be_bytes());
        out.extend_from_slice(&salt_len.to_be_bytes());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.sub_key);
        Ok(out)
    }

    /// Parse the binary layout, bounds-checking every field.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedHash`] for an empty buffer, an unknown
    /// marker or PRF, a truncated header or salt, a zero iteration count, or
    /// a salt or sub-key shorter than 16 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let Some(&marker) = bytes.first() else {
            return Err(CryptoError::MalformedHash("empty envelope".into()));
        };
        if marker != FORMAT_MARKER {
            return Err(CryptoError::MalformedHash(format!(
                "unsupported format marker: {marker:#04x}"
            )));
        }
        if bytes.len() < HEADER_LEN {
            return Err(CryptoError::MalformedHash(format!(
                "truncated header: {} bytes (expected {HEADER_LEN})",
                bytes.len()
            )));
        }

        let prf_id = read_u32_be(bytes, PRF_OFFSET)?;
        let iteration_count = read_u32_be(bytes, ITERATIONS_OFFSET)?;
        let salt_len = read_u32_be(bytes, SALT_LEN_OFFSET)?;

        let prf = KeyDerivationPrf::from_id(prf_id)
            .ok_or_else(|| CryptoError::MalformedHash(format!("unknown PRF id: {prf_id}")))?;

        if iteration_count == 0 {
            return Err(CryptoError::MalformedHash("zero iteration count".into()));
        }

        let salt_len = usize::try_from(salt_len)
            .map_err(|_| CryptoError::MalformedHash("salt length overflows usize".into()))?;
        if salt_len < MIN_SALT_LEN {
            return Err(CryptoError::MalformedHash(format!(
                "salt too short: {salt_len} bytes (minimum {MIN_SALT_LEN})"
            )));
        }

        let salt_end = HEADER_LEN
            .checked_add(salt_len)
            .ok_or_else(|| CryptoError::MalformedHash("salt length overflow".into()))?;
        let salt = bytes
            .get(HEADER_LEN..salt_end)
            .ok_or_else(|| CryptoError::MalformedHash("truncated salt".into()))?;
        let sub_key = bytes.get(salt_end..).unwrap_or_default();
        if sub_key.len() < MIN_SUB_KEY_LEN {
            return Err(CryptoError::MalformedHash(format!(
                "sub-key too short: {} bytes (minimum {MIN_SUB_KEY_LEN})",
                sub_key.len()
            )));
        }

        Ok(Self {
            prf,
            iteration_count,
            salt: salt.to_vec(),
            sub_key: sub_key.to_vec(),
        })
    }

    /// Encode as padded base64 for storage in a text column.
    ///
    /// # Errors
    ///
    /// See [`to_bytes`](Self::to_bytes).
    pub fn encode(&self) -> Result<String, CryptoError> {
        let mut raw = self.to_bytes()?;
        let encoded = BASE64.encode(&raw);
        raw.zeroize();
        Ok(encoded)
    }

    /// Decode a base64 string produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedHash`] if the text is not valid base64
    /// or the decoded bytes are not a well-formed envelope.
    pub fn decode(encoded: &str) -> Result<Self, CryptoError> {
        let mut raw = BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| CryptoError::MalformedHash(format!("invalid base64: {e}")))?;
        let result = Self::from_bytes(&raw);
        raw.zeroize();
        result
    }
}

fn read_u32_be(bytes: &[u8], offset: usize) -> Result<u32, CryptoError> {
    let end = offset
        .checked_add(4)
        .ok_or_else(|| CryptoError::MalformedHash("header offset overflow".into()))?;
    let field: [u8; 4] = bytes
        .get(offset..end)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| CryptoError::MalformedHash("truncated header".into()))?;
    Ok(u32::from_be_bytes(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HashEnvelope {
        HashEnvelope::new(
            KeyDerivationPrf::HmacSha512,
            100_000,
            (0u8..16).collect(),
            vec![0xAB; 32],
        )
        .expect("valid envelope")
    }

    #[test]
    fn to_bytes_layout_is_big_endian() {
        let bytes = sample().to_bytes().unwrap();
        assert_eq!(bytes.len(), 61);
        assert_eq!(bytes[0], FORMAT_MARKER);
        assert_eq!(&bytes[1..5], &[0, 0, 0, 2]);
        assert_eq!(&bytes[5..9], &100_000u32.to_be_bytes());
        assert_eq!(&bytes[9..13], &[0, 0, 0, 16]);
        assert_eq!(&bytes[13..29], &(0u8..16).collect::<Vec<_>>()[..]);
        assert_eq!(&bytes[29..], &[0xAB; 32]);
    }

    #[test]
    fn encoded_string_is_84_chars() {
        // 61 raw bytes -> 21 base64 quanta.
        let encoded = sample().encode().unwrap();
        assert_eq!(encoded.len(), 84);
        assert!(encoded.ends_with("=="));
    }

    #[test]
    fn from_bytes_recovers_fields() {
        let original = sample();
        let parsed = HashEnvelope::from_bytes(&original.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.prf(), KeyDerivationPrf::HmacSha512);
        assert_eq!(parsed.iteration_count(), 100_000);
        assert_eq!(parsed.salt(), original.salt());
        assert_eq!(parsed.sub_key(), original.sub_key());
    }

    #[test]
    fn new_rejects_short_salt() {
        let err = HashEnvelope::new(KeyDerivationPrf::HmacSha512, 1, vec![0; 8], vec![0; 32])
            .expect_err("8-byte salt must be rejected");
        assert!(format!("{err}").contains("salt too short"));
    }

    #[test]
    fn new_rejects_short_sub_key() {
        assert!(
            HashEnvelope::new(KeyDerivationPrf::HmacSha512, 1, vec![0; 16], vec![0; 15]).is_err()
        );
    }

    #[test]
    fn new_rejects_zero_iterations() {
        assert!(
            HashEnvelope::new(KeyDerivationPrf::HmacSha512, 0, vec![0; 16], vec![0; 32]).is_err()
        );
    }

    #[test]
    fn from_bytes_rejects_empty() {
        let err = HashEnvelope::from_bytes(&[]).unwrap_err();
        assert!(format!("{err}").contains("empty"));
    }

    #[test]
    fn from_bytes_rejects_v2_marker() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[0] = 0x00;
        let err = HashEnvelope::from_bytes(&bytes).unwrap_err();
        assert!(format!("{err}").contains("marker"));
    }

    #[test]
    fn from_bytes_rejects_every_truncated_header() {
        let bytes = sample().to_bytes().unwrap();
        for len in 1..HEADER_LEN {
            assert!(
                HashEnvelope::from_bytes(&bytes[..len]).is_err(),
                "header truncated to {len} bytes must be rejected"
            );
        }
    }

    #[test]
    fn from_bytes_rejects_unknown_prf() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[1..5].copy_from_slice(&7u32.to_be_bytes());
        let err = HashEnvelope::from_bytes(&bytes).unwrap_err();
        assert!(format!("{err}").contains("unknown PRF"));
    }

    #[test]
    fn from_bytes_rejects_zero_iterations() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[5..9].copy_from_slice(&0u32.to_be_bytes());
        assert!(HashEnvelope::from_bytes(&bytes).is_err());
    }

    #[test]
    fn from_bytes_rejects_declared_salt_below_minimum() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[9..13].copy_from_slice(&8u32.to_be_bytes());
        let err = HashEnvelope::from_bytes(&bytes).unwrap_err();
        assert!(format!("{err}").contains("salt too short"));
    }

    #[test]
    fn from_bytes_rejects_salt_length_past_end() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[9..13].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(HashEnvelope::from_bytes(&bytes).is_err());
    }

    #[test]
    fn from_bytes_rejects_short_sub_key() {
        let bytes = sample().to_bytes().unwrap();
        let truncated = &bytes[..HEADER_LEN + 16 + 15];
        let err = HashEnvelope::from_bytes(truncated).unwrap_err();
        assert!(format!("{err}").contains("sub-key too short"));
    }

    #[test]
    fn from_bytes_accepts_longer_salt_and_sub_key() {
        let envelope =
            HashEnvelope::new(KeyDerivationPrf::HmacSha256, 10, vec![7; 24], vec![9; 64]).unwrap();
        let parsed = HashEnvelope::from_bytes(&envelope.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.salt().len(), 24);
        assert_eq!(parsed.sub_key().len(), 64);
        assert_eq!(parsed.encoded_len(), 13 + 24 + 64);
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        let err = HashEnvelope::decode("not base64 at all!").unwrap_err();
        assert!(format!("{err}").contains("invalid base64"));
    }

    #[test]
    fn debug_masks_sub_key() {
        let debug = format!("{:?}", sample());
        assert!(debug.contains("sub_key: \"***\""));
        assert!(!debug.contains("171")); // 0xAB
    }
}
