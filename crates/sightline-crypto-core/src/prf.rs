//! PBKDF2 pseudo-random function identifiers.
//!
//! The numeric ids are part of the persisted envelope and must never be
//! renumbered: HMAC-SHA1 = 0, HMAC-SHA256 = 1, HMAC-SHA512 = 2.

use ring::pbkdf2;

/// Keyed hash underlying a PBKDF2 derivation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyDerivationPrf {
    /// HMAC-SHA1. Accepted for verification only.
    HmacSha1,
    /// HMAC-SHA256. Accepted for verification only.
    HmacSha256,
    /// HMAC-SHA512. Used for every new hash.
    HmacSha512,
}

impl KeyDerivationPrf {
    /// Envelope identifier for this PRF.
    #[must_use]
    pub const fn id(self) -> u32 {
        match self {
            Self::HmacSha1 => 0,
            Self::HmacSha256 => 1,
            Self::HmacSha512 => 2,
        }
    }

    /// Look up a PRF by its envelope identifier.
    #[must_use]
    pub const fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::HmacSha1),
            1 => Some(Self::HmacSha256),
            2 => Some(Self::HmacSha512),
            _ => None,
        }
    }

    /// `true` for PRFs that should be upgraded on the next successful login.
    #[must_use]
    pub const fn is_legacy(self) -> bool {
        matches!(self, Self::HmacSha1 | Self::HmacSha256)
    }

    pub(crate) fn algorithm(self) -> pbkdf2::Algorithm {
        match self {
            Self::HmacSha1 => pbkdf2::PBKDF2_HMAC_SHA1,
            Self::HmacSha256 => pbkdf2::PBKDF2_HMAC_SHA256,
            Self::HmacSha512 => pbkdf2::PBKDF2_HMAC_SHA512,
        }
    }
}
