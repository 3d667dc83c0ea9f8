//! Identity configuration — password policy, user rules, lockout, hashing.
//!
//! Persisted as camelCase JSON at `{config_dir}/identity.json`. Every field
//! has a default, so partial files are valid.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sightline_crypto_core::PasswordHasherOptions;

const OPTIONS_FILE: &str = "identity.json";

/// Characters permitted in user names by default.
pub const DEFAULT_ALLOWED_USER_NAME_CHARACTERS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-._@+";

// ── Top-level options ──────────────────────────────────────────────

/// All identity settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IdentityOptions {
    /// Password strength rules.
    #[serde(default)]
    pub password: PasswordOptions,

    /// User name and email rules.
    #[serde(default)]
    pub user: UserOptions,

    /// Failed-attempt lockout rules.
    #[serde(default)]
    pub lockout: LockoutOptions,

    /// PBKDF2 hasher settings.
    #[serde(default)]
    pub hasher: PasswordHasherOptions,
}

// ── Password policy ────────────────────────────────────────────────

/// Password strength rules applied on create, add, and change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct PasswordOptions {
    /// Minimum length in characters.
    pub required_length: usize,
    /// Minimum number of distinct characters.
    pub required_unique_chars: usize,
    /// Require a character outside `[A-Za-z0-9]`.
    pub require_non_alphanumeric: bool,
    /// Require an ASCII lowercase letter.
    pub require_lowercase: bool,
    /// Require an ASCII uppercase letter.
    pub require_uppercase: bool,
    /// Require an ASCII digit.
    pub require_digit: bool,
}

impl Default for PasswordOptions {
    fn default() -> Self {
        Self {
            required_length: 6,
            required_unique_chars: 1,
            require_non_alphanumeric: true,
            require_lowercase: true,
            require_uppercase: true,
            require_digit: true,
        }
    }
}

// ── User rules ─────────────────────────────────────────────────────

/// User name and email rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct UserOptions {
    /// Characters permitted in user names. Empty allows any character.
    pub allowed_user_name_characters: String,
    /// Reject a second user with the same normalized email.
    pub require_unique_email: bool,
}

impl Default for UserOptions {
    fn default() -> Self {
        Self {
            allowed_user_name_characters: DEFAULT_ALLOWED_USER_NAME_CHARACTERS.into(),
            require_unique_email: false,
        }
    }
}

// ── Lockout ────────────────────────────────────────────────────────

/// Failed sign-in lockout rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct LockoutOptions {
    /// Whether new users start with lockout enabled.
    pub allowed_for_new_users: bool,
    /// Consecutive failures before the account locks.
    pub max_failed_access_attempts: u32,
    /// Lockout duration in seconds.
    pub default_lockout_seconds: i64,
}

impl Default for LockoutOptions {
    fn default() -> Self {
        Self {
            allowed_for_new_users: true,
            max_failed_access_attempts: 5,
            default_lockout_seconds: 300,
        }
    }
}

// ── File I/O ───────────────────────────────────────────────────────

impl IdentityOptions {
    /// Load options from `{config_dir}/identity.json`.
    ///
    /// Returns [`Default::default()`] when the file is missing or contains
    /// invalid JSON. A corrupt file is logged at warn level.
    #[must_use]
    pub fn load(config_dir: &Path) -> Self {
        let path = config_dir.join(OPTIONS_FILE);
        let Ok(contents) = fs::read_to_string(&path) else {
            return Self::default();
        };
        serde_json::from_str(&contents).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), "ignoring corrupt identity options: {e}");
            Self::default()
        })
    }

    /// Persist options to `{config_dir}/identity.json`.
    ///
    /// Writes to a temporary file and renames it into place.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the directory does not exist or the
    /// file system rejects the write/rename.
    pub fn save(&self, config_dir: &Path) -> std::io::Result<()> {
        let path = config_dir.join(OPTIONS_FILE);
        let tmp = config_dir.join(".identity.json.tmp");

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        fs::write(&tmp, &json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp, &path)?;

        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────
