//! Identity error types for `sightline-identity`.

use sightline_crypto_core::CryptoError;
use thiserror::Error;

/// Errors produced by identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Password hashing failed (delegated from crypto-core).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// `SQLite` error.
    #[error("database error: {0}")]
    Database(String),

    /// Migration error during schema upgrade.
    #[error("migration error: {0}")]
    Migration(String),

    /// User not found by id or name.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// Role not found by id or name.
    #[error("role not found: {0}")]
    RoleNotFound(String),

    /// Another user already has this normalized user name.
    #[error("user name already taken: {0}")]
    DuplicateUserName(String),

    /// Another user already has this normalized email.
    #[error("email already taken: {0}")]
    DuplicateEmail(String),

    /// Another role already has this normalized name.
    #[error("role name already taken: {0}")]
    DuplicateRoleName(String),

    /// User name is empty or contains disallowed characters.
    #[error("invalid user name: {0}")]
    InvalidUserName(String),

    /// Email is syntactically invalid.
    #[error("invalid email: {0}")]
    InvalidEmail(String),

    /// Role name is empty.
    #[error("invalid role name")]
    InvalidRoleName,

    /// New password violates the configured policy.
    #[error("password rejected: {}", join_violations(.0))]
    PasswordPolicy(Vec<PasswordViolation>),

    /// Current password did not verify.
    #[error("incorrect password")]
    PasswordMismatch,

    /// `add_password` on a user that already has one.
    #[error("user already has a password")]
    UserAlreadyHasPassword,

    /// User is already a member of the role.
    #[error("user already in role: {0}")]
    UserAlreadyInRole(String),

    /// User is not a member of the role.
    #[error("user not in role: {0}")]
    UserNotInRole(String),

    /// Row was modified since it was read (concurrency stamp mismatch).
    #[error("optimistic concurrency failure: entity was modified by another writer")]
    ConcurrencyFailure,

    /// I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for IdentityError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// A single password policy violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PasswordViolation {
    /// Fewer characters than required.
    #[error("must be at least {0} characters")]
    TooShort(usize),
    /// Fewer distinct characters than required.
    #[error("must contain at least {0} unique characters")]
    TooFewUniqueChars(usize),
    /// No character outside `[A-Za-z0-9]`.
    #[error("must contain a non-alphanumeric character")]
    RequiresNonAlphanumeric,
    /// No ASCII digit.
    #[error("must contain a digit")]
    RequiresDigit,
    /// No ASCII lowercase letter.
    #[error("must contain a lowercase letter")]
    RequiresLowercase,
    /// No ASCII uppercase letter.
    #[error("must contain an uppercase letter")]
    RequiresUppercase,
}

fn join_violations(violations: &[PasswordViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_error_lists_every_violation() {
        let err = IdentityError::PasswordPolicy(vec![
            PasswordViolation::TooShort(6),
            PasswordViolation::RequiresDigit,
        ]);
        assert_eq!(
            err.to_string(),
            "password rejected: must be at least 6 characters; must contain a digit"
        );
    }

    #[test]
    fn rusqlite_errors_map_to_database() {
        let err: IdentityError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, IdentityError::Database(_)));
    }
}
