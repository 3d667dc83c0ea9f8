//! Password policy and user field validation.

use std::collections::HashSet;

use crate::error::{IdentityError, PasswordViolation};
use crate::options::{PasswordOptions, UserOptions};

/// Check `password` against the policy, collecting every violation.
///
/// # Errors
///
/// Returns [`IdentityError::PasswordPolicy`] listing all failed rules.
pub fn validate_password(options: &PasswordOptions, password: &str) -> Result<(), IdentityError> {
    let mut violations = Vec::new();

    if password.chars().count() < options.required_length {
        violations.push(PasswordViolation::TooShort(options.required_length));
    }
    if options.require_non_alphanumeric && password.chars().all(|c| c.is_ascii_alphanumeric()) {
        violations.push(PasswordViolation::RequiresNonAlphanumeric);
    }
    if options.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push(PasswordViolation::RequiresDigit);
    }
    if options.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
        violations.push(PasswordViolation::RequiresLowercase);
    }
    if options.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
        violations.push(PasswordViolation::RequiresUppercase);
    }
    if options.required_unique_chars > 0 {
        let unique: HashSet<char> = password.chars().collect();
        if unique.len() < options.required_unique_chars {
            violations.push(PasswordViolation::TooFewUniqueChars(
                options.required_unique_chars,
            ));
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(IdentityError::PasswordPolicy(violations))
    }
}

/// Check that a user name is non-empty and uses only allowed characters.
///
/// # Errors
///
/// Returns [`IdentityError::InvalidUserName`].
pub fn validate_user_name(options: &UserOptions, user_name: &str) -> Result<(), IdentityError> {
    if user_name.trim().is_empty() {
        return Err(IdentityError::InvalidUserName("user name is empty".into()));
    }
    let allowed = &options.allowed_user_name_characters;
    if !allowed.is_empty() {
        if let Some(bad) = user_name.chars().find(|c| !allowed.contains(*c)) {
            return Err(IdentityError::InvalidUserName(format!(
                "character {bad:?} is not allowed"
            )));
        }
    }
    Ok(())
}

/// Minimal email shape check: one `@` with a non-empty local part and a
/// dotted domain.
///
/// # Errors
///
/// Returns [`IdentityError::InvalidEmail`].
pub fn validate_email(email: &str) -> Result<(), IdentityError> {
    let invalid = || IdentityError::InvalidEmail(email.to_string());
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }
    Ok(())
}
