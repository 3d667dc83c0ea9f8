//! User account management — creation, passwords, sign-in, roles, claims.
//!
//! [`UserManager`] owns the identity database and a password hasher. Write
//! operations take the [`User`] the caller last read and return the stored
//! copy with its new concurrency stamp; passing a stale copy fails with
//! [`IdentityError::ConcurrencyFailure`].
//!
//! # Password Upgrades
//!
//! When a stored hash verifies but uses weaker parameters than the hasher's
//! current configuration, the manager re-hashes the password and writes the
//! new envelope in the same call. The security stamp is left untouched.

use rusqlite::Connection;
use sightline_crypto_core::{
    HashEnvelope, OsRandom, PasswordHasher, PasswordVerificationResult, SecureRandom,
};

use crate::claims::{self, Claim, ClaimOwner};
use crate::db::IdentityDb;
use crate::error::IdentityError;
use crate::options::IdentityOptions;
use crate::role_manager::RoleManager;
use crate::roles;
use crate::stamps::{generate_stamp, normalize_key, unix_now};
use crate::users::{self, User};
use crate::validators;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Parameters for [`UserManager::create_user`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateUserRequest<'a> {
    pub user_name: &'a str,
    pub email: Option<&'a str>,
    /// `None` creates a password-less account.
    pub password: Option<&'a str>,
}

/// Result of [`UserManager::sign_in`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    /// Password verified. Carries the stored user after any counter reset
    /// or hash upgrade.
    Succeeded(User),
    /// Unknown user, missing password, or wrong password.
    Failed,
    /// Account is locked until the given Unix time.
    LockedOut { until: i64 },
}

/// User operations over an owned identity database.
pub struct UserManager<R = OsRandom> {
    db: IdentityDb,
    hasher: PasswordHasher<R>,
    options: IdentityOptions,
}

impl<R> std::fmt::Debug for UserManager<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserManager")
            .field("db", &self.db)
            .field("hasher", &self.hasher)
            .finish_non_exhaustive()
    }
}

impl UserManager<OsRandom> {
    /// Build a manager whose hasher follows `options.hasher`.
    #[must_use]
    pub fn new(db: IdentityDb, options: IdentityOptions) -> Self {
        let hasher = PasswordHasher::new(&options.hasher);
        Self {
            db,
            hasher,
            options,
        }
    }
}

impl<R: SecureRandom> UserManager<R> {
    /// Build a manager with an explicit hasher.
    #[must_use]
    pub fn with_hasher(db: IdentityDb, options: IdentityOptions, hasher: PasswordHasher<R>) -> Self {
        Self {
            db,
            hasher,
            options,
        }
    }

    #[must_use]
    pub const fn db(&self) -> &IdentityDb {
        &self.db
    }

    #[must_use]
    pub const fn options(&self) -> &IdentityOptions {
        &self.options
    }

    #[must_use]
    pub const fn hasher(&self) -> &PasswordHasher<R> {
        &self.hasher
    }

    /// Role administration over the same database.
    #[must_use]
    pub const fn roles(&self) -> RoleManager<'_> {
        RoleManager::new(&self.db)
    }

    const fn conn(&self) -> &Connection {
        self.db.connection()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Validate and insert a new user.
    ///
    /// # Errors
    ///
    /// - [`IdentityError::InvalidUserName`] / [`IdentityError::InvalidEmail`]
    /// - [`IdentityError::DuplicateUserName`] / [`IdentityError::DuplicateEmail`]
    /// - [`IdentityError::PasswordPolicy`] if a password is given and too weak
    pub fn create_user(&self, request: CreateUserRequest<'_>) -> Result<User, IdentityError> {
        let user_name = request.user_name.trim();
        validators::validate_user_name(&self.options.user, user_name)?;
        let normalized_user_name = normalize_key(user_name);
        if users::find_user_by_normalized_name(self.conn(), &normalized_user_name)?.is_some() {
            return Err(IdentityError::DuplicateUserName(user_name.to_string()));
        }

        let email = request.email.map(str::trim).filter(|e| !e.is_empty());
        let normalized_email = email.map(normalize_key);
        if let Some(email) = email {
            validators::validate_email(email)?;
            self.ensure_email_available(email, None)?;
        }

        let password_hash = match request.password {
            Some(password) => {
                validators::validate_password(&self.options.password, password)?;
                Some(self.hasher.hash_password(password)?)
            }
            None => None,
        };

        let user = User {
            id: generate_stamp(),
            user_name: user_name.to_string(),
            normalized_user_name,
            email: email.map(ToString::to_string),
            normalized_email,
            email_confirmed: false,
            password_hash,
            security_stamp: generate_stamp(),
            concurrency_stamp: generate_stamp(),
            lockout_enabled: self.options.lockout.allowed_for_new_users,
            lockout_end: None,
            access_failed_count: 0,
            created_at: unix_now(),
        };
        users::insert_user(self.conn(), &user)?;
        tracing::info!(user_id = %user.id, "user created");
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns [`IdentityError::Database`] if the query fails.
    pub fn find_by_id(&self, id: &str) -> Result<Option<User>, IdentityError> {
        users::find_user_by_id(self.conn(), id)
    }

    /// Case-insensitive lookup by user name.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Database`] if the query fails.
    pub fn find_by_name(&self, user_name: &str) -> Result<Option<User>, IdentityError> {
        users::find_user_by_normalized_name(self.conn(), &normalize_key(user_name))
    }

    /// Case-insensitive lookup by email.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Database`] if the query fails.
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>, IdentityError> {
        users::find_user_by_normalized_email(self.conn(), &normalize_key(email))
    }

    /// # Errors
    ///
    /// Returns [`IdentityError::Database`] if the query fails.
    pub fn list_users(&self) -> Result<Vec<User>, IdentityError> {
        users::list_users(self.conn())
    }

    /// Persist edits to a user read earlier, re-validating and re-normalizing
    /// the user name and email.
    ///
    /// # Errors
    ///
    /// - Validation and duplicate errors as in [`create_user`](Self::create_user)
    /// - [`IdentityError::ConcurrencyFailure`] if `user` is stale
    pub fn update_user(&self, user: &User) -> Result<User, IdentityError> {
        let mut edited = user.clone();
        edited.user_name = edited.user_name.trim().to_string();
        validators::validate_user_name(&self.options.user, &edited.user_name)?;
        edited.normalized_user_name = normalize_key(&edited.user_name);
        if let Some(other) =
            users::find_user_by_normalized_name(self.conn(), &edited.normalized_user_name)?
        {
            if other.id != edited.id {
                return Err(IdentityError::DuplicateUserName(edited.user_name));
            }
        }

        edited.email = edited
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(ToString::to_string);
        if let Some(email) = edited.email.as_deref() {
            validators::validate_email(email)?;
            self.ensure_email_available(email, Some(&edited.id))?;
        }
        edited.normalized_email = edited.email.as_deref().map(normalize_key);

        users::update_user(self.conn(), &edited)
    }

    /// Change the email address; clears confirmation and rotates the
    /// security stamp.
    ///
    /// # Errors
    ///
    /// As [`update_user`](Self::update_user).
    pub fn set_email(&self, user: &User, email: Option<&str>) -> Result<User, IdentityError> {
        let mut edited = user.clone();
        edited.email = email.map(ToString::to_string);
        edited.email_confirmed = false;
        edited.security_stamp = generate_stamp();
        self.update_user(&edited)
    }

    /// Delete a user read earlier. Role memberships and claims cascade.
    ///
    /// # Errors
    ///
    /// - [`IdentityError::ConcurrencyFailure`] if `user` is stale
    /// - [`IdentityError::UserNotFound`] if it was already deleted
    pub fn delete_user(&self, user: &User) -> Result<(), IdentityError> {
        users::delete_user(self.conn(), user)?;
        tracing::info!(user_id = %user.id, "user deleted");
        Ok(())
    }

    fn ensure_email_available(&self, email: &str, own_id: Option<&str>) -> Result<(), IdentityError> {
        if !self.options.user.require_unique_email {
            return Ok(());
        }
        match users::find_user_by_normalized_email(self.conn(), &normalize_key(email))? {
            Some(other) if Some(other.id.as_str()) != own_id => {
                Err(IdentityError::DuplicateEmail(email.to_string()))
            }
            _ => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Passwords
    // -----------------------------------------------------------------------

    /// Check a password, upgrading the stored hash when it is outdated.
    ///
    /// On success returns the stored user, which carries a new concurrency
    /// stamp if the hash was upgraded; use it for any further writes.
    /// Returns `None` for a wrong password, users without a password and
    /// malformed stored hashes.
    ///
    /// # Errors
    ///
    /// Only the hash-upgrade write can fail: [`IdentityError::ConcurrencyFailure`]
    /// if `user` is stale, or a hashing/database error.
    pub fn check_password(&self, user: &User, password: &str) -> Result<Option<User>, IdentityError> {
        self.verify_user_password(user, password)
    }

    /// Verify and, on success, return the stored user (re-hashed if needed).
    fn verify_user_password(
        &self,
        user: &User,
        password: &str,
    ) -> Result<Option<User>, IdentityError> {
        let Some(hash) = user.password_hash.as_deref() else {
            return Ok(None);
        };
        let envelope = match HashEnvelope::decode(hash) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(user_id = %user.id, "stored password hash is unusable: {e}");
                return Ok(None);
            }
        };

        match self.hasher.verify_envelope(&envelope, password) {
            PasswordVerificationResult::Failed => Ok(None),
            PasswordVerificationResult::Success => Ok(Some(user.clone())),
            PasswordVerificationResult::SuccessRehashNeeded => {
                let mut upgraded = user.clone();
                upgraded.password_hash = Some(self.hasher.hash_password(password)?);
                let stored = users::update_user(self.conn(), &upgraded)?;
                tracing::info!(
                    user_id = %user.id,
                    iterations = self.hasher.iteration_count(),
                    "password hash upgraded"
                );
                Ok(Some(stored))
            }
        }
    }

    /// Set a password on a password-less account.
    ///
    /// # Errors
    ///
    /// - [`IdentityError::UserAlreadyHasPassword`]
    /// - [`IdentityError::PasswordPolicy`]
    /// - [`IdentityError::ConcurrencyFailure`] if `user` is stale
    pub fn add_password(&self, user: &User, password: &str) -> Result<User, IdentityError> {
        if user.has_password() {
            return Err(IdentityError::UserAlreadyHasPassword);
        }
        self.store_new_password(user, password)
    }

    /// Replace the password after verifying the current one.
    ///
    /// # Errors
    ///
    /// - [`IdentityError::PasswordMismatch`] if `current` does not verify
    /// - [`IdentityError::PasswordPolicy`] if `new_password` is too weak
    /// - [`IdentityError::ConcurrencyFailure`] if `user` is stale
    pub fn change_password(
        &self,
        user: &User,
        current: &str,
        new_password: &str,
    ) -> Result<User, IdentityError> {
        validators::validate_password(&self.options.password, new_password)?;
        let verified = self
            .verify_user_password(user, current)?
            .ok_or(IdentityError::PasswordMismatch)?;
        let stored = self.store_new_password(&verified, new_password)?;
        tracing::info!(user_id = %user.id, "password changed");
        Ok(stored)
    }

    /// Drop the password, leaving a password-less account.
    ///
    /// # Errors
    ///
    /// [`IdentityError::ConcurrencyFailure`] if `user` is stale.
    pub fn remove_password(&self, user: &User) -> Result<User, IdentityError> {
        let mut edited = user.clone();
        edited.password_hash = None;
        edited.security_stamp = generate_stamp();
        users::update_user(self.conn(), &edited)
    }

    fn store_new_password(&self, user: &User, password: &str) -> Result<User, IdentityError> {
        validators::validate_password(&self.options.password, password)?;
        let mut edited = user.clone();
        edited.password_hash = Some(self.hasher.hash_password(password)?);
        edited.security_stamp = generate_stamp();
        users::update_user(self.conn(), &edited)
    }

    // -----------------------------------------------------------------------
    // Sign-in and lockout
    // -----------------------------------------------------------------------

    /// Password sign-in with failed-attempt lockout.
    ///
    /// A locked account is refused before the password is checked. A
    /// failure increments the counter; reaching the configured maximum
    /// locks the account and resets the counter. A success resets it.
    ///
    /// # Errors
    ///
    /// Database or hashing failures only; wrong credentials are
    /// [`SignInOutcome::Failed`].
    pub fn sign_in(&self, user_name: &str, password: &str) -> Result<SignInOutcome, IdentityError> {
        let Some(user) = self.find_by_name(user_name)? else {
            tracing::info!("sign-in failed: unknown user");
            return Ok(SignInOutcome::Failed);
        };

        let now = unix_now();
        if let Some(until) = user.locked_until(now) {
            tracing::info!(user_id = %user.id, until, "sign-in refused: locked out");
            return Ok(SignInOutcome::LockedOut { until });
        }

        if let Some(verified) = self.verify_user_password(&user, password)? {
            let stored = if verified.access_failed_count > 0 {
                self.reset_access_failed_count(&verified)?
            } else {
                verified
            };
            tracing::info!(user_id = %stored.id, "sign-in succeeded");
            return Ok(SignInOutcome::Succeeded(stored));
        }

        let stored = self.access_failed(&user, now)?;
        if let Some(until) = stored.locked_until(now) {
            tracing::warn!(user_id = %stored.id, until, "account locked after failed sign-ins");
            return Ok(SignInOutcome::LockedOut { until });
        }
        tracing::info!(
            user_id = %stored.id,
            failures = stored.access_failed_count,
            "sign-in failed: wrong password"
        );
        Ok(SignInOutcome::Failed)
    }

    /// Record a failed attempt; lock the account at the threshold.
    fn access_failed(&self, user: &User, now: i64) -> Result<User, IdentityError> {
        if !user.lockout_enabled {
            return Ok(user.clone());
        }
        let mut edited = user.clone();
        edited.access_failed_count = edited.access_failed_count.saturating_add(1);
        if edited.access_failed_count >= self.options.lockout.max_failed_access_attempts {
            edited.lockout_end = Some(now.saturating_add(self.options.lockout.default_lockout_seconds));
            edited.access_failed_count = 0;
        }
        users::update_user(self.conn(), &edited)
    }

    /// Clear the failed-attempt counter.
    ///
    /// # Errors
    ///
    /// [`IdentityError::ConcurrencyFailure`] if `user` is stale.
    pub fn reset_access_failed_count(&self, user: &User) -> Result<User, IdentityError> {
        let mut edited = user.clone();
        edited.access_failed_count = 0;
        users::update_user(self.conn(), &edited)
    }

    /// Enable or disable lockout for one user.
    ///
    /// # Errors
    ///
    /// [`IdentityError::ConcurrencyFailure`] if `user` is stale.
    pub fn set_lockout_enabled(&self, user: &User, enabled: bool) -> Result<User, IdentityError> {
        let mut edited = user.clone();
        edited.lockout_enabled = enabled;
        users::update_user(self.conn(), &edited)
    }

    /// Set or clear the lockout end (Unix seconds).
    ///
    /// # Errors
    ///
    /// [`IdentityError::ConcurrencyFailure`] if `user` is stale.
    pub fn set_lockout_end(&self, user: &User, until: Option<i64>) -> Result<User, IdentityError> {
        let mut edited = user.clone();
        edited.lockout_end = until;
        users::update_user(self.conn(), &edited)
    }

    // -----------------------------------------------------------------------
    // Roles
    // -----------------------------------------------------------------------

    /// Add the user to a role by name.
    ///
    /// # Errors
    ///
    /// - [`IdentityError::RoleNotFound`]
    /// - [`IdentityError::UserAlreadyInRole`]
    /// - [`IdentityError::ConcurrencyFailure`] if `user` is stale
    pub fn add_to_role(&self, user: &User, role_name: &str) -> Result<User, IdentityError> {
        let role = self.roles().require_by_name(role_name)?;
        let tx = self.conn().unchecked_transaction()?;
        let stored = users::update_user(&tx, user)?;
        roles::add_user_to_role(&tx, &user.id, &role)?;
        tx.commit()?;
        Ok(stored)
    }

    /// Remove the user from a role by name.
    ///
    /// # Errors
    ///
    /// - [`IdentityError::RoleNotFound`]
    /// - [`IdentityError::UserNotInRole`]
    /// - [`IdentityError::ConcurrencyFailure`] if `user` is stale
    pub fn remove_from_role(&self, user: &User, role_name: &str) -> Result<User, IdentityError> {
        let role = self.roles().require_by_name(role_name)?;
        let tx = self.conn().unchecked_transaction()?;
        let stored = users::update_user(&tx, user)?;
        roles::remove_user_from_role(&tx, &user.id, &role)?;
        tx.commit()?;
        Ok(stored)
    }

    /// Role names for a user, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Database`] if the query fails.
    pub fn get_roles(&self, user: &User) -> Result<Vec<String>, IdentityError> {
        roles::role_names_for_user(self.conn(), &user.id)
    }

    /// `false` when the role does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Database`] if the query fails.
    pub fn is_in_role(&self, user: &User, role_name: &str) -> Result<bool, IdentityError> {
        match self.roles().find_by_name(role_name)? {
            Some(role) => roles::is_user_in_role(self.conn(), &user.id, &role.id),
            None => Ok(false),
        }
    }

    /// Members of a role, ordered by user name.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::RoleNotFound`] if the role does not exist.
    pub fn users_in_role(&self, role_name: &str) -> Result<Vec<User>, IdentityError> {
        let role = self.roles().require_by_name(role_name)?;
        roles::users_in_role(self.conn(), &role.id)
    }

    // -----------------------------------------------------------------------
    // Claims
    // -----------------------------------------------------------------------

    /// Attach a claim to the user.
    ///
    /// # Errors
    ///
    /// [`IdentityError::ConcurrencyFailure`] if `user` is stale.
    pub fn add_claim(&self, user: &User, claim: &Claim) -> Result<User, IdentityError> {
        let tx = self.conn().unchecked_transaction()?;
        let stored = users::update_user(&tx, user)?;
        claims::add_claim(&tx, ClaimOwner::User, &user.id, claim)?;
        tx.commit()?;
        Ok(stored)
    }

    /// Remove every copy of a claim from the user.
    ///
    /// # Errors
    ///
    /// [`IdentityError::ConcurrencyFailure`] if `user` is stale.
    pub fn remove_claim(&self, user: &User, claim: &Claim) -> Result<User, IdentityError> {
        let tx = self.conn().unchecked_transaction()?;
        let stored = users::update_user(&tx, user)?;
        claims::remove_claim(&tx, ClaimOwner::User, &user.id, claim)?;
        tx.commit()?;
        Ok(stored)
    }

    /// # Errors
    ///
    /// Returns [`IdentityError::Database`] if the query fails.
    pub fn get_claims(&self, user: &User) -> Result<Vec<Claim>, IdentityError> {
        claims::claims_for(self.conn(), ClaimOwner::User, &user.id)
    }
}
