//! User rows — insert, lookup, stamp-checked update, delete.
//!
//! Every write bumps `concurrency_stamp`. Updates and deletes match on the
//! stamp the caller read; a mismatch means another writer got there first.

use std::fmt;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::IdentityError;
use crate::stamps::{generate_stamp, unix_now};

/// A stored user account.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub user_name: String,
    pub normalized_user_name: String,
    pub email: Option<String>,
    pub normalized_email: Option<String>,
    pub email_confirmed: bool,
    /// Base64 password envelope, or `None` for password-less accounts.
    pub password_hash: Option<String>,
    /// Rotated whenever credentials change.
    pub security_stamp: String,
    /// Rotated on every write; used for optimistic concurrency.
    pub concurrency_stamp: String,
    pub lockout_enabled: bool,
    /// Unix seconds until which sign-in is refused.
    pub lockout_end: Option<i64>,
    pub access_failed_count: u32,
    /// Unix seconds.
    pub created_at: i64,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("user_name", &self.user_name)
            .field("email", &self.email)
            .field("has_password", &self.password_hash.is_some())
            .field("lockout_end", &self.lockout_end)
            .field("access_failed_count", &self.access_failed_count)
            .finish_non_exhaustive()
    }
}

impl User {
    /// `false` for password-less accounts.
    #[must_use]
    pub const fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// `true` if lockout is enabled and the lockout end is in the future.
    #[must_use]
    pub fn is_locked_out(&self) -> bool {
        self.locked_until(unix_now()).is_some()
    }

    /// Lockout end, if the account is locked at `now`.
    #[must_use]
    pub fn locked_until(&self, now: i64) -> Option<i64> {
        self.lockout_end
            .filter(|&end| self.lockout_enabled && end > now)
    }
}

pub(crate) const USER_COLUMNS: &str = "id, user_name, normalized_user_name, email, normalized_email, \
     email_confirmed, password_hash, security_stamp, concurrency_stamp, lockout_enabled, \
     lockout_end, access_failed_count, created_at";

pub(crate) fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        user_name: row.get(1)?,
        normalized_user_name: row.get(2)?,
        email: row.get(3)?,
        normalized_email: row.get(4)?,
        email_confirmed: row.get(5)?,
        password_hash: row.get(6)?,
        security_stamp: row.get(7)?,
        concurrency_stamp: row.get(8)?,
        lockout_enabled: row.get(9)?,
        lockout_end: row.get(10)?,
        access_failed_count: row.get(11)?,
        created_at: row.get(12)?,
    })
}

/// Insert a new user row as-is.
///
/// # Errors
///
/// Returns [`IdentityError::DuplicateUserName`] if the normalized name is
/// taken, or [`IdentityError::Database`] for other failures.
pub fn insert_user(conn: &Connection, user: &User) -> Result<(), IdentityError> {
    conn.execute(
        "INSERT INTO users (id, user_name, normalized_user_name, email, normalized_email, \
         email_confirmed, password_hash, security_stamp, concurrency_stamp, lockout_enabled, \
         lockout_end, access_failed_count, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            user.id,
            user.user_name,
            user.normalized_user_name,
            user.email,
            user.normalized_email,
            user.email_confirmed,
            user.password_hash,
            user.security_stamp,
            user.concurrency_stamp,
            user.lockout_enabled,
            user.lockout_end,
            user.access_failed_count,
            user.created_at,
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            IdentityError::DuplicateUserName(user.user_name.clone())
        } else {
            IdentityError::Database(format!("failed to insert user: {e}"))
        }
    })?;
    Ok(())
}

/// Look up a user by id.
///
/// # Errors
///
/// Returns [`IdentityError::Database`] if the query fails.
pub fn find_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>, IdentityError> {
    find_one(conn, "id", id)
}

/// Look up a user by normalized user name.
///
/// # Errors
///
/// Returns [`IdentityError::Database`] if the query fails.
pub fn find_user_by_normalized_name(
    conn: &Connection,
    normalized_user_name: &str,
) -> Result<Option<User>, IdentityError> {
    find_one(conn, "normalized_user_name", normalized_user_name)
}

/// Look up the first user with a normalized email.
///
/// # Errors
///
/// Returns [`IdentityError::Database`] if the query fails.
pub fn find_user_by_normalized_email(
    conn: &Connection,
    normalized_email: &str,
) -> Result<Option<User>, IdentityError> {
    find_one(conn, "normalized_email", normalized_email)
}

fn find_one(conn: &Connection, column: &str, value: &str) -> Result<Option<User>, IdentityError> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1 ORDER BY created_at, id LIMIT 1"
    );
    conn.query_row(&sql, params![value], map_user)
        .optional()
        .map_err(|e| IdentityError::Database(format!("failed to query user: {e}")))
}

/// List all users ordered by user name.
///
/// # Errors
///
/// Returns [`IdentityError::Database`] if the query fails.
pub fn list_users(conn: &Connection) -> Result<Vec<User>, IdentityError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY normalized_user_name");
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| IdentityError::Database(format!("failed to prepare user query: {e}")))?;
    let rows = stmt
        .query_map([], map_user)
        .map_err(|e| IdentityError::Database(format!("failed to query users: {e}")))?;

    let mut users = Vec::new();
    for row in rows {
        users.push(row.map_err(|e| IdentityError::Database(format!("failed to read user row: {e}")))?);
    }
    Ok(users)
}

/// Write every mutable column of `user`, guarded by its concurrency stamp.
///
/// Returns the stored user carrying the new concurrency stamp.
///
/// # Errors
///
/// - [`IdentityError::ConcurrencyFailure`] if the stored stamp differs.
/// - [`IdentityError::UserNotFound`] if the row no longer exists.
/// - [`IdentityError::DuplicateUserName`] if a rename collides.
pub fn update_user(conn: &Connection, user: &User) -> Result<User, IdentityError> {
    let new_stamp = generate_stamp();
    let updated = conn
        .execute(
            "UPDATE users SET user_name = ?1, normalized_user_name = ?2, email = ?3, \
             normalized_email = ?4, email_confirmed = ?5, password_hash = ?6, \
             security_stamp = ?7, concurrency_stamp = ?8, lockout_enabled = ?9, \
             lockout_end = ?10, access_failed_count = ?11 \
             WHERE id = ?12 AND concurrency_stamp = ?13",
            params![
                user.user_name,
                user.normalized_user_name,
                user.email,
                user.normalized_email,
                user.email_confirmed,
                user.password_hash,
                user.security_stamp,
                new_stamp,
                user.lockout_enabled,
                user.lockout_end,
                user.access_failed_count,
                user.id,
                user.concurrency_stamp,
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                IdentityError::DuplicateUserName(user.user_name.clone())
            } else {
                IdentityError::Database(format!("failed to update user: {e}"))
            }
        })?;

    if updated == 0 {
        return Err(missing_or_stale(conn, &user.id)?);
    }

    let mut stored = user.clone();
    stored.concurrency_stamp = new_stamp;
    Ok(stored)
}

/// Delete a user, guarded by its concurrency stamp.
///
/// Role memberships and claims cascade.
///
/// # Errors
///
/// Same stamp and existence errors as [`update_user`].
pub fn delete_user(conn: &Connection, user: &User) -> Result<(), IdentityError> {
    let deleted = conn
        .execute(
            "DELETE FROM users WHERE id = ?1 AND concurrency_stamp = ?2",
            params![user.id, user.concurrency_stamp],
        )
        .map_err(|e| IdentityError::Database(format!("failed to delete user: {e}")))?;

    if deleted == 0 {
        return Err(missing_or_stale(conn, &user.id)?);
    }
    Ok(())
}

fn missing_or_stale(conn: &Connection, id: &str) -> Result<IdentityError, IdentityError> {
    let exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )
        .map_err(|e| IdentityError::Database(format!("failed to check user: {e}")))?;
    Ok(if exists {
        IdentityError::ConcurrencyFailure
    } else {
        IdentityError::UserNotFound(id.to_string())
    })
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
