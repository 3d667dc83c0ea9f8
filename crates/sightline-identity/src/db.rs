//! `SQLite` connection and migration runner for the identity store.

use std::fmt;
use std::path::Path;

use rusqlite::Connection;

use crate::error::IdentityError;

// ---------------------------------------------------------------------------
// Embedded migrations
// ---------------------------------------------------------------------------

/// Forward-only SQL migrations, embedded at compile time.
/// Index 0 → version 1, index 1 → version 2, etc.
const MIGRATIONS: &[&str] = &[include_str!("../migrations/001_identity_schema.sql")];

// ---------------------------------------------------------------------------
// IdentityDb
// ---------------------------------------------------------------------------

/// Handle to an open, migrated identity database.
///
/// All identity I/O flows through the wrapped [`rusqlite::Connection`].
pub struct IdentityDb {
    conn: Connection,
}

impl fmt::Debug for IdentityDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdentityDb(..)")
    }
}

impl IdentityDb {
    /// Open (or create) an identity database at `path`.
    ///
    /// Enables WAL journaling and foreign keys, then applies pending migrations.
    ///
    /// # Errors
    ///
    /// - [`IdentityError::Database`] if the file cannot be opened.
    /// - [`IdentityError::Migration`] if a migration fails.
    pub fn open(path: &Path) -> Result<Self, IdentityError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::init(conn)
    }

    /// Open a private in-memory database. Contents vanish on drop.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn open_in_memory() -> Result<Self, IdentityError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, IdentityError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let mut db = Self { conn };
        db.run_migrations()?;
        tracing::debug!(schema_version = db.schema_version()?, "identity database ready");
        Ok(db)
    }

    /// Returns a reference to the underlying [`rusqlite::Connection`].
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Returns the current schema version (`PRAGMA user_version`).
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Database`] if the pragma query fails.
    pub fn schema_version(&self) -> Result<i32, IdentityError> {
        let v: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(v)
    }

    /// Apply all pending migrations, one transaction each.
    fn run_migrations(&mut self) -> Result<(), IdentityError> {
        let current = self.schema_version()?;

        for (idx, sql) in MIGRATIONS.iter().enumerate() {
            let version = idx
                .checked_add(1)
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(|| IdentityError::Migration("migration index overflow".into()))?;

            if version <= current {
                continue;
            }

            let tx = self.conn.transaction().map_err(|e| {
                IdentityError::Migration(format!(
                    "failed to start transaction for migration {version}: {e}"
                ))
            })?;

            tx.execute_batch(sql)
                .map_err(|e| IdentityError::Migration(format!("migration {version} failed: {e}")))?;

            tx.pragma_update(None, "user_version", version)
                .map_err(|e| {
                    IdentityError::Migration(format!(
                        "failed to update user_version to {version}: {e}"
                    ))
                })?;

            tx.commit().map_err(|e| {
                IdentityError::Migration(format!("failed to commit migration {version}: {e}"))
            })?;

            tracing::info!(version, "applied identity migration");
        }

        Ok(())
    }
}
