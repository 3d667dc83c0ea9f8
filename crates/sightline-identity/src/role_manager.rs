//! Role administration — create, rename, delete, and role claims.

use rusqlite::Connection;

use crate::claims::{self, Claim, ClaimOwner};
use crate::db::IdentityDb;
use crate::error::IdentityError;
use crate::roles::{self, Role};
use crate::stamps::{generate_stamp, normalize_key};

/// Role operations over a borrowed identity database.
#[derive(Debug, Clone, Copy)]
pub struct RoleManager<'a> {
    conn: &'a Connection,
}

impl<'a> RoleManager<'a> {
    /// Borrow `db` for role operations.
    #[must_use]
    pub const fn new(db: &'a IdentityDb) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// Create a role.
    ///
    /// # Errors
    ///
    /// - [`IdentityError::InvalidRoleName`] if `name` is blank.
    /// - [`IdentityError::DuplicateRoleName`] if the normalized name exists.
    pub fn create_role(&self, name: &str) -> Result<Role, IdentityError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IdentityError::InvalidRoleName);
        }
        let role = Role {
            id: generate_stamp(),
            name: name.to_string(),
            normalized_name: normalize_key(name),
            concurrency_stamp: generate_stamp(),
        };
        roles::insert_role(self.conn, &role)?;
        tracing::info!(role_id = %role.id, role = %role.name, "role created");
        Ok(role)
    }

    /// # Errors
    ///
    /// Returns [`IdentityError::Database`] if the query fails.
    pub fn find_by_id(&self, id: &str) -> Result<Option<Role>, IdentityError> {
        roles::find_role_by_id(self.conn, id)
    }

    /// Case-insensitive lookup by name.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Database`] if the query fails.
    pub fn find_by_name(&self, name: &str) -> Result<Option<Role>, IdentityError> {
        roles::find_role_by_normalized_name(self.conn, &normalize_key(name))
    }

    /// Like [`find_by_name`](Self::find_by_name) but missing is an error.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::RoleNotFound`] if no role matches.
    pub fn require_by_name(&self, name: &str) -> Result<Role, IdentityError> {
        self.find_by_name(name)?
            .ok_or_else(|| IdentityError::RoleNotFound(name.to_string()))
    }

    /// # Errors
    ///
    /// Returns [`IdentityError::Database`] if the query fails.
    pub fn list_roles(&self) -> Result<Vec<Role>, IdentityError> {
        roles::list_roles(self.conn)
    }

    /// Rename a role read earlier.
    ///
    /// # Errors
    ///
    /// - [`IdentityError::InvalidRoleName`] if `new_name` is blank.
    /// - [`IdentityError::ConcurrencyFailure`] if `role` is stale.
    /// - [`IdentityError::DuplicateRoleName`] if the name collides.
    pub fn rename_role(&self, role: &Role, new_name: &str) -> Result<Role, IdentityError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(IdentityError::InvalidRoleName);
        }
        let mut renamed = role.clone();
        renamed.name = new_name.to_string();
        renamed.normalized_name = normalize_key(new_name);
        roles::update_role(self.conn, &renamed)
    }

    /// Delete a role read earlier. Memberships and role claims cascade.
    ///
    /// # Errors
    ///
    /// - [`IdentityError::ConcurrencyFailure`] if `role` is stale.
    /// - [`IdentityError::RoleNotFound`] if it was already deleted.
    pub fn delete_role(&self, role: &Role) -> Result<(), IdentityError> {
        roles::delete_role(self.conn, role)?;
        tracing::info!(role_id = %role.id, "role deleted");
        Ok(())
    }

    /// Attach a claim to a role, bumping its concurrency stamp.
    ///
    /// # Errors
    ///
    /// - [`IdentityError::ConcurrencyFailure`] if `role` is stale.
    pub fn add_claim(&self, role: &Role, claim: &Claim) -> Result<Role, IdentityError> {
        let tx = self.conn.unchecked_transaction()?;
        let stored = roles::update_role(&tx, role)?;
        claims::add_claim(&tx, ClaimOwner::Role, &role.id, claim)?;
        tx.commit()?;
        Ok(stored)
    }

    /// Remove every copy of a claim from a role, bumping its concurrency stamp.
    ///
    /// # Errors
    ///
    /// - [`IdentityError::ConcurrencyFailure`] if `role` is stale.
    pub fn remove_claim(&self, role: &Role, claim: &Claim) -> Result<Role, IdentityError> {
        let tx = self.conn.unchecked_transaction()?;
        let stored = roles::update_role(&tx, role)?;
        claims::remove_claim(&tx, ClaimOwner::Role, &role.id, claim)?;
        tx.commit()?;
        Ok(stored)
    }

    /// # Errors
    ///
    /// Returns [`IdentityError::Database`] if the query fails.
    pub fn get_claims(&self, role: &Role) -> Result<Vec<Claim>, IdentityError> {
        claims::claims_for(self.conn, ClaimOwner::Role, &role.id)
    }
}
