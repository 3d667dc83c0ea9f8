//! User and role claims — typed key/value pairs attached to an identity.

use rusqlite::{params, Connection};

use crate::error::IdentityError;

/// A claim attached to a user or role.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Claim {
    pub claim_type: String,
    pub value: String,
}

impl Claim {
    /// Build a claim from its type and value.
    #[must_use]
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }
}

/// Which table a claim lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOwner {
    User,
    Role,
}

impl ClaimOwner {
    const fn table(self) -> &'static str {
        match self {
            Self::User => "user_claims",
            Self::Role => "role_claims",
        }
    }

    const fn owner_column(self) -> &'static str {
        match self {
            Self::User => "user_id",
            Self::Role => "role_id",
        }
    }
}

/// Attach a claim. Duplicates are allowed.
///
/// # Errors
///
/// Returns [`IdentityError::Database`] if the INSERT fails.
pub fn add_claim(
    conn: &Connection,
    owner: ClaimOwner,
    owner_id: &str,
    claim: &Claim,
) -> Result<(), IdentityError> {
    let sql = format!(
        "INSERT INTO {} ({}, claim_type, claim_value) VALUES (?1, ?2, ?3)",
        owner.table(),
        owner.owner_column()
    );
    conn.execute(&sql, params![owner_id, claim.claim_type, claim.value])
        .map_err(|e| IdentityError::Database(format!("failed to add claim: {e}")))?;
    Ok(())
}

/// Remove every copy of a claim. Returns the number of rows removed.
///
/// # Errors
///
/// Returns [`IdentityError::Database`] if the DELETE fails.
pub fn remove_claim(
    conn: &Connection,
    owner: ClaimOwner,
    owner_id: &str,
    claim: &Claim,
) -> Result<usize, IdentityError> {
    let sql = format!(
        "DELETE FROM {} WHERE {} = ?1 AND claim_type = ?2 AND claim_value = ?3",
        owner.table(),
        owner.owner_column()
    );
    conn.execute(&sql, params![owner_id, claim.claim_type, claim.value])
        .map_err(|e| IdentityError::Database(format!("failed to remove claim: {e}")))
}

/// Claims for one owner in insertion order.
///
/// # Errors
///
/// Returns [`IdentityError::Database`] if the query fails.
pub fn claims_for(
    conn: &Connection,
    owner: ClaimOwner,
    owner_id: &str,
) -> Result<Vec<Claim>, IdentityError> {
    let sql = format!(
        "SELECT claim_type, claim_value FROM {} WHERE {} = ?1 ORDER BY id",
        owner.table(),
        owner.owner_column()
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| IdentityError::Database(format!("failed to prepare claim query: {e}")))?;
    let rows = stmt
        .query_map(params![owner_id], |row| {
            Ok(Claim {
                claim_type: row.get(0)?,
                value: row.get(1)?,
            })
        })
        .map_err(|e| IdentityError::Database(format!("failed to query claims: {e}")))?;

    let mut claims = Vec::new();
    for row in rows {
        claims.push(row.map_err(|e| IdentityError::Database(format!("failed to read claim row: {e}")))?);
    }
    Ok(claims)
}
