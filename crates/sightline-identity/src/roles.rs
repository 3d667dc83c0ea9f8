//! Role rows and user-role memberships.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::IdentityError;
use crate::stamps::generate_stamp;
use crate::users::{is_unique_violation, map_user, User, USER_COLUMNS};

/// A named role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    /// Rotated on every write; used for optimistic concurrency.
    pub concurrency_stamp: String,
}

fn map_role(row: &Row<'_>) -> rusqlite::Result<Role> {
    Ok(Role {
        id: row.get(0)?,
        name: row.get(1)?,
        normalized_name: row.get(2)?,
        concurrency_stamp: row.get(3)?,
    })
}

/// Insert a new role row.
///
/// # Errors
///
/// Returns [`IdentityError::DuplicateRoleName`] if the normalized name is taken.
pub fn insert_role(conn: &Connection, role: &Role) -> Result<(), IdentityError> {
    conn.execute(
        "INSERT INTO roles (id, name, normalized_name, concurrency_stamp) VALUES (?1, ?2, ?3, ?4)",
        params![role.id, role.name, role.normalized_name, role.concurrency_stamp],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            IdentityError::DuplicateRoleName(role.name.clone())
        } else {
            IdentityError::Database(format!("failed to insert role: {e}"))
        }
    })?;
    Ok(())
}

/// Look up a role by id.
///
/// # Errors
///
/// Returns [`IdentityError::Database`] if the query fails.
pub fn find_role_by_id(conn: &Connection, id: &str) -> Result<Option<Role>, IdentityError> {
    conn.query_row(
        "SELECT id, name, normalized_name, concurrency_stamp FROM roles WHERE id = ?1",
        params![id],
        map_role,
    )
    .optional()
    .map_err(|e| IdentityError::Database(format!("failed to query role: {e}")))
}

/// Look up a role by normalized name.
///
/// # Errors
///
/// Returns [`IdentityError::Database`] if the query fails.
pub fn find_role_by_normalized_name(
    conn: &Connection,
    normalized_name: &str,
) -> Result<Option<Role>, IdentityError> {
    conn.query_row(
        "SELECT id, name, normalized_name, concurrency_stamp FROM roles WHERE normalized_name = ?1",
        params![normalized_name],
        map_role,
    )
    .optional()
    .map_err(|e| IdentityError::Database(format!("failed to query role: {e}")))
}

/// List all roles ordered by name.
///
/// # Errors
///
/// Returns [`IdentityError::Database`] if the query fails.
pub fn list_roles(conn: &Connection) -> Result<Vec<Role>, IdentityError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, normalized_name, concurrency_stamp FROM roles \
             ORDER BY normalized_name",
        )
        .map_err(|e| IdentityError::Database(format!("failed to prepare role query: {e}")))?;
    let rows = stmt
        .query_map([], map_role)
        .map_err(|e| IdentityError::Database(format!("failed to query roles: {e}")))?;

    let mut roles = Vec::new();
    for row in rows {
        roles.push(row.map_err(|e| IdentityError::Database(format!("failed to read role row: {e}")))?);
    }
    Ok(roles)
}

/// Rename a role, guarded by its concurrency stamp.
///
/// # Errors
///
/// - [`IdentityError::ConcurrencyFailure`] if the stored stamp differs.
/// - [`IdentityError::RoleNotFound`] if the row no longer exists.
/// - [`IdentityError::DuplicateRoleName`] if the new name collides.
pub fn update_role(conn: &Connection, role: &Role) -> Result<Role, IdentityError> {
    let new_stamp = generate_stamp();
    let updated = conn
        .execute(
            "UPDATE roles SET name = ?1, normalized_name = ?2, concurrency_stamp = ?3 \
             WHERE id = ?4 AND concurrency_stamp = ?5",
            params![
                role.name,
                role.normalized_name,
                new_stamp,
                role.id,
                role.concurrency_stamp
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                IdentityError::DuplicateRoleName(role.name.clone())
            } else {
                IdentityError::Database(format!("failed to update role: {e}"))
            }
        })?;

    if updated == 0 {
        return Err(missing_or_stale(conn, &role.id)?);
    }

    let mut stored = role.clone();
    stored.concurrency_stamp = new_stamp;
    Ok(stored)
}

/// Delete a role, guarded by its concurrency stamp. Memberships cascade.
///
/// # Errors
///
/// Same stamp and existence errors as [`update_role`].
pub fn delete_role(conn: &Connection, role: &Role) -> Result<(), IdentityError> {
    let deleted = conn
        .execute(
            "DELETE FROM roles WHERE id = ?1 AND concurrency_stamp = ?2",
            params![role.id, role.concurrency_stamp],
        )
        .map_err(|e| IdentityError::Database(format!("failed to delete role: {e}")))?;

    if deleted == 0 {
        return Err(missing_or_stale(conn, &role.id)?);
    }
    Ok(())
}

fn missing_or_stale(conn: &Connection, id: &str) -> Result<IdentityError, IdentityError> {
    Ok(if find_role_by_id(conn, id)?.is_some() {
        IdentityError::ConcurrencyFailure
    } else {
        IdentityError::RoleNotFound(id.to_string())
    })
}

// ---------------------------------------------------------------------------
// Memberships
// ---------------------------------------------------------------------------

/// Add a membership row.
///
/// # Errors
///
/// Returns [`IdentityError::UserAlreadyInRole`] if the row exists.
pub fn add_user_to_role(conn: &Connection, user_id: &str, role: &Role) -> Result<(), IdentityError> {
    conn.execute(
        "INSERT INTO user_roles (user_id, role_id) VALUES (?1, ?2)",
        params![user_id, role.id],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            IdentityError::UserAlreadyInRole(role.name.clone())
        } else {
            IdentityError::Database(format!("failed to add user to role: {e}"))
        }
    })?;
    Ok(())
}

/// Remove a membership row.
///
/// # Errors
///
/// Returns [`IdentityError::UserNotInRole`] if no row was removed.
pub fn remove_user_from_role(
    conn: &Connection,
    user_id: &str,
    role: &Role,
) -> Result<(), IdentityError> {
    let removed = conn
        .execute(
            "DELETE FROM user_roles WHERE user_id = ?1 AND role_id = ?2",
            params![user_id, role.id],
        )
        .map_err(|e| IdentityError::Database(format!("failed to remove user from role: {e}")))?;
    if removed == 0 {
        return Err(IdentityError::UserNotInRole(role.name.clone()));
    }
    Ok(())
}

/// Names of every role the user belongs to, sorted.
///
/// # Errors
///
/// Returns [`IdentityError::Database`] if the query fails.
pub fn role_names_for_user(conn: &Connection, user_id: &str) -> Result<Vec<String>, IdentityError> {
    let mut stmt = conn
        .prepare(
            "SELECT r.name FROM roles r \
             JOIN user_roles ur ON ur.role_id = r.id \
             WHERE ur.user_id = ?1 ORDER BY r.normalized_name",
        )
        .map_err(|e| IdentityError::Database(format!("failed to prepare role query: {e}")))?;
    let rows = stmt
        .query_map(params![user_id], |row| row.get::<_, String>(0))
        .map_err(|e| IdentityError::Database(format!("failed to query user roles: {e}")))?;

    let mut names = Vec::new();
    for row in rows {
        names.push(row.map_err(|e| IdentityError::Database(format!("failed to read role name: {e}")))?);
    }
    Ok(names)
}

/// `true` if the membership row exists.
///
/// # Errors
///
/// Returns [`IdentityError::Database`] if the query fails.
pub fn is_user_in_role(conn: &Connection, user_id: &str, role_id: &str) -> Result<bool, IdentityError> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM user_roles WHERE user_id = ?1 AND role_id = ?2)",
        params![user_id, role_id],
        |row| row.get(0),
    )
    .map_err(|e| IdentityError::Database(format!("failed to check membership: {e}")))
}

/// Every user in a role, ordered by user name.
///
/// # Errors
///
/// Returns [`IdentityError::Database`] if the query fails.
pub fn users_in_role(conn: &Connection, role_id: &str) -> Result<Vec<User>, IdentityError> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users \
         JOIN user_roles ur ON ur.user_id = users.id \
         WHERE ur.role_id = ?1 ORDER BY users.normalized_user_name"
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| IdentityError::Database(format!("failed to prepare member query: {e}")))?;
    let rows = stmt
        .query_map(params![role_id], map_user)
        .map_err(|e| IdentityError::Database(format!("failed to query members: {e}")))?;

    let mut users = Vec::new();
    for row in rows {
        users.push(row.map_err(|e| IdentityError::Database(format!("failed to read member: {e}")))?);
    }
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::IdentityDb;
    use crate::stamps::normalize_key;

    fn new_role(name: &str) -> Role {
        Role {
            id: generate_stamp(),
            name: name.into(),
            normalized_name: normalize_key(name),
            concurrency_stamp: generate_stamp(),
        }
    }

    #[test]
    fn insert_find_and_list() {
        let db = IdentityDb::open_in_memory().unwrap();
        let nurse = new_role("Nurse");
        insert_role(db.connection(), &nurse).unwrap();
        insert_role(db.connection(), &new_role("Admin")).unwrap();

        assert_eq!(
            find_role_by_normalized_name(db.connection(), "NURSE").unwrap(),
            Some(nurse.clone())
        );
        assert_eq!(find_role_by_id(db.connection(), &nurse.id).unwrap(), Some(nurse));

        let names: Vec<_> = list_roles(db.connection())
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, ["Admin", "Nurse"]);
    }

    #[test]
    fn duplicate_role_name_is_rejected() {
        let db = IdentityDb::open_in_memory().unwrap();
        insert_role(db.connection(), &new_role("Nurse")).unwrap();
        let err = insert_role(db.connection(), &new_role("nurse")).unwrap_err();
        assert!(matches!(err, IdentityError::DuplicateRoleName(_)));
    }

    #[test]
    fn stale_rename_is_a_concurrency_failure() {
        let db = IdentityDb::open_in_memory().unwrap();
        let role = new_role("Nurse");
        insert_role(db.connection(), &role).unwrap();

        let mut renamed = role.clone();
        renamed.name = "School Nurse".into();
        renamed.normalized_name = normalize_key(&renamed.name);
        update_role(db.connection(), &renamed).unwrap();

        assert!(matches!(
            update_role(db.connection(), &role).unwrap_err(),
            IdentityError::ConcurrencyFailure
        ));
        assert!(matches!(
            delete_role(db.connection(), &role).unwrap_err(),
            IdentityError::ConcurrencyFailure
        ));
    }

    #[test]
    fn delete_missing_role_is_not_found() {
        let db = IdentityDb::open_in_memory().unwrap();
        assert!(matches!(
            delete_role(db.connection(), &new_role("Ghost")).unwrap_err(),
            IdentityError::RoleNotFound(_)
        ));
    }

    fn member(db: &IdentityDb, name: &str) -> User {
        let user = User {
            id: generate_stamp(),
            user_name: name.into(),
            normalized_user_name: normalize_key(name),
            email: None,
            normalized_email: None,
            email_confirmed: false,
            password_hash: None,
            security_stamp: generate_stamp(),
            concurrency_stamp: generate_stamp(),
            lockout_enabled: true,
            lockout_end: None,
            access_failed_count: 0,
            created_at: 0,
        };
        crate::users::insert_user(db.connection(), &user).unwrap();
        user
    }

    #[test]
    fn users_in_role_returns_only_members_sorted_by_name() {
        let db = IdentityDb::open_in_memory().unwrap();
        let nurse = new_role("Nurse");
        let admin = new_role("Admin");
        insert_role(db.connection(), &nurse).unwrap();
        insert_role(db.connection(), &admin).unwrap();

        let zoe = member(&db, "zoe");
        let bob = member(&db, "Bob");
        let carol = member(&db, "carol");
        add_user_to_role(db.connection(), &zoe.id, &nurse).unwrap();
        add_user_to_role(db.connection(), &bob.id, &nurse).unwrap();
        add_user_to_role(db.connection(), &carol.id, &admin).unwrap();

        let members = users_in_role(db.connection(), &nurse.id).unwrap();
        assert_eq!(members, vec![bob, zoe]);
        assert!(users_in_role(db.connection(), "missing").unwrap().is_empty());
    }
}
