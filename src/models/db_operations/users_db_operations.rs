use std::collections::HashSet;

use bcrypt::{hash, verify};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use uuid::Uuid;

use super::DbError;
use crate::models::{Identity, Profile, Role};

fn insert_identity(
    tx: &Transaction,
    email: &str,
    password: &str,
    full_name: Option<&str>,
) -> Result<Identity, DbError> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let hashed_password = hash(password, bcrypt::DEFAULT_COST)?;
    tx.execute(
        "INSERT INTO identities (id, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, email, hashed_password, now],
    )?;
    // Every identity gets its profile row at registration time.
    tx.execute(
        "INSERT INTO profiles (id, user_id, email, full_name, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![Uuid::new_v4().to_string(), id, email, full_name, now],
    )?;
    Ok(Identity { id, email: email.to_string() })
}

/// Registers an identity with its profile. No role is granted.
pub fn register_identity(
    conn: &mut Connection,
    email: &str,
    password: &str,
    full_name: Option<&str>,
) -> Result<Identity, DbError> {
    create_identity_with_role(conn, email, password, full_name, None)
}

/// Identity, profile and optional initial role, all in one transaction.
pub fn create_identity_with_role(
    conn: &mut Connection,
    email: &str,
    password: &str,
    full_name: Option<&str>,
    role: Option<Role>,
) -> Result<Identity, DbError> {
    let tx = conn.transaction()?;
    let identity = insert_identity(&tx, email, password, full_name)?;
    if let Some(role) = role {
        tx.execute(
            "INSERT INTO user_roles (user_id, role) VALUES (?1, ?2)",
            params![identity.id, role.as_str()],
        )?;
    }
    tx.commit()?;
    Ok(identity)
}

pub fn verify_credentials(conn: &Connection, email: &str, password: &str) -> Option<Identity> {
    let res: rusqlite::Result<(String, String, String)> = conn.query_row(
        "SELECT id, email, password_hash FROM identities WHERE email = ?1",
        [email],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    );

    if let Ok((id, stored_email, password_hash)) = res {
        if verify(password, &password_hash).unwrap_or(false) {
            return Some(Identity { id, email: stored_email });
        }
    }
    None
}

pub fn read_identity(conn: &Connection, user_id: &str) -> Result<Option<Identity>, DbError> {
    Ok(conn
        .query_row(
            "SELECT id, email FROM identities WHERE id = ?1",
            [user_id],
            |row| Ok(Identity { id: row.get(0)?, email: row.get(1)? }),
        )
        .optional()?)
}

pub fn read_identity_by_email(conn: &Connection, email: &str) -> Result<Option<Identity>, DbError> {
    Ok(conn
        .query_row(
            "SELECT id, email FROM identities WHERE email = ?1",
            [email],
            |row| Ok(Identity { id: row.get(0)?, email: row.get(1)? }),
        )
        .optional()?)
}

pub fn change_password(conn: &Connection, email: &str, new_password: &str) -> Result<usize, DbError> {
    let hashed_password = hash(new_password, bcrypt::DEFAULT_COST)?;
    Ok(conn.execute(
        "UPDATE identities SET password_hash = ?1 WHERE email = ?2",
        params![hashed_password, email],
    )?)
}

pub fn read_all_profiles(conn: &Connection) -> Result<Vec<Profile>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, email, full_name, created_at FROM profiles ORDER BY created_at DESC",
    )?;
    let profiles = stmt
        .query_map([], |row| {
            Ok(Profile {
                id: row.get(0)?,
                user_id: row.get(1)?,
                email: row.get(2)?,
                full_name: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(profiles)
}

pub fn count_profiles(conn: &Connection) -> Result<i64, DbError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?)
}

/// All identity ids holding `role`, fetched in one query.
pub fn read_role_holders(conn: &Connection, role: Role) -> Result<HashSet<String>, DbError> {
    let mut stmt = conn.prepare("SELECT user_id FROM user_roles WHERE role = ?1")?;
    let ids = stmt
        .query_map([role.as_str()], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(ids)
}

pub fn has_role(conn: &Connection, user_id: &str, role: Role) -> Result<bool, DbError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM user_roles WHERE user_id = ?1 AND role = ?2)",
        params![user_id, role.as_str()],
        |row| row.get(0),
    )?)
}

/// Grants `role`. Granting a role the user already holds is a no-op.
pub fn grant_role(conn: &Connection, user_id: &str, role: Role) -> Result<(), DbError> {
    conn.execute(
        "INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?1, ?2)",
        params![user_id, role.as_str()],
    )?;
    Ok(())
}

/// Revokes `role` from `target_id` on behalf of `actor_id`.
///
/// Runs as one immediate transaction whose preconditions are checked against
/// the committed table: the actor may not demote themselves, and the actor
/// must still hold the role. Two admins revoking each other concurrently
/// therefore cannot both succeed.
pub fn revoke_role(conn: &mut Connection, actor_id: &str, target_id: &str, role: Role) -> Result<usize, DbError> {
    if actor_id == target_id {
        return Err(DbError::Precondition("an admin cannot remove their own role".to_string()));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let actor_holds_role: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM user_roles WHERE user_id = ?1 AND role = ?2)",
        params![actor_id, role.as_str()],
        |row| row.get(0),
    )?;
    if !actor_holds_role {
        return Err(DbError::Precondition(format!("acting user no longer holds the '{}' role", role.as_str())));
    }

    let removed = tx.execute(
        "DELETE FROM user_roles WHERE user_id = ?1 AND role = ?2",
        params![target_id, role.as_str()],
    )?;
    tx.commit()?;
    Ok(removed)
}

/// Removes `role` with no actor checks. Operator use from the setup CLI only.
pub fn remove_role(conn: &Connection, user_id: &str, role: Role) -> Result<usize, DbError> {
    Ok(conn.execute(
        "DELETE FROM user_roles WHERE user_id = ?1 AND role = ?2",
        params![user_id, role.as_str()],
    )?)
}

/// Emails of every identity holding `role`, for the setup CLI.
pub fn read_role_holder_emails(conn: &Connection, role: Role) -> Result<Vec<String>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT i.email FROM identities i JOIN user_roles r ON r.user_id = i.id
         WHERE r.role = ?1 ORDER BY i.email",
    )?;
    let emails = stmt
        .query_map([role.as_str()], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(emails)
}
