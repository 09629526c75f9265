use bcrypt::{hash, verify, BcryptError};
use chrono::Utc;
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension};

use crate::models::{ActingUser, Member};

fn bcrypt_to_rusqlite_error(e: BcryptError) -> RusqliteError {
    RusqliteError::ToSqlConversionFailure(Box::new(e))
}

pub fn create_user(
    conn: &Connection,
    username: &str,
    password: &str,
    role: &str,
) -> Result<i64, RusqliteError> {
    create_user_with_cost(conn, username, password, role, bcrypt::DEFAULT_COST)
}

pub fn create_user_with_cost(
    conn: &Connection,
    username: &str,
    password: &str,
    role: &str,
    cost: u32,
) -> Result<i64, RusqliteError> {
    let hashed_password = hash(password, cost).map_err(bcrypt_to_rusqlite_error)?;
    conn.execute(
        "INSERT INTO users (username, password_hash, role, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![username, hashed_password, role, Utc::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_all_users(conn: &Connection) -> Result<Vec<Member>, RusqliteError> {
    let mut stmt = conn.prepare("SELECT id, username, role, is_active, created_at FROM users ORDER BY id")?;
    let user_iter = stmt.query_map([], |row| {
        Ok(Member {
            id: row.get(0)?,
            username: row.get(1)?,
            role: row.get(2)?,
            is_active: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;

    let users = user_iter.filter_map(|u| u.ok()).collect();
    Ok(users)
}

pub fn read_username_by_id(conn: &Connection, user_id: i64) -> Result<Option<String>, RusqliteError> {
    conn.query_row("SELECT username FROM users WHERE id = ?1", [user_id], |row| row.get(0))
        .optional()
}

/// Returns the session identity for valid credentials of an active account.
pub fn verify_credentials(conn: &Connection, username: &str, password: &str) -> Option<ActingUser> {
    let res: rusqlite::Result<(i64, String, String, bool)> = conn.query_row(
        "SELECT id, password_hash, role, is_active FROM users WHERE username = ?1",
        [username],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    );

    if let Ok((id, hash, role, is_active)) = res {
        if is_active && verify(password, &hash).unwrap_or(false) {
            return Some(ActingUser { id, username: username.to_string(), role });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::db_setup::test_pool;

    #[test]
    fn credentials_round_trip_and_inactive_accounts_are_refused() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = create_user_with_cost(&conn, "alice", "s3cret", "member", 4).unwrap();

        let user = verify_credentials(&conn, "alice", "s3cret").unwrap();
        assert_eq!(user, ActingUser { id, username: "alice".into(), role: "member".into() });
        assert!(verify_credentials(&conn, "alice", "wrong").is_none());
        assert!(verify_credentials(&conn, "bob", "s3cret").is_none());

        conn.execute("UPDATE users SET is_active = 0 WHERE id = ?1", [id]).unwrap();
        assert!(verify_credentials(&conn, "alice", "s3cret").is_none());
    }

    #[test]
    fn unknown_roles_are_rejected() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        assert!(create_user_with_cost(&conn, "mallory", "pw", "root", 4).is_err());
        assert_eq!(read_username_by_id(&conn, 42).unwrap(), None);
    }
}
