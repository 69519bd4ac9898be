use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

use meetpulse_types::models::{ProfileFields, User};

use super::OptionalExt;
use crate::DbResult;
use crate::models::UserRow;

const USER_COLUMNS: &str = "id, email, name, phone, bio, is_admin, is_approved, created_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        phone: row.get(3)?,
        bio: row.get(4)?,
        is_admin: row.get(5)?,
        is_approved: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn insert_user(
    conn: &Connection,
    email: &str,
    profile: &ProfileFields,
    is_admin: bool,
    is_approved: bool,
    now: DateTime<Utc>,
) -> DbResult<User> {
    conn.execute(
        "INSERT INTO users (email, name, phone, bio, is_admin, is_approved, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            email,
            profile.name,
            profile.phone,
            profile.bio,
            is_admin,
            is_approved,
            now
        ],
    )?;

    Ok(User {
        id: conn.last_insert_rowid(),
        email: email.to_string(),
        name: profile.name.clone(),
        phone: profile.phone.clone(),
        bio: profile.bio.clone(),
        is_admin,
        is_approved,
        created_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: i64) -> DbResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let row = conn.query_row(&sql, [id], map_user).optional()?;
    Ok(row.map(User::from))
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> DbResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
    let row = conn.query_row(&sql, [email], map_user).optional()?;
    Ok(row.map(User::from))
}

/// All users, newest first.
pub fn list_users(conn: &Connection) -> DbResult<Vec<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], map_user)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().map(User::from).collect())
}

pub fn count_users(conn: &Connection) -> DbResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?)
}

pub fn count_pending(conn: &Connection) -> DbResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM users WHERE is_approved = 0",
        [],
        |r| r.get(0),
    )?)
}

pub fn count_admins(conn: &Connection) -> DbResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM users WHERE is_admin = 1", [], |r| {
        r.get(0)
    })?)
}

pub fn admin_emails(conn: &Connection) -> DbResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT email FROM users WHERE is_admin = 1 ORDER BY id")?;
    let rows = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn set_approved(conn: &Connection, id: i64, approved: bool) -> DbResult<usize> {
    Ok(conn.execute(
        "UPDATE users SET is_approved = ?2 WHERE id = ?1",
        params![id, approved],
    )?)
}

pub fn set_admin(conn: &Connection, id: i64, is_admin: bool) -> DbResult<usize> {
    Ok(conn.execute(
        "UPDATE users SET is_admin = ?2 WHERE id = ?1",
        params![id, is_admin],
    )?)
}

/// Deletes the user. Foreign keys cascade to their questions (and those
/// questions' votes), their question votes and their pulse votes.
pub fn delete_user(conn: &Connection, id: i64) -> DbResult<usize> {
    Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])?)
}

/// `(author_id, meeting_title)` for every meeting a user has asked in.
pub fn meetings_by_author(conn: &Connection) -> DbResult<Vec<(i64, String)>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT q.author_id, m.title
         FROM questions q
         JOIN meetings m ON m.id = q.meeting_id
         ORDER BY q.author_id, m.id",
    )?;
    let rows = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
