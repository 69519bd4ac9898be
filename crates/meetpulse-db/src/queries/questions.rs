use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

use super::OptionalExt;
use crate::DbResult;
use crate::models::QuestionRow;

const QUESTION_SELECT: &str = "SELECT q.id, q.meeting_id, m.title, q.author_id, u.name, u.email, q.text, q.created_at
     FROM questions q
     JOIN meetings m ON m.id = q.meeting_id
     JOIN users u ON u.id = q.author_id";

fn map_question(row: &Row<'_>) -> rusqlite::Result<QuestionRow> {
    Ok(QuestionRow {
        id: row.get(0)?,
        meeting_id: row.get(1)?,
        meeting_title: row.get(2)?,
        author_id: row.get(3)?,
        author_name: row.get(4)?,
        author_email: row.get(5)?,
        text: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn collect(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> DbResult<Vec<QuestionRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_question)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn insert_question(
    conn: &Connection,
    meeting_id: i64,
    author_id: i64,
    text: &str,
    now: DateTime<Utc>,
) -> DbResult<i64> {
    conn.execute(
        "INSERT INTO questions (meeting_id, author_id, text, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![meeting_id, author_id, text, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_question(conn: &Connection, id: i64) -> DbResult<Option<QuestionRow>> {
    let sql = format!("{QUESTION_SELECT} WHERE q.id = ?1");
    conn.query_row(&sql, [id], map_question).optional()
}

/// Questions of one meeting in insertion order.
pub fn list_for_meeting(conn: &Connection, meeting_id: i64) -> DbResult<Vec<QuestionRow>> {
    let sql = format!("{QUESTION_SELECT} WHERE q.meeting_id = ?1 ORDER BY q.id ASC");
    collect(conn, &sql, [meeting_id])
}

/// Questions across all meetings (or one, when `meeting_id` is set), newest first.
pub fn list_all(conn: &Connection, meeting_id: Option<i64>) -> DbResult<Vec<QuestionRow>> {
    let sql = format!(
        "{QUESTION_SELECT} WHERE (?1 IS NULL OR q.meeting_id = ?1) ORDER BY q.id DESC"
    );
    collect(conn, &sql, [meeting_id])
}

/// Questions written by one user, newest first.
pub fn list_by_author(conn: &Connection, author_id: i64) -> DbResult<Vec<QuestionRow>> {
    let sql = format!("{QUESTION_SELECT} WHERE q.author_id = ?1 ORDER BY q.id DESC");
    collect(conn, &sql, [author_id])
}

/// Deletes the question; its votes cascade and pinned polls lose their reference.
pub fn delete_question(conn: &Connection, id: i64) -> DbResult<usize> {
    Ok(conn.execute("DELETE FROM questions WHERE id = ?1", [id])?)
}
