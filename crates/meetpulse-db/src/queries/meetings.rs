use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

use meetpulse_types::models::Meeting;

use super::OptionalExt;
use crate::DbResult;
use crate::models::MeetingRow;

fn map_meeting(row: &Row<'_>) -> rusqlite::Result<MeetingRow> {
    Ok(MeetingRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        is_visible: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn insert_meeting(
    conn: &Connection,
    title: &str,
    description: Option<&str>,
    created_by: i64,
    now: DateTime<Utc>,
) -> DbResult<Meeting> {
    conn.execute(
        "INSERT INTO meetings (title, description, is_visible, created_by, created_at)
         VALUES (?1, ?2, 1, ?3, ?4)",
        params![title, description, created_by, now],
    )?;

    Ok(Meeting {
        id: conn.last_insert_rowid(),
        title: title.to_string(),
        description: description.map(str::to_string),
        is_visible: true,
        created_at: now,
    })
}

pub fn get_meeting(conn: &Connection, id: i64) -> DbResult<Option<Meeting>> {
    let row = conn
        .query_row(
            "SELECT id, title, description, is_visible, created_at FROM meetings WHERE id = ?1",
            [id],
            map_meeting,
        )
        .optional()?;
    Ok(row.map(Meeting::from))
}

/// Meetings, newest first. Hidden meetings are skipped unless `include_hidden`.
pub fn list_meetings(conn: &Connection, include_hidden: bool) -> DbResult<Vec<Meeting>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, is_visible, created_at FROM meetings
         WHERE ?1 OR is_visible = 1
         ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt
        .query_map([include_hidden], map_meeting)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().map(Meeting::from).collect())
}

pub fn set_visibility(conn: &Connection, id: i64, visible: bool) -> DbResult<usize> {
    Ok(conn.execute(
        "UPDATE meetings SET is_visible = ?2 WHERE id = ?1",
        params![id, visible],
    )?)
}
