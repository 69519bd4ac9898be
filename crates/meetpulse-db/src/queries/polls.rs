use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

use super::OptionalExt;
use crate::DbResult;
use crate::models::{OptionRow, PollRow};

const POLL_COLUMNS: &str = "id, meeting_id, question_id, title, active, created_at, ended_at";

fn map_poll(row: &Row<'_>) -> rusqlite::Result<PollRow> {
    Ok(PollRow {
        id: row.get(0)?,
        meeting_id: row.get(1)?,
        question_id: row.get(2)?,
        title: row.get(3)?,
        active: row.get(4)?,
        created_at: row.get(5)?,
        ended_at: row.get(6)?,
    })
}

/// Close whatever poll is running in the meeting. Returns the number closed (0 or 1).
pub fn close_active(conn: &Connection, meeting_id: i64, now: DateTime<Utc>) -> DbResult<usize> {
    Ok(conn.execute(
        "UPDATE pulse_polls SET active = 0, ended_at = ?2 WHERE meeting_id = ?1 AND active = 1",
        params![meeting_id, now],
    )?)
}

pub fn insert_poll(
    conn: &Connection,
    meeting_id: i64,
    question_id: Option<i64>,
    title: &str,
    now: DateTime<Utc>,
) -> DbResult<i64> {
    conn.execute(
        "INSERT INTO pulse_polls (meeting_id, question_id, title, active, created_at)
         VALUES (?1, ?2, ?3, 1, ?4)",
        params![meeting_id, question_id, title, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_option(conn: &Connection, poll_id: i64, text: &str, sort_order: i64) -> DbResult<i64> {
    conn.execute(
        "INSERT INTO pulse_options (poll_id, text, sort_order) VALUES (?1, ?2, ?3)",
        params![poll_id, text, sort_order],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_poll(conn: &Connection, id: i64) -> DbResult<Option<PollRow>> {
    let sql = format!("SELECT {POLL_COLUMNS} FROM pulse_polls WHERE id = ?1");
    conn.query_row(&sql, [id], map_poll).optional()
}

/// The most recently started poll of a meeting, running or not.
pub fn latest_for_meeting(conn: &Connection, meeting_id: i64) -> DbResult<Option<PollRow>> {
    let sql = format!(
        "SELECT {POLL_COLUMNS} FROM pulse_polls WHERE meeting_id = ?1 ORDER BY id DESC LIMIT 1"
    );
    conn.query_row(&sql, [meeting_id], map_poll).optional()
}

/// The newest running poll across all meetings.
pub fn latest_active(conn: &Connection) -> DbResult<Option<PollRow>> {
    let sql = format!(
        "SELECT {POLL_COLUMNS} FROM pulse_polls WHERE active = 1 ORDER BY id DESC LIMIT 1"
    );
    conn.query_row(&sql, [], map_poll).optional()
}

pub fn count_active(conn: &Connection, meeting_id: i64) -> DbResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM pulse_polls WHERE meeting_id = ?1 AND active = 1",
        [meeting_id],
        |r| r.get(0),
    )?)
}

/// Mark a poll closed. A poll that is already closed keeps its original `ended_at`.
pub fn end_poll(conn: &Connection, poll_id: i64, now: DateTime<Utc>) -> DbResult<usize> {
    Ok(conn.execute(
        "UPDATE pulse_polls SET active = 0, ended_at = ?2 WHERE id = ?1 AND active = 1",
        params![poll_id, now],
    )?)
}

/// Options of a poll in display order, each with its current tally.
pub fn options_with_counts(conn: &Connection, poll_id: i64) -> DbResult<Vec<OptionRow>> {
    let mut stmt = conn.prepare(
        "SELECT o.id, o.poll_id, o.text, o.sort_order,
                (SELECT COUNT(*) FROM pulse_votes v WHERE v.option_id = o.id)
         FROM pulse_options o
         WHERE o.poll_id = ?1
         ORDER BY o.sort_order, o.id",
    )?;
    let rows = stmt
        .query_map([poll_id], |row| {
            Ok(OptionRow {
                id: row.get(0)?,
                poll_id: row.get(1)?,
                text: row.get(2)?,
                sort_order: row.get(3)?,
                votes: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// The poll an option belongs to.
pub fn poll_id_for_option(conn: &Connection, option_id: i64) -> DbResult<Option<i64>> {
    conn.query_row(
        "SELECT poll_id FROM pulse_options WHERE id = ?1",
        [option_id],
        |r| r.get(0),
    )
    .optional()
}

/// The option a user currently backs in a poll.
pub fn get_pulse_vote(conn: &Connection, poll_id: i64, user_id: i64) -> DbResult<Option<i64>> {
    conn.query_row(
        "SELECT option_id FROM pulse_votes WHERE poll_id = ?1 AND user_id = ?2",
        params![poll_id, user_id],
        |r| r.get(0),
    )
    .optional()
}

pub fn insert_pulse_vote(
    conn: &Connection,
    poll_id: i64,
    user_id: i64,
    option_id: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    conn.execute(
        "INSERT INTO pulse_votes (poll_id, user_id, option_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![poll_id, user_id, option_id, now],
    )?;
    Ok(())
}

/// Move a user's existing pulse vote to another option of the same poll.
pub fn move_pulse_vote(
    conn: &Connection,
    poll_id: i64,
    user_id: i64,
    option_id: i64,
    now: DateTime<Utc>,
) -> DbResult<usize> {
    Ok(conn.execute(
        "UPDATE pulse_votes SET option_id = ?3, updated_at = ?4
         WHERE poll_id = ?1 AND user_id = ?2",
        params![poll_id, user_id, option_id, now],
    )?)
}
