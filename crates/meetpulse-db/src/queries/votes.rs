use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

use meetpulse_types::models::VoteType;

use super::{OptionalExt, parse_column, placeholders};
use crate::DbResult;
use crate::models::VoteRow;

const VOTE_SELECT: &str = "SELECT v.question_id, v.user_id, v.vote_type,
            COALESCE(NULLIF(TRIM(u.name), ''), u.email), v.created_at
     FROM question_votes v
     JOIN users u ON u.id = v.user_id";

fn map_vote(row: &Row<'_>) -> rusqlite::Result<VoteRow> {
    Ok(VoteRow {
        question_id: row.get(0)?,
        user_id: row.get(1)?,
        vote_type: parse_column(row, 2)?,
        voter_name: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn get_vote(conn: &Connection, question_id: i64, user_id: i64) -> DbResult<Option<VoteType>> {
    conn.query_row(
        "SELECT vote_type FROM question_votes WHERE question_id = ?1 AND user_id = ?2",
        params![question_id, user_id],
        |row| parse_column(row, 0),
    )
    .optional()
}

pub fn insert_vote(
    conn: &Connection,
    question_id: i64,
    user_id: i64,
    vote_type: VoteType,
    now: DateTime<Utc>,
) -> DbResult<()> {
    conn.execute(
        "INSERT INTO question_votes (question_id, user_id, vote_type, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![question_id, user_id, vote_type.as_str(), now],
    )?;
    Ok(())
}

/// Flip an existing vote in place. The voter moves to the end of the new
/// direction's list.
pub fn update_vote(
    conn: &Connection,
    question_id: i64,
    user_id: i64,
    vote_type: VoteType,
    now: DateTime<Utc>,
) -> DbResult<usize> {
    Ok(conn.execute(
        "UPDATE question_votes SET vote_type = ?3, created_at = ?4
         WHERE question_id = ?1 AND user_id = ?2",
        params![question_id, user_id, vote_type.as_str(), now],
    )?)
}

pub fn delete_vote(conn: &Connection, question_id: i64, user_id: i64) -> DbResult<usize> {
    Ok(conn.execute(
        "DELETE FROM question_votes WHERE question_id = ?1 AND user_id = ?2",
        params![question_id, user_id],
    )?)
}

/// Votes on one question in the order they were cast.
pub fn votes_for_question(conn: &Connection, question_id: i64) -> DbResult<Vec<VoteRow>> {
    let sql = format!("{VOTE_SELECT} WHERE v.question_id = ?1 ORDER BY v.created_at, v.rowid");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([question_id], map_vote)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Batch-fetch votes for a set of question IDs.
pub fn votes_for_questions(conn: &Connection, question_ids: &[i64]) -> DbResult<Vec<VoteRow>> {
    if question_ids.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        "{VOTE_SELECT} WHERE v.question_id IN ({}) ORDER BY v.created_at, v.rowid",
        placeholders(question_ids.len())
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::types::ToSql> = question_ids
        .iter()
        .map(|id| id as &dyn rusqlite::types::ToSql)
        .collect();

    let rows = stmt
        .query_map(params.as_slice(), map_vote)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
