use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use meetpulse_types::models::{OtpPurpose, ProfileFields};

use super::{OptionalExt, parse_column};
use crate::DbResult;
use crate::models::ChallengeRow;

/// Store the live challenge for `(email, purpose)`, replacing any previous one
/// and resetting its attempt counter.
pub fn replace_challenge(
    conn: &Connection,
    email: &str,
    purpose: OtpPurpose,
    code_hash: &str,
    expires_at: DateTime<Utc>,
    staged: &ProfileFields,
    now: DateTime<Utc>,
) -> DbResult<()> {
    conn.execute(
        "INSERT INTO otp_challenges
             (email, purpose, code_hash, expires_at, attempt_count,
              staged_name, staged_phone, staged_bio, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7, ?8)
         ON CONFLICT (email, purpose) DO UPDATE SET
             code_hash     = excluded.code_hash,
             expires_at    = excluded.expires_at,
             attempt_count = 0,
             staged_name   = excluded.staged_name,
             staged_phone  = excluded.staged_phone,
             staged_bio    = excluded.staged_bio,
             created_at    = excluded.created_at",
        params![
            email,
            purpose.as_str(),
            code_hash,
            expires_at,
            staged.name,
            staged.phone,
            staged.bio,
            now
        ],
    )?;
    Ok(())
}

pub fn get_challenge(
    conn: &Connection,
    email: &str,
    purpose: OtpPurpose,
) -> DbResult<Option<ChallengeRow>> {
    let row = conn
        .query_row(
            "SELECT email, purpose, code_hash, expires_at, attempt_count,
                    staged_name, staged_phone, staged_bio, created_at
             FROM otp_challenges WHERE email = ?1 AND purpose = ?2",
            params![email, purpose.as_str()],
            |row| {
                Ok(ChallengeRow {
                    email: row.get(0)?,
                    purpose: parse_column(row, 1)?,
                    code_hash: row.get(2)?,
                    expires_at: row.get(3)?,
                    attempt_count: row.get(4)?,
                    staged_name: row.get(5)?,
                    staged_phone: row.get(6)?,
                    staged_bio: row.get(7)?,
                    created_at: row.get(8)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Bump the failed-attempt counter and return its new value.
pub fn increment_attempts(conn: &Connection, email: &str, purpose: OtpPurpose) -> DbResult<i64> {
    Ok(conn.query_row(
        "UPDATE otp_challenges SET attempt_count = attempt_count + 1
         WHERE email = ?1 AND purpose = ?2
         RETURNING attempt_count",
        params![email, purpose.as_str()],
        |r| r.get(0),
    )?)
}

pub fn delete_challenge(conn: &Connection, email: &str, purpose: OtpPurpose) -> DbResult<usize> {
    Ok(conn.execute(
        "DELETE FROM otp_challenges WHERE email = ?1 AND purpose = ?2",
        params![email, purpose.as_str()],
    )?)
}

pub fn delete_expired_challenges(conn: &Connection, now: DateTime<Utc>) -> DbResult<usize> {
    Ok(conn.execute(
        "DELETE FROM otp_challenges WHERE expires_at <= ?1",
        params![now],
    )?)
}
