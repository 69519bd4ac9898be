//! Database row types. These map directly to SQLite rows; rows that have a
//! one-to-one domain counterpart convert into the `meetpulse-types` models.

use chrono::{DateTime, Utc};

use meetpulse_types::models::{Meeting, OtpPurpose, User, VoteType};

pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub is_admin: bool,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            name: row.name,
            phone: row.phone,
            bio: row.bio,
            is_admin: row.is_admin,
            is_approved: row.is_approved,
            created_at: row.created_at,
        }
    }
}

pub struct ChallengeRow {
    pub email: String,
    pub purpose: OtpPurpose,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub attempt_count: i64,
    pub staged_name: Option<String>,
    pub staged_phone: Option<String>,
    pub staged_bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct MeetingRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
}

impl From<MeetingRow> for Meeting {
    fn from(row: MeetingRow) -> Self {
        Meeting {
            id: row.id,
            title: row.title,
            description: row.description,
            is_visible: row.is_visible,
            created_at: row.created_at,
        }
    }
}

/// A question joined with its meeting title and author identity.
pub struct QuestionRow {
    pub id: i64,
    pub meeting_id: i64,
    pub meeting_title: String,
    pub author_id: i64,
    pub author_name: Option<String>,
    pub author_email: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl QuestionRow {
    pub fn author_display(&self) -> String {
        match self.author_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => self.author_email.clone(),
        }
    }
}

/// A question vote joined with the voter's display name.
pub struct VoteRow {
    pub question_id: i64,
    pub user_id: i64,
    pub vote_type: VoteType,
    pub voter_name: String,
    pub created_at: DateTime<Utc>,
}

pub struct PollRow {
    pub id: i64,
    pub meeting_id: i64,
    pub question_id: Option<i64>,
    pub title: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// A poll option with its live vote count.
pub struct OptionRow {
    pub id: i64,
    pub poll_id: i64,
    pub text: String,
    pub sort_order: i64,
    pub votes: i64,
}
