use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{User, VoteState};

// -- Session claims --

/// Claims carried by the session token. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub bio: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeSentResponse {
    pub step: &'static str,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStep {
    Authenticated,
    PendingApproval,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    pub step: AuthStep,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub pending_approvals: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

// -- Meetings --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMeetingRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisibilityResponse {
    pub id: i64,
    pub is_visible: bool,
}

// -- Questions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateQuestionRequest {
    pub text: String,
}

/// Body of `POST /questions/{id}/vote`. `vote_type` stays a string so that
/// bad values surface as a validation error rather than a decode failure.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CastVoteRequest {
    pub vote_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: i64,
    pub meeting_id: i64,
    pub text: String,
    pub author_id: i64,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub score: i64,
    pub up_count: i64,
    pub down_count: i64,
    pub up_voters: Vec<String>,
    pub down_voters: Vec<String>,
    pub my_vote: VoteState,
}

/// Authoritative tally returned by every vote cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub question_id: i64,
    pub up_count: i64,
    pub down_count: i64,
    pub score: i64,
    pub my_vote: VoteState,
    pub up_voters: Vec<String>,
    pub down_voters: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileQuestion {
    pub id: i64,
    pub text: String,
    pub meeting_id: i64,
    pub meeting_title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub user: User,
    pub questions: Vec<ProfileQuestion>,
}

// -- Pulse --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOptionView {
    pub id: i64,
    pub text: String,
    pub votes: i64,
    pub pct: i64,
    pub my_vote: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollView {
    pub id: i64,
    pub meeting_id: i64,
    pub question_id: Option<i64>,
    pub title: String,
    pub total_votes: i64,
    pub options: Vec<PollOptionView>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// What a pulse read or write returns. A meeting that never had a poll
/// serializes as `{"active": false}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseSnapshot {
    pub active: bool,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollView>,
}

impl PulseSnapshot {
    pub fn empty() -> Self {
        Self {
            active: false,
            poll: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminPulseView {
    #[serde(flatten)]
    pub snapshot: PulseSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartPulseRequest {
    pub meeting_id: i64,
    #[serde(default)]
    pub question_id: Option<i64>,
    #[serde(default)]
    pub title: String,
    /// Absent means "use the default option set".
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

// -- Admin --

#[derive(Debug, Clone, Serialize)]
pub struct AdminUserEntry {
    #[serde(flatten)]
    pub user: User,
    pub meetings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminUsersResponse {
    pub pending_count: i64,
    pub users: Vec<AdminUserEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminQuestionEntry {
    pub id: i64,
    pub text: String,
    pub score: i64,
    pub author: String,
    pub meeting: String,
    pub meeting_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionStub {
    pub id: i64,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct MeetingFilter {
    pub meeting_id: Option<i64>,
}
