//! Access policy. Pure evaluation over the caller's user record; no storage.
//!
//! | Caller                 | Allowed                                          |
//! |------------------------|--------------------------------------------------|
//! | anonymous              | requesting and verifying codes                   |
//! | signed in, unapproved  | reads only                                       |
//! | approved member        | reads and member writes, never self-votes        |
//! | admin                  | everything, hidden meetings included             |

use meetpulse_types::models::User;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    RequestCode,
    VerifyCode,
    ViewSession,
    ListMeetings,
    ViewQuestions,
    ViewPulse,
    ViewProfile,
    AskQuestion,
    CastVote { author_id: i64 },
    PulseVote,
    Admin(AdminAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    CreateMeeting,
    ListMeetings,
    ToggleMeetingVisibility,
    ListUsers,
    ApproveUser,
    ToggleAdmin,
    DeleteUser,
    ListQuestions,
    DeleteQuestion,
    ViewPulse,
    StartPulse,
    EndPulse,
}

impl Action {
    pub fn is_public(self) -> bool {
        matches!(self, Action::RequestCode | Action::VerifyCode)
    }

    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            Action::ViewSession
                | Action::ListMeetings
                | Action::ViewQuestions
                | Action::ViewPulse
                | Action::ViewProfile
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Unauthorized,
    Forbidden(&'static str),
    SelfVote,
}

impl From<Denial> for CoreError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Unauthorized => CoreError::Unauthorized,
            Denial::Forbidden(reason) => CoreError::Forbidden(reason.to_string()),
            Denial::SelfVote => CoreError::SelfVoteForbidden,
        }
    }
}

pub const PENDING_APPROVAL: &str = "Your account is awaiting admin approval.";
pub const ADMIN_ONLY: &str = "Admin access required.";

pub fn authorize(user: Option<&User>, action: Action) -> Result<(), Denial> {
    if action.is_public() {
        return Ok(());
    }

    let Some(user) = user else {
        return Err(Denial::Unauthorized);
    };

    if action.is_read_only() {
        return Ok(());
    }

    if !user.is_approved {
        return Err(Denial::Forbidden(PENDING_APPROVAL));
    }

    match action {
        Action::Admin(_) if !user.is_admin => Err(Denial::Forbidden(ADMIN_ONLY)),
        Action::CastVote { author_id } if author_id == user.id => Err(Denial::SelfVote),
        _ => Ok(()),
    }
}
