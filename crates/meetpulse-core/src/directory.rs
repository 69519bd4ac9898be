//! Meetings, profiles and user administration.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use meetpulse_db::Database;
use meetpulse_db::queries::{meetings, questions, users};
use meetpulse_types::api::{AdminUserEntry, AdminUsersResponse, ProfileQuestion, ProfileResponse};
use meetpulse_types::models::{Meeting, User};

use crate::access::{Action, AdminAction};
use crate::clock::Clock;
use crate::context::RequestContext;
use crate::error::{CoreError, CoreResult};

pub const MEETING_TITLE_MAX_LENGTH: usize = 255;

pub struct Directory {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl Directory {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    // -- Meetings --

    /// Meetings newest first. Hidden meetings are listed for admins only.
    pub fn list_meetings(&self, ctx: &RequestContext) -> CoreResult<Vec<Meeting>> {
        let user = ctx.require(Action::ListMeetings)?;
        let include_hidden = user.is_admin;
        Ok(self
            .db
            .with_conn(|conn| meetings::list_meetings(conn, include_hidden))?)
    }

    pub fn admin_meetings(&self, ctx: &RequestContext) -> CoreResult<Vec<Meeting>> {
        ctx.require(Action::Admin(AdminAction::ListMeetings))?;
        Ok(self.db.with_conn(|conn| meetings::list_meetings(conn, true))?)
    }

    pub fn create_meeting(
        &self,
        ctx: &RequestContext,
        title: &str,
        description: &str,
    ) -> CoreResult<Meeting> {
        let user = ctx.require(Action::Admin(AdminAction::CreateMeeting))?;
        let title = title.trim();
        if title.is_empty() {
            return Err(CoreError::Validation("Meeting title cannot be empty.".into()));
        }
        if title.chars().count() > MEETING_TITLE_MAX_LENGTH {
            return Err(CoreError::Validation(format!(
                "Meeting title too long (max {} characters).",
                MEETING_TITLE_MAX_LENGTH
            )));
        }
        let description = Some(description.trim()).filter(|d| !d.is_empty());

        let now = self.clock.now();
        let meeting = self
            .db
            .with_tx(|tx| meetings::insert_meeting(tx, title, description, user.id, now))?;

        info!(by = %user.email, meeting_id = meeting.id, title = %meeting.title, "MEETING_CREATED");
        Ok(meeting)
    }

    /// Flip a meeting between listed and hidden. Hidden meetings keep working
    /// for anyone holding a direct link.
    pub fn toggle_visibility(&self, ctx: &RequestContext, meeting_id: i64) -> CoreResult<Meeting> {
        let user = ctx.require(Action::Admin(AdminAction::ToggleMeetingVisibility))?;

        let meeting = self.db.with_tx(|tx| {
            let meeting =
                meetings::get_meeting(tx, meeting_id)?.ok_or(CoreError::NotFound("meeting"))?;
            meetings::set_visibility(tx, meeting_id, !meeting.is_visible)?;
            Ok::<_, CoreError>(Meeting {
                is_visible: !meeting.is_visible,
                ..meeting
            })
        })?;

        info!(
            by = %user.email,
            meeting_id,
            is_visible = meeting.is_visible,
            "MEETING_VISIBILITY"
        );
        Ok(meeting)
    }

    // -- Profile --

    pub fn profile(&self, ctx: &RequestContext) -> CoreResult<ProfileResponse> {
        let user = ctx.require(Action::ViewProfile)?;
        let rows = self
            .db
            .with_conn(|conn| questions::list_by_author(conn, user.id))?;

        Ok(ProfileResponse {
            user: user.clone(),
            questions: rows
                .into_iter()
                .map(|q| ProfileQuestion {
                    id: q.id,
                    text: q.text,
                    meeting_id: q.meeting_id,
                    meeting_title: q.meeting_title,
                    created_at: q.created_at,
                })
                .collect(),
        })
    }

    // -- Users --

    /// Every account newest first, with the meetings each one has asked in.
    pub fn admin_users(&self, ctx: &RequestContext) -> CoreResult<AdminUsersResponse> {
        ctx.require(Action::Admin(AdminAction::ListUsers))?;

        let (pending_count, all, asked) = self.db.with_conn(|conn| {
            Ok::<_, CoreError>((
                users::count_pending(conn)?,
                users::list_users(conn)?,
                users::meetings_by_author(conn)?,
            ))
        })?;

        let mut by_author: HashMap<i64, Vec<String>> = HashMap::new();
        for (author_id, title) in asked {
            by_author.entry(author_id).or_default().push(title);
        }

        Ok(AdminUsersResponse {
            pending_count,
            users: all
                .into_iter()
                .map(|user| AdminUserEntry {
                    meetings: by_author.remove(&user.id).unwrap_or_default(),
                    user,
                })
                .collect(),
        })
    }

    /// Let a pending account write. With no admin left in the system the
    /// approved account becomes one.
    pub fn approve_user(&self, ctx: &RequestContext, user_id: i64) -> CoreResult<User> {
        let admin = ctx.require(Action::Admin(AdminAction::ApproveUser))?;

        let target = self.db.with_tx(|tx| {
            if users::get_user_by_id(tx, user_id)?.is_none() {
                return Err(CoreError::NotFound("user"));
            }
            users::set_approved(tx, user_id, true)?;
            if users::count_admins(tx)? == 0 {
                users::set_admin(tx, user_id, true)?;
            }
            users::get_user_by_id(tx, user_id)?.ok_or(CoreError::NotFound("user"))
        })?;

        info!(
            by = %admin.email,
            target = %target.email,
            is_admin = target.is_admin,
            "USER_APPROVED"
        );
        Ok(target)
    }

    /// Grant or revoke admin rights. Admins cannot change their own role, and
    /// the last admin cannot be demoted.
    pub fn toggle_admin(&self, ctx: &RequestContext, user_id: i64) -> CoreResult<User> {
        let admin = ctx.require(Action::Admin(AdminAction::ToggleAdmin))?;
        if admin.id == user_id {
            return Err(CoreError::Validation(
                "You cannot change your own admin status.".into(),
            ));
        }

        let target = self.db.with_tx(|tx| {
            let target = users::get_user_by_id(tx, user_id)?.ok_or(CoreError::NotFound("user"))?;
            if target.is_admin && users::count_admins(tx)? <= 1 {
                return Err(CoreError::Conflict("Cannot remove the last admin.".into()));
            }
            users::set_admin(tx, user_id, !target.is_admin)?;
            Ok(User {
                is_admin: !target.is_admin,
                ..target
            })
        })?;

        info!(
            by = %admin.email,
            target = %target.email,
            is_admin = target.is_admin,
            "ADMIN_TOGGLED"
        );
        Ok(target)
    }

    /// Remove an account with its questions and votes.
    pub fn delete_user(&self, ctx: &RequestContext, user_id: i64) -> CoreResult<()> {
        let admin = ctx.require(Action::Admin(AdminAction::DeleteUser))?;
        if admin.id == user_id {
            return Err(CoreError::Validation(
                "You cannot delete your own account.".into(),
            ));
        }

        let target = self.db.with_tx(|tx| {
            let target = users::get_user_by_id(tx, user_id)?.ok_or(CoreError::NotFound("user"))?;
            if target.is_admin && users::count_admins(tx)? <= 1 {
                return Err(CoreError::Conflict("Cannot delete the last admin.".into()));
            }
            users::delete_user(tx, user_id)?;
            Ok(target)
        })?;

        warn!(by = %admin.email, target = %target.email, target_id = user_id, "USER_DELETED");
        Ok(())
    }
}
