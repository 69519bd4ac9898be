//! Live pulse polls: at most one running poll per meeting.
//!
//! Starting a poll closes the running one in the same write transaction, and
//! the store backs that up with a partial unique index on running polls, so a
//! meeting never has zero-then-two or two-at-once active polls. Each member
//! holds one pulse vote per poll; voting again moves it.

use std::sync::Arc;

use rusqlite::Connection;
use tracing::info;

use meetpulse_db::models::PollRow;
use meetpulse_db::queries::{meetings, polls, questions};
use meetpulse_db::{Database, DbError};
use meetpulse_types::api::{AdminPulseView, PollOptionView, PollView, PulseSnapshot};

use crate::access::{Action, AdminAction};
use crate::ballot::{self, RepeatRule, Transition};
use crate::clock::Clock;
use crate::context::RequestContext;
use crate::error::{CoreError, CoreResult};
use crate::ledger::truncate;
use crate::tally;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 8;
pub const OPTION_MAX_LENGTH: usize = 200;
pub const TITLE_MAX_LENGTH: usize = 255;

/// Parameters for [`PulseEngine::start`].
#[derive(Debug, Clone, Default)]
pub struct StartPoll {
    pub meeting_id: i64,
    /// Pins the poll to a question of the same meeting.
    pub question_id: Option<i64>,
    /// Required unless a question is pinned; a pinned question's text is
    /// always the title.
    pub title: String,
    pub options: Vec<String>,
}

/// The option set used when an admin starts a poll without listing any.
pub fn default_options(pinned: bool) -> Vec<String> {
    let labels: &[&str] = if pinned {
        &["Yes", "No", "Abstain"]
    } else {
        &["Great", "Good", "Okay", "Could be better"]
    };
    labels.iter().map(|s| s.to_string()).collect()
}

/// Trim, drop blanks and exact duplicates (first occurrence wins), then
/// check the count and length bounds.
pub fn normalize_options(options: &[String]) -> CoreResult<Vec<String>> {
    let mut cleaned: Vec<String> = Vec::with_capacity(options.len());
    for option in options {
        let option = option.trim();
        if option.is_empty() || cleaned.iter().any(|o| o == option) {
            continue;
        }
        if option.chars().count() > OPTION_MAX_LENGTH {
            return Err(CoreError::InvalidOptions(format!(
                "Options must be at most {} characters.",
                OPTION_MAX_LENGTH
            )));
        }
        cleaned.push(option.to_string());
    }

    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&cleaned.len()) {
        return Err(CoreError::InvalidOptions(format!(
            "A poll needs between {} and {} distinct options, got {}.",
            MIN_OPTIONS,
            MAX_OPTIONS,
            cleaned.len()
        )));
    }
    Ok(cleaned)
}

pub struct PulseEngine {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl PulseEngine {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Open a new poll, closing whatever was running in the meeting.
    pub fn start(&self, ctx: &RequestContext, request: StartPoll) -> CoreResult<PulseSnapshot> {
        let user = ctx.require(Action::Admin(AdminAction::StartPulse))?;
        let options = normalize_options(&request.options)?;
        let title = request.title.trim();
        let now = self.clock.now();

        let (snapshot, replaced) = self.db.with_tx(|tx| {
            if meetings::get_meeting(tx, request.meeting_id)?.is_none() {
                return Err(CoreError::NotFound("meeting"));
            }

            let pinned = match request.question_id {
                Some(question_id) => match questions::get_question(tx, question_id)? {
                    Some(q) if q.meeting_id == request.meeting_id => Some(q),
                    _ => return Err(CoreError::NotFound("question")),
                },
                None => None,
            };

            // A pinned question names the poll; any free-text title is ignored.
            let title = match &pinned {
                Some(question) => truncate(&question.text, TITLE_MAX_LENGTH),
                None if title.is_empty() => {
                    return Err(CoreError::Validation("A poll needs a title.".into()));
                }
                None => truncate(title, TITLE_MAX_LENGTH),
            };

            let replaced = polls::close_active(tx, request.meeting_id, now)?;
            let poll_id = polls::insert_poll(
                tx,
                request.meeting_id,
                pinned.as_ref().map(|q| q.id),
                &title,
                now,
            )
            .map_err(|e| match e {
                e if e.is_constraint_violation() => {
                    CoreError::Conflict("Another poll is already running in this meeting.".into())
                }
                e => CoreError::Store(e),
            })?;
            for (idx, option) in options.iter().enumerate() {
                polls::insert_option(tx, poll_id, option, idx as i64)?;
            }

            let poll = polls::get_poll(tx, poll_id)?.ok_or(CoreError::NotFound("poll"))?;
            Ok((snapshot(tx, poll, Some(user.id))?, replaced))
        })?;

        info!(
            by = %user.email,
            meeting_id = request.meeting_id,
            poll_id = snapshot.poll.as_ref().map(|p| p.id),
            replaced,
            options = ?options,
            "PULSE_STARTED"
        );
        Ok(snapshot)
    }

    /// Back an option of a running poll. A second vote in the same poll moves
    /// the caller's single ballot instead of adding one.
    pub fn vote(&self, ctx: &RequestContext, option_id: i64) -> CoreResult<PulseSnapshot> {
        let user = ctx.require(Action::PulseVote)?;
        let now = self.clock.now();

        let (snapshot, transition) = self.db.with_tx(|tx| {
            let poll_id =
                polls::poll_id_for_option(tx, option_id)?.ok_or(CoreError::NotFound("option"))?;
            let poll = polls::get_poll(tx, poll_id)?.ok_or(CoreError::NotFound("poll"))?;
            if !poll.active {
                return Err(CoreError::PollClosed);
            }

            let existing = polls::get_pulse_vote(tx, poll_id, user.id)?;
            let transition = ballot::transition(existing, option_id, RepeatRule::Keep);
            match transition {
                Transition::Create(option) => {
                    polls::insert_pulse_vote(tx, poll_id, user.id, option, now)?
                }
                Transition::Replace { to, .. } => {
                    polls::move_pulse_vote(tx, poll_id, user.id, to, now)?;
                }
                Transition::Retract(_) | Transition::Unchanged(_) => {}
            }

            Ok((snapshot(tx, poll, Some(user.id))?, transition))
        })?;

        info!(
            by = %user.email,
            option_id,
            poll_id = snapshot.poll.as_ref().map(|p| p.id),
            moved = matches!(transition, Transition::Replace { .. }),
            "PULSE_VOTE"
        );
        Ok(snapshot)
    }

    /// The meeting's most recent poll, running or ended, from the caller's
    /// point of view.
    pub fn get(&self, ctx: &RequestContext, meeting_id: i64) -> CoreResult<PulseSnapshot> {
        let user = ctx.require(Action::ViewPulse)?;
        self.db.with_conn(|conn| {
            match polls::latest_for_meeting(conn, meeting_id)? {
                Some(poll) => Ok(snapshot(conn, poll, Some(user.id))?),
                None => Ok::<_, CoreError>(PulseSnapshot::empty()),
            }
        })
    }

    /// The running poll, of one meeting or of any, with its meeting title and
    /// pinned question text.
    pub fn admin_view(
        &self,
        ctx: &RequestContext,
        meeting_id: Option<i64>,
    ) -> CoreResult<AdminPulseView> {
        ctx.require(Action::Admin(AdminAction::ViewPulse))?;
        self.db.with_conn(|conn| {
            let poll = match meeting_id {
                Some(id) => polls::latest_for_meeting(conn, id)?.filter(|p| p.active),
                None => polls::latest_active(conn)?,
            };
            let Some(poll) = poll else {
                return Ok(AdminPulseView {
                    snapshot: PulseSnapshot::empty(),
                    meeting_title: None,
                    question_text: None,
                });
            };

            let meeting_title = meetings::get_meeting(conn, poll.meeting_id)?.map(|m| m.title);
            let question_text = match poll.question_id {
                Some(id) => questions::get_question(conn, id)?.map(|q| q.text),
                None => None,
            };
            Ok::<_, CoreError>(AdminPulseView {
                snapshot: snapshot(conn, poll, None)?,
                meeting_title,
                question_text,
            })
        })
    }

    /// Close a poll. Ending a closed poll changes nothing.
    pub fn end(&self, ctx: &RequestContext, poll_id: i64) -> CoreResult<PulseSnapshot> {
        let user = ctx.require(Action::Admin(AdminAction::EndPulse))?;
        let now = self.clock.now();

        let (snapshot, closed) = self.db.with_tx(|tx| {
            if polls::get_poll(tx, poll_id)?.is_none() {
                return Err(CoreError::NotFound("poll"));
            }
            let closed = polls::end_poll(tx, poll_id, now)?;
            let poll = polls::get_poll(tx, poll_id)?.ok_or(CoreError::NotFound("poll"))?;
            Ok((snapshot(tx, poll, Some(user.id))?, closed))
        })?;

        if closed > 0 {
            info!(by = %user.email, poll_id, "PULSE_ENDED");
        }
        Ok(snapshot)
    }
}

/// Build the read model of a poll with live counts and percentages.
fn snapshot(conn: &Connection, poll: PollRow, viewer: Option<i64>) -> Result<PulseSnapshot, DbError> {
    let options = polls::options_with_counts(conn, poll.id)?;
    let mine = match viewer {
        Some(user_id) => polls::get_pulse_vote(conn, poll.id, user_id)?,
        None => None,
    };

    let counts: Vec<i64> = options.iter().map(|o| o.votes).collect();
    let pct = tally::percentages(&counts);
    let total_votes = counts.iter().sum();

    let options = options
        .into_iter()
        .zip(pct)
        .map(|(option, pct)| PollOptionView {
            my_vote: mine == Some(option.id),
            id: option.id,
            text: option.text,
            votes: option.votes,
            pct,
        })
        .collect();

    Ok(PulseSnapshot {
        active: poll.active,
        poll: Some(PollView {
            id: poll.id,
            meeting_id: poll.meeting_id,
            question_id: poll.question_id,
            title: poll.title,
            total_votes,
            options,
            created_at: poll.created_at,
            ended_at: poll.ended_at,
        }),
    })
}
