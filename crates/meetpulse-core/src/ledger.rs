//! Questions and their up/down votes.
//!
//! One vote per (question, user), toggled through [`ballot::transition`]
//! inside a single write transaction. Scores are never stored: they are
//! recomputed from the vote rows on every read and returned from every write.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use meetpulse_db::Database;
use meetpulse_db::models::{QuestionRow, VoteRow};
use meetpulse_db::queries::{meetings, questions, votes};
use meetpulse_types::api::{AdminQuestionEntry, QuestionStub, QuestionView, VoteOutcome};
use meetpulse_types::models::{VoteState, VoteType};

use crate::access::{Action, AdminAction};
use crate::ballot::{self, RepeatRule, Transition};
use crate::clock::Clock;
use crate::context::RequestContext;
use crate::error::{CoreError, CoreResult};

pub const QUESTION_MAX_LENGTH: usize = 1000;
const STUB_TEXT_LENGTH: usize = 80;

pub struct VoteLedger {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

/// Up/down tallies and voter names for one question.
#[derive(Debug, Default)]
struct Tally {
    up_voters: Vec<String>,
    down_voters: Vec<String>,
}

impl Tally {
    fn from_votes<'a>(rows: impl IntoIterator<Item = &'a VoteRow>) -> Self {
        let mut tally = Tally::default();
        for vote in rows {
            match vote.vote_type {
                VoteType::Up => tally.up_voters.push(vote.voter_name.clone()),
                VoteType::Down => tally.down_voters.push(vote.voter_name.clone()),
            }
        }
        tally
    }

    fn up(&self) -> i64 {
        self.up_voters.len() as i64
    }

    fn down(&self) -> i64 {
        self.down_voters.len() as i64
    }

    fn score(&self) -> i64 {
        self.up() - self.down()
    }
}

impl VoteLedger {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Post a new question to a meeting.
    pub fn ask(&self, ctx: &RequestContext, meeting_id: i64, text: &str) -> CoreResult<QuestionView> {
        let user = ctx.require(Action::AskQuestion)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(CoreError::Validation("Question text cannot be empty.".into()));
        }
        if text.chars().count() > QUESTION_MAX_LENGTH {
            return Err(CoreError::Validation(format!(
                "Question too long (max {} characters).",
                QUESTION_MAX_LENGTH
            )));
        }

        let now = self.clock.now();
        let row = self.db.with_tx(|tx| {
            if meetings::get_meeting(tx, meeting_id)?.is_none() {
                return Err(CoreError::NotFound("meeting"));
            }
            let id = questions::insert_question(tx, meeting_id, user.id, text, now)?;
            questions::get_question(tx, id)?.ok_or(CoreError::NotFound("question"))
        })?;

        info!(
            by = %user.email,
            meeting_id,
            question_id = row.id,
            "QUESTION_ADDED"
        );
        Ok(question_view(row, &Tally::default(), VoteState::None))
    }

    /// Toggle the caller's vote on a question and return the new tally.
    ///
    /// No vote yet: cast it. Same direction again: withdraw it. Opposite
    /// direction: flip it in place. Authors can never vote on their own
    /// question.
    pub fn cast_vote(
        &self,
        ctx: &RequestContext,
        question_id: i64,
        vote_type: VoteType,
    ) -> CoreResult<VoteOutcome> {
        let user = ctx.user().ok_or(CoreError::Unauthorized)?;
        let now = self.clock.now();

        let (transition, rows) = self.db.with_tx(|tx| {
            let question =
                questions::get_question(tx, question_id)?.ok_or(CoreError::NotFound("question"))?;
            ctx.require(Action::CastVote {
                author_id: question.author_id,
            })?;

            let existing = votes::get_vote(tx, question_id, user.id)?;
            let transition = ballot::transition(existing, vote_type, RepeatRule::Toggle);
            match transition {
                Transition::Create(vote) => votes::insert_vote(tx, question_id, user.id, vote, now)?,
                Transition::Retract(_) => {
                    votes::delete_vote(tx, question_id, user.id)?;
                }
                Transition::Replace { to, .. } => {
                    votes::update_vote(tx, question_id, user.id, to, now)?;
                }
                Transition::Unchanged(_) => {}
            }

            let rows = votes::votes_for_question(tx, question_id)?;
            Ok::<_, CoreError>((transition, rows))
        })?;

        match transition {
            Transition::Retract(vote) => {
                info!(by = %user.email, question_id, vote = %vote, "VOTE_REMOVED")
            }
            other => {
                if let Some(vote) = other.resulting() {
                    info!(by = %user.email, question_id, vote = %vote, "VOTE_CAST")
                }
            }
        }

        let tally = Tally::from_votes(&rows);
        Ok(VoteOutcome {
            question_id,
            up_count: tally.up(),
            down_count: tally.down(),
            score: tally.score(),
            my_vote: VoteState::from(transition.resulting()),
            up_voters: tally.up_voters,
            down_voters: tally.down_voters,
        })
    }

    /// Every question of a meeting in insertion order, with the caller's own
    /// vote on each. Sorting is left to the caller.
    pub fn list(&self, ctx: &RequestContext, meeting_id: i64) -> CoreResult<Vec<QuestionView>> {
        let user = ctx.require(Action::ViewQuestions)?;

        let (rows, vote_rows) = self.db.with_conn(|conn| {
            if meetings::get_meeting(conn, meeting_id)?.is_none() {
                return Err(CoreError::NotFound("meeting"));
            }
            let rows = questions::list_for_meeting(conn, meeting_id)?;
            let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
            let vote_rows = votes::votes_for_questions(conn, &ids)?;
            Ok((rows, vote_rows))
        })?;

        let mut by_question: HashMap<i64, Vec<&VoteRow>> = HashMap::new();
        for vote in &vote_rows {
            by_question.entry(vote.question_id).or_default().push(vote);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let question_votes = by_question.get(&row.id).map(Vec::as_slice).unwrap_or(&[]);
                let tally = Tally::from_votes(question_votes.iter().copied());
                let mine = question_votes
                    .iter()
                    .find(|v| v.user_id == user.id)
                    .map(|v| v.vote_type);
                question_view(row, &tally, VoteState::from(mine))
            })
            .collect())
    }

    /// Remove a question and every vote on it.
    pub fn delete(&self, ctx: &RequestContext, question_id: i64) -> CoreResult<()> {
        let user = ctx.require(Action::Admin(AdminAction::DeleteQuestion))?;

        let row = self.db.with_tx(|tx| {
            let row =
                questions::get_question(tx, question_id)?.ok_or(CoreError::NotFound("question"))?;
            questions::delete_question(tx, question_id)?;
            Ok::<_, CoreError>(row)
        })?;

        warn!(
            by = %user.email,
            question_id,
            text = %truncate(&row.text, STUB_TEXT_LENGTH),
            "QUESTION_DELETED"
        );
        Ok(())
    }

    /// Admin overview of questions, optionally for one meeting, best score first.
    pub fn admin_list(
        &self,
        ctx: &RequestContext,
        meeting_id: Option<i64>,
    ) -> CoreResult<Vec<AdminQuestionEntry>> {
        ctx.require(Action::Admin(AdminAction::ListQuestions))?;

        let (rows, vote_rows) = self.db.with_conn(|conn| {
            let rows = questions::list_all(conn, meeting_id)?;
            let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
            let vote_rows = votes::votes_for_questions(conn, &ids)?;
            Ok::<_, CoreError>((rows, vote_rows))
        })?;

        let mut scores: HashMap<i64, i64> = HashMap::new();
        for vote in &vote_rows {
            let delta = match vote.vote_type {
                VoteType::Up => 1,
                VoteType::Down => -1,
            };
            *scores.entry(vote.question_id).or_default() += delta;
        }

        let mut entries: Vec<AdminQuestionEntry> = rows
            .into_iter()
            .map(|row| AdminQuestionEntry {
                id: row.id,
                score: scores.get(&row.id).copied().unwrap_or(0),
                author: row.author_display(),
                meeting: row.meeting_title,
                meeting_id: row.meeting_id,
                text: row.text,
                created_at: row.created_at,
            })
            .collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(entries)
    }

    /// Short list of a meeting's questions for pinning to a pulse poll, newest first.
    pub fn pulse_candidates(
        &self,
        ctx: &RequestContext,
        meeting_id: i64,
    ) -> CoreResult<Vec<QuestionStub>> {
        ctx.require(Action::Admin(AdminAction::StartPulse))?;

        let rows = self
            .db
            .with_conn(|conn| questions::list_all(conn, Some(meeting_id)))?;
        Ok(rows
            .into_iter()
            .map(|row| QuestionStub {
                id: row.id,
                text: truncate(&row.text, STUB_TEXT_LENGTH),
            })
            .collect())
    }
}

fn question_view(row: QuestionRow, tally: &Tally, my_vote: VoteState) -> QuestionView {
    QuestionView {
        id: row.id,
        meeting_id: row.meeting_id,
        author_id: row.author_id,
        author: row.author_display(),
        text: row.text,
        created_at: row.created_at,
        score: tally.score(),
        up_count: tally.up(),
        down_count: tally.down(),
        up_voters: tally.up_voters.clone(),
        down_voters: tally.down_voters.clone(),
        my_vote,
    }
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
