use axum::{
    Extension, Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
};

use meetpulse_core::{CoreError, RequestContext};
use meetpulse_types::api::{
    CastVoteRequest, CreateMeetingRequest, CreateQuestionRequest, QuestionView, VoteOutcome,
};
use meetpulse_types::models::{Meeting, VoteType};

use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

pub async fn list_meetings(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<Vec<Meeting>>, ApiError> {
    run_blocking(&state, move |s| s.directory.list_meetings(&ctx))
        .await
        .map(Json)
}

pub async fn create_meeting(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<CreateMeetingRequest>, JsonRejection>,
) -> Result<Json<Meeting>, ApiError> {
    let Json(req) = body?;
    run_blocking(&state, move |s| {
        s.directory
            .create_meeting(&ctx, &req.title, &req.description)
    })
    .await
    .map(Json)
}

pub async fn list_questions(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<QuestionView>>, ApiError> {
    let Path(meeting_id) = path?;
    run_blocking(&state, move |s| s.ledger.list(&ctx, meeting_id))
        .await
        .map(Json)
}

pub async fn add_question(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<CreateQuestionRequest>, JsonRejection>,
) -> Result<Json<QuestionView>, ApiError> {
    let Path(meeting_id) = path?;
    let Json(req) = body?;
    run_blocking(&state, move |s| s.ledger.ask(&ctx, meeting_id, &req.text))
        .await
        .map(Json)
}

pub async fn vote_question(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<CastVoteRequest>, JsonRejection>,
) -> Result<Json<VoteOutcome>, ApiError> {
    let Path(question_id) = path?;
    let Json(req) = body?;
    let vote_type: VoteType = req
        .vote_type
        .parse()
        .map_err(|_| CoreError::Validation("vote_type must be 'up' or 'down'".into()))?;

    run_blocking(&state, move |s| s.ledger.cast_vote(&ctx, question_id, vote_type))
        .await
        .map(Json)
}
