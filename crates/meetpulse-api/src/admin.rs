//! Admin-only routes. Every handler defers the admin check to the core
//! operation it calls.

use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
};

use meetpulse_core::RequestContext;
use meetpulse_core::pulse::{StartPoll, default_options};
use meetpulse_types::api::{
    AdminPulseView, AdminQuestionEntry, AdminUsersResponse, MeetingFilter, OkResponse,
    PulseSnapshot, QuestionStub, StartPulseRequest, VisibilityResponse,
};
use meetpulse_types::models::{Meeting, User};

use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

// -- Users --

pub async fn list_users(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<AdminUsersResponse>, ApiError> {
    run_blocking(&state, move |s| s.directory.admin_users(&ctx))
        .await
        .map(Json)
}

pub async fn approve_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<User>, ApiError> {
    let Path(user_id) = path?;
    run_blocking(&state, move |s| s.directory.approve_user(&ctx, user_id))
        .await
        .map(Json)
}

pub async fn toggle_admin(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<User>, ApiError> {
    let Path(user_id) = path?;
    run_blocking(&state, move |s| s.directory.toggle_admin(&ctx, user_id))
        .await
        .map(Json)
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<OkResponse>, ApiError> {
    let Path(user_id) = path?;
    run_blocking(&state, move |s| s.directory.delete_user(&ctx, user_id)).await?;
    Ok(Json(OkResponse::ok()))
}

// -- Meetings --

pub async fn list_meetings(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<Vec<Meeting>>, ApiError> {
    run_blocking(&state, move |s| s.directory.admin_meetings(&ctx))
        .await
        .map(Json)
}

pub async fn toggle_visibility(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<VisibilityResponse>, ApiError> {
    let Path(meeting_id) = path?;
    let meeting =
        run_blocking(&state, move |s| s.directory.toggle_visibility(&ctx, meeting_id)).await?;
    Ok(Json(VisibilityResponse {
        id: meeting.id,
        is_visible: meeting.is_visible,
    }))
}

// -- Questions --

pub async fn list_questions(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    query: Result<Query<MeetingFilter>, QueryRejection>,
) -> Result<Json<Vec<AdminQuestionEntry>>, ApiError> {
    let Query(filter) = query?;
    run_blocking(&state, move |s| s.ledger.admin_list(&ctx, filter.meeting_id))
        .await
        .map(Json)
}

pub async fn delete_question(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<OkResponse>, ApiError> {
    let Path(question_id) = path?;
    run_blocking(&state, move |s| s.ledger.delete(&ctx, question_id)).await?;
    Ok(Json(OkResponse::ok()))
}

pub async fn meeting_questions(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<QuestionStub>>, ApiError> {
    let Path(meeting_id) = path?;
    run_blocking(&state, move |s| s.ledger.pulse_candidates(&ctx, meeting_id))
        .await
        .map(Json)
}

// -- Pulse --

pub async fn pulse_view(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    query: Result<Query<MeetingFilter>, QueryRejection>,
) -> Result<Json<AdminPulseView>, ApiError> {
    let Query(filter) = query?;
    run_blocking(&state, move |s| s.pulse.admin_view(&ctx, filter.meeting_id))
        .await
        .map(Json)
}

pub async fn start_pulse(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<StartPulseRequest>, JsonRejection>,
) -> Result<Json<PulseSnapshot>, ApiError> {
    let Json(req) = body?;
    let options = req
        .options
        .unwrap_or_else(|| default_options(req.question_id.is_some()));
    let request = StartPoll {
        meeting_id: req.meeting_id,
        question_id: req.question_id,
        title: req.title,
        options,
    };

    run_blocking(&state, move |s| s.pulse.start(&ctx, request))
        .await
        .map(Json)
}

pub async fn end_pulse(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<PulseSnapshot>, ApiError> {
    let Path(poll_id) = path?;
    run_blocking(&state, move |s| s.pulse.end(&ctx, poll_id))
        .await
        .map(Json)
}
