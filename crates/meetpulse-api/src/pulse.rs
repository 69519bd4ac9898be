use axum::{
    Extension, Json,
    extract::{Path, State, rejection::PathRejection},
};

use meetpulse_core::RequestContext;
use meetpulse_types::api::PulseSnapshot;

use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

/// Latest poll of a meeting. Clients poll this every few seconds.
pub async fn get_pulse(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<PulseSnapshot>, ApiError> {
    let Path(meeting_id) = path?;
    run_blocking(&state, move |s| s.pulse.get(&ctx, meeting_id))
        .await
        .map(Json)
}

pub async fn vote_option(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<PulseSnapshot>, ApiError> {
    let Path(option_id) = path?;
    run_blocking(&state, move |s| s.pulse.vote(&ctx, option_id))
        .await
        .map(Json)
}
