use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use meetpulse_core::CoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Core(e) => match e {
                CoreError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION"),
                CoreError::InvalidOptions(_) => (StatusCode::BAD_REQUEST, "INVALID_OPTIONS"),
                CoreError::CodeInvalid { .. } => (StatusCode::BAD_REQUEST, "CODE_INVALID"),
                CoreError::CodeExpired => (StatusCode::BAD_REQUEST, "CODE_EXPIRED"),
                CoreError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
                CoreError::Session(_) => (StatusCode::UNAUTHORIZED, "SESSION"),
                CoreError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
                CoreError::SelfVoteForbidden => (StatusCode::FORBIDDEN, "SELF_VOTE_FORBIDDEN"),
                CoreError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                CoreError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                CoreError::PollClosed => (StatusCode::CONFLICT, "POLL_CLOSED"),
                CoreError::TooManyAttempts => (StatusCode::TOO_MANY_REQUESTS, "TOO_MANY_ATTEMPTS"),
                CoreError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        let message = match &self {
            ApiError::Core(CoreError::Store(e)) => {
                error!("Store error: {}", e);
                "An internal error occurred".to_string()
            }
            ApiError::Core(CoreError::Session(e)) => {
                error!("Session error: {}", e);
                "Could not establish a session".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorBody {
                error: message,
                code,
            }),
        )
            .into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
