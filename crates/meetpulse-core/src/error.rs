use meetpulse_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidOptions(String),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("You cannot vote on your own question.")]
    SelfVoteForbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("This poll has ended.")]
    PollClosed,

    #[error("{}", invalid_code_message(.remaining))]
    CodeInvalid { remaining: Option<i64> },

    #[error("Code expired. Request a new one.")]
    CodeExpired,

    #[error("Too many attempts. Request a new code.")]
    TooManyAttempts,

    #[error("Session error: {0}")]
    Session(String),

    #[error(transparent)]
    Store(#[from] DbError),
}

fn invalid_code_message(remaining: &Option<i64>) -> String {
    match *remaining {
        Some(1) => "Invalid code. 1 attempt remaining.".to_string(),
        Some(n) => format!("Invalid code. {} attempts remaining.", n),
        None => "Invalid code.".to_string(),
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
