//! HTTP surface of MeetPulse: session middleware, JSON handlers and the
//! router that wires them to the core services.

pub mod admin;
pub mod auth;
pub mod error;
pub mod meetings;
pub mod middleware;
pub mod pulse;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::router;
pub use state::{AppState, AppStateInner};
