//! Shared types for MeetPulse: domain models and the JSON shapes exchanged
//! between the core engine and the HTTP layer.

pub mod api;
pub mod models;
