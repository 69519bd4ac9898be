//! The MeetPulse engine: one-time-code identity, access policy, the question
//! vote ledger and live pulse polls.
//!
//! Every operation takes an explicit [`RequestContext`] describing who is
//! calling; nothing here reads ambient session state.

pub mod access;
pub mod ballot;
pub mod clock;
pub mod context;
pub mod directory;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod notifier;
pub mod pulse;
pub mod tally;

pub use context::RequestContext;
pub use error::{CoreError, CoreResult};
