use meetpulse_types::models::User;

use crate::access::{self, Action};
use crate::error::CoreResult;

/// Who is making the current request. Built once per request by the session
/// layer and handed to every core operation.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    user: Option<User>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn authenticated(user: User) -> Self {
        Self { user: Some(user) }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Authorize `action` and hand back the acting user.
    pub fn require(&self, action: Action) -> CoreResult<&User> {
        access::authorize(self.user(), action)?;
        self.user().ok_or(crate::CoreError::Unauthorized)
    }
}
