use std::sync::Arc;

use tracing::error;

use meetpulse_core::clock::Clock;
use meetpulse_core::directory::Directory;
use meetpulse_core::identity::{IdentityGate, IdentitySettings};
use meetpulse_core::ledger::VoteLedger;
use meetpulse_core::notifier::Notifier;
use meetpulse_core::pulse::PulseEngine;
use meetpulse_core::CoreResult;
use meetpulse_db::Database;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub gate: IdentityGate,
    pub ledger: VoteLedger,
    pub pulse: PulseEngine,
    pub directory: Directory,
    /// Session lifetime, echoed as the cookie's `Max-Age`.
    pub session_ttl_secs: i64,
}

impl AppStateInner {
    pub fn new(
        db: Arc<Database>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        secret: &[u8],
        settings: IdentitySettings,
    ) -> AppState {
        let session_ttl_secs = settings.session_ttl.num_seconds();
        Arc::new(Self {
            gate: IdentityGate::new(db.clone(), notifier, clock.clone(), secret, settings),
            ledger: VoteLedger::new(db.clone(), clock.clone()),
            pulse: PulseEngine::new(db.clone(), clock.clone()),
            directory: Directory::new(db, clock),
            session_ttl_secs,
        })
    }
}

/// Run blocking store work off the async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&*state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}
