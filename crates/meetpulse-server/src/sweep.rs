use std::time::Duration;

use tracing::{error, info, warn};

use meetpulse_api::AppState;

/// Background task that deletes expired sign-in codes.
pub async fn run_sweep_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let state = state.clone();
        match tokio::task::spawn_blocking(move || state.gate.sweep_expired()).await {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Sweep: removed {} expired codes", count);
                }
            }
            Ok(Err(e)) => warn!("Sweep error: {}", e),
            Err(e) => error!("spawn_blocking join error: {}", e),
        }
    }
}
