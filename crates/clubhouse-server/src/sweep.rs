use std::time::Duration;

use tracing::info;

use clubhouse_api::auth::AppState;

/// Background task that drops expired sessions so the table does not grow
/// with tokens nobody will present again.
pub async fn run_session_sweep(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let purged = state.sessions.purge_expired();
        if purged > 0 {
            info!("Sweep: dropped {} expired sessions", purged);
        }
    }
}
