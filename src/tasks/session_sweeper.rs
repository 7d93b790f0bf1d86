use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::time::interval;

use crate::handlers::AppState;

const SWEEP_INTERVAL_SECONDS: u64 = 60;

pub async fn sweep_sessions_task(state: Arc<AppState>, max_idle: Duration) {
    info!("Starting background task to drop sessions idle for {:?}", max_idle);
    let mut interval = interval(Duration::from_secs(SWEEP_INTERVAL_SECONDS));

    loop {
        interval.tick().await;
        sweep_once(&state, max_idle).await;
    }
}

async fn sweep_once(state: &AppState, max_idle: Duration) {
    let ballots = state.ballots.evict_idle(max_idle).await;
    let searches = state.searches.evict_idle(max_idle).await;

    if ballots + searches > 0 {
        info!("Dropped {} idle ballots and {} idle search sessions", ballots, searches);
    }
    debug!(
        "Active sessions: {} ballots, {} searches",
        state.ballots.active().await,
        state.searches.active().await
    );
}
