use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::time::interval;

use crate::handlers::AppState;
use crate::voting::stats::compute_stats;

pub async fn refresh_stats_task(state: Arc<AppState>, period: Duration) {
    info!("Starting background task to refresh poll stats every {:?}", period);
    let mut interval = interval(period);

    loop {
        interval.tick().await;
        refresh_once(&state).await;
    }
}

// On failure the previous snapshot stays in place.
async fn refresh_once(state: &AppState) {
    match compute_stats(state.store.as_ref()).await {
        Ok(stats) => {
            info!(
                "Stats refreshed: {} polls, {} votes, {} categories",
                stats.total_polls, stats.total_votes, stats.total_categories
            );
            *state.stats.write().await = Some(stats);
        }
        Err(e) => error!("Failed to refresh poll stats: {}", e),
    }
}
