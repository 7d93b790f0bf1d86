mod browse;
mod conditions;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod reference;
mod tasks;
#[cfg(test)]
mod testing;
mod voting;

use std::path::Path;
use std::sync::Arc;

use log::{error, info};
use tokio::net::TcpListener;
use tokio::signal;

use conditions::ComfortPanelService;
use config::Config;
use db::{Database, PollStore};
use handlers::AppState;

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    let database = match Database::new(&config.database_url).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return;
        }
    };

    for category in reference::categories() {
        if let Err(e) = database.create_category(category.slug, category.title).await {
            error!("Failed to register category {}: {}", category.slug, e);
        }
    }

    if let Some(path) = &config.seed_file {
        if let Err(e) = db::seed::import_seed(&database, Path::new(path)).await {
            error!("Failed to import seed file {}: {}", path, e);
        }
    }

    let conditions = match ComfortPanelService::from_config(&config) {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return;
        }
    };

    let store: Arc<dyn PollStore> = Arc::new(database);
    let state = AppState::new(store, conditions, config.search_debounce);

    tokio::spawn(tasks::stats_refresher::refresh_stats_task(
        Arc::clone(&state),
        config.stats_refresh_interval,
    ));
    tokio::spawn(tasks::session_sweeper::sweep_sessions_task(
        Arc::clone(&state),
        config.session_idle_timeout,
    ));

    let listener = match TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", config.bind_addr, e);
            return;
        }
    };
    info!("Listening on {}", config.bind_addr);

    if let Err(e) = axum::serve(listener, handlers::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
    }
    info!("Server stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
