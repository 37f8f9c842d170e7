use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod config;
mod dashboard;
mod db;
mod live_scores;
mod net;
mod refresh;
mod widgets;

use config::Config;
use dashboard::AppState;
use db::Database;
use live_scores::{start_score_sync, ScoreProvider, TheSportsDB};
use net::ConnectivityProbe;
use refresh::{worker::start_periodic_refresh, RefreshCause, RefreshCycle, RefreshWorker};
use widgets::{CrestCatalog, MainViewLink, WidgetHost};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // Open database
    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    // Refresh cycle wired to the SQLite-backed widget host
    let host = Arc::new(WidgetHost::new(db.clone()));
    let mut crests = CrestCatalog::new(&config.crest_base()?)?;
    for (team, file) in config.crest_overrides()? {
        crests = crests.with_team(&team, &file);
    }
    if config.serves_own_crests() {
        crests = crests.available_in(Path::new(&config.crest_dir));
    }
    let cycle = RefreshCycle::new(
        Arc::new(db.clone()),
        host.clone(),
        host,
        Arc::new(crests),
        Arc::new(MainViewLink::new(config.main_view_url.clone())),
    );
    let refresh = RefreshWorker::spawn(cycle, config.refresh_queue);

    // Paint whatever is already stored before the first poll completes
    refresh.request(RefreshCause::ScoresUpdated);
    start_periodic_refresh(
        refresh.clone(),
        Duration::from_secs(config.refresh_interval_secs),
    );

    let score_providers: Vec<Arc<dyn ScoreProvider>> = vec![Arc::new(TheSportsDB::new(
        config.live_scores_api_key.as_deref(),
        Some(config.live_scores_api_url.as_str()),
    )?)];
    info!("Configured {} score provider(s)", score_providers.len());

    let probe = ConnectivityProbe::new(
        config.connectivity_probe_addr.clone(),
        Duration::from_millis(config.connectivity_timeout_ms),
    );
    start_score_sync(
        score_providers,
        db.clone(),
        probe,
        refresh.clone(),
        Duration::from_secs(config.poll_interval_secs),
    );

    // Widget API server
    let app = dashboard::router(AppState {
        db,
        refresh,
        crest_dir: PathBuf::from(&config.crest_dir),
    });
    let addr: SocketAddr = config
        .dashboard_addr
        .parse()
        .with_context(|| format!("Invalid dashboard address '{}'", config.dashboard_addr))?;
    info!("Widget API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run API server (blocks until shutdown)
    axum::serve(listener, app).await?;

    Ok(())
}
