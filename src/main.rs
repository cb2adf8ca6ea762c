//! dealscope binary entrypoint.
//! Boots the Axum HTTP server, wiring routes, shared state, and middleware.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dealscope::api::{self, AppState};
use dealscope::config::AppConfig;
use dealscope::metrics::Metrics;
use dealscope::profile;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dealscope=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = AppConfig::from_env();
    let state = AppState::from_config(&config)?;

    // If hot reload is enabled, spawn the background config watcher.
    profile::start_hot_reload_thread(state.profiles.clone());

    let metrics = Metrics::init(state.profiles.names().len());
    let router = api::create_router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    tracing::info!(addr = %config.addr, "dealscope scoring service ready");
    axum::serve(listener, router).await?;
    Ok(())
}
