//! calc-server: accepts expressions over HTTP and hands their tasks to agents.

mod api;
mod router;
mod state;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::Notify;
use tracing::info;

use calc_compute::spawn_reaper;

use crate::state::AppState;

// ── CLI ─────────────────────────────────────────────────────────────

/// Expression scheduler HTTP server.
#[derive(Parser, Debug)]
#[command(name = "calc-server", version, about)]
struct Cli {
    /// Listen address, overrides HOST and PORT.
    #[arg(long, env = "CALC_ADDR")]
    addr: Option<String>,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    calc_core::config::load_dotenv();
    let cli = Cli::parse();
    let config = calc_core::Config::from_env();
    config.log_summary();

    let state = Arc::new(AppState::from_config(&config));
    let shutdown = Arc::new(Notify::new());

    let reaper = config.dispatch.task_timeout().map(|timeout| {
        info!(
            timeout_ms = config.dispatch.task_timeout_ms,
            interval_ms = config.dispatch.reaper_interval_ms,
            "task reaper enabled"
        );
        spawn_reaper(
            Arc::clone(&state.dispatcher),
            config.dispatch.reaper_interval(),
            timeout,
            Arc::clone(&shutdown),
        )
    });

    let app = router::build_router(state, &config.server.cors_origin);
    let addr = cli.addr.unwrap_or_else(|| config.server.addr());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    let signal = Arc::clone(&shutdown);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                tracing::warn!("failed to listen for ctrl-c, shutting down");
            }
            info!("shutdown signal received");
            signal.notify_one();
        })
        .await?;

    if let Some(reaper) = reaper {
        if let Err(e) = reaper.await {
            tracing::warn!(error = %e, "task reaper failed");
        }
    }
    info!("server stopped");
    Ok(())
}
