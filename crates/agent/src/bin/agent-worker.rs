//! agent-worker: pulls ready tasks from a calc server, computes them and
//! posts the results back, `computing_power` tasks at a time.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use calc_agent::{AgentPool, HttpTaskSource};

// ── CLI ─────────────────────────────────────────────────────────────

/// Remote compute agent for the calc server.
#[derive(Parser, Debug)]
#[command(name = "agent-worker", version, about)]
struct Cli {
    /// Server base URL, overrides CALC_SERVER_URL.
    #[arg(long)]
    server: Option<String>,

    /// Concurrent workers, overrides COMPUTING_POWER.
    #[arg(long)]
    computing_power: Option<usize>,

    /// Idle poll interval in milliseconds, overrides AGENT_POLL_INTERVAL_MS.
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Seconds to wait for workers to stop after Ctrl-C.
    #[arg(long, env = "AGENT_SHUTDOWN_TIMEOUT", default_value_t = 10)]
    shutdown_timeout: u64,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    calc_core::config::load_dotenv();
    let cli = Cli::parse();
    let mut config = calc_core::Config::from_env();
    if let Some(server) = cli.server {
        config.agent.server_url = server;
    }
    if let Some(n) = cli.computing_power {
        config.agent.computing_power = n.max(1);
    }
    if let Some(ms) = cli.poll_interval_ms {
        config.agent.poll_interval_ms = ms;
    }
    config.log_summary();

    let source = Arc::new(HttpTaskSource::new(&config.agent.server_url));
    let pool = AgentPool::spawn(source, config.agent.computing_power, config.agent.poll_interval());
    info!(
        workers = pool.size(),
        server = %config.agent.server_url,
        "agent started"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    pool.shutdown();

    match tokio::time::timeout(Duration::from_secs(cli.shutdown_timeout), pool.join()).await {
        Ok(stats) => info!(completed = stats.completed, dropped = stats.dropped, "agent stopped"),
        Err(_) => tracing::warn!("workers did not stop within {}s", cli.shutdown_timeout),
    }
    Ok(())
}
