use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use pitwall_server::ServerConfig;

/// Vehicle-telemetry broadcast relay: POST JSON at `/data`, watch it live on
/// every dashboard connected at `/ws`.
#[derive(Parser, Debug)]
#[command(name = "pitwall", version, about)]
struct Cli {
    /// Listening port.
    #[arg(long, env = "PITWALL_PORT", default_value_t = 8080)]
    port: u16,

    /// Document root for dashboard assets.
    #[arg(long, env = "PITWALL_DOC_ROOT", default_value = "public")]
    doc_root: PathBuf,

    /// Seconds between demo feed frames.
    #[arg(long, default_value_t = 3)]
    feed_interval_secs: u64,

    /// Disable the synthetic demo feed.
    #[arg(long)]
    no_synthetic: bool,

    /// Replay a JSON-lines telemetry recording alongside live traffic.
    #[arg(long)]
    replay: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig {
        port: cli.port,
        doc_root: cli.doc_root,
        synthetic_feed: !cli.no_synthetic,
        feed_interval: Duration::from_secs(cli.feed_interval_secs),
        replay_path: cli.replay,
        ..Default::default()
    };

    let handle = match pitwall_server::start(config).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(error = %e, kind = e.error_kind(), "failed to start");
            std::process::exit(1);
        }
    };

    tracing::info!(port = handle.port, "pitwall ready");

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl+c");

    tracing::info!("shutting down");
}
