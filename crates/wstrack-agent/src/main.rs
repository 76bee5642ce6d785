use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use wstrack_agent::config::{self, TrackerConfig};
use wstrack_agent::display::{ChannelSink, ConsoleRenderer};
use wstrack_agent::sampler::{Sampler, SamplerContext};
use wstrack_common::{Clock, LocalClock};
use wstrack_fetcher::SteamFetcher;
use wstrack_storage::LogStore;

const DEFAULT_CONFIG_PATH: &str = "config/wstrack.toml";

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  wstrack [config.toml]               Start tracking");
    eprintln!("                                      (default: {DEFAULT_CONFIG_PATH})");
    eprintln!("  wstrack init-config [config.toml]   Write a starter config file");
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout belongs to the renderer
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("wstrack=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("init-config") => {
            let path = args.get(2).map(String::as_str).unwrap_or(DEFAULT_CONFIG_PATH);
            config::write_starter(path)?;
            tracing::info!(path, "Starter config written, fill in api_key and entity_id");
            Ok(())
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args.get(1).map(|s| s.as_str()).unwrap_or(DEFAULT_CONFIG_PATH);
            run_tracker(config_path).await
        }
    }
}

async fn run_tracker(config_path: &str) -> Result<()> {
    let config = TrackerConfig::load(config_path)?;
    tracing::info!(
        entity_id = %config.entity_id,
        interval_secs = config.interval_secs,
        log = %config.log_path_template,
        "wstrack starting"
    );

    let clock: Arc<dyn Clock> = Arc::new(LocalClock::new());
    let fetcher = SteamFetcher::new(
        &config.endpoint,
        Duration::from_secs(config.request_timeout_secs),
        clock,
    )
    .context("Failed to build HTTP client")?;
    let store = LogStore::new(Path::new(&config.log_path_template));
    let (sink, rx) = ChannelSink::new(config.display_buffer);

    let sampler = Sampler::new(
        SamplerContext::from_config(&config),
        Arc::new(fetcher),
        Box::new(store),
        Arc::new(sink),
    );

    let shutdown = CancellationToken::new();
    let sampler_task = tokio::spawn(sampler.run(shutdown.clone()));

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            return;
        }
        tracing::info!("Shutting down gracefully");
        ctrl_c.cancel();
    });

    let shown = ConsoleRenderer::new(rx, std::io::stdout())
        .run(shutdown.clone())
        .await;

    // the renderer also returns if the sampler went away
    shutdown.cancel();
    let series = sampler_task.await.context("Sampler task panicked")?;

    tracing::info!(
        samples = series.len(),
        displayed = shown.updates(),
        "wstrack stopped"
    );
    Ok(())
}
