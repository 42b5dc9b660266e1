//! sibyld — Sibyl daemon.
//!
//! Serves the interpretation API over HTTP, fronting a streaming
//! narrative provider with per-identity rate limiting, response caching,
//! and metrics exposition.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sibyl::server::config::{Config, Secrets};
use sibyl::{Oracle, Sibyl, SibylError};

/// Sibyl daemon — interpretation request orchestration service.
#[derive(Parser)]
#[command(name = "sibyld")]
#[command(version)]
#[command(about = "Sibyl card reading orchestration daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sibyl=info")),
        )
        .init();

    let args = Args::parse();

    // Load configuration and the API key
    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;

    // Build the oracle from config
    let oracle = build_oracle(&config, &secrets)?;

    let address = &config.server.address;
    let listener = TcpListener::bind(address).await?;
    info!(version = env!("CARGO_PKG_VERSION"), %address, "sibyld starting");

    sibyl::server::serve(listener, Arc::new(oracle)).await?;

    Ok(())
}

/// Build an [`Oracle`] from configuration.
fn build_oracle(config: &Config, secrets: &Secrets) -> Result<Oracle, SibylError> {
    let mut builder = Sibyl::builder()
        .rate_limit(
            config.limits.requests_per_window,
            Duration::from_secs(config.limits.window_secs),
        )
        .sweep_interval(Duration::from_secs(config.limits.sweep_interval_secs))
        .cache_ttl(Duration::from_secs(config.cache.ttl_secs))
        .cache_max_entries(config.cache.max_entries);

    if let Some(key) = secrets.api_key() {
        builder = builder.api_key(key);
    }
    if let Some(ref base_url) = config.provider.base_url {
        builder = builder.base_url(base_url.clone());
    }
    if let Some(ref model) = config.provider.model {
        builder = builder.model(model.clone());
    }

    builder.build()
}
