//! Marquee RPC Server - JSON-RPC backend for the artwork dashboard.
//!
//! This binary provides a JSON-RPC 2.0 server that wraps the marquee-core
//! library for the presentation layer.

mod handlers;
mod server;
mod wrapper;

use anyhow::{Context, Result};
use clap::Parser;
use marquee_library::config::{parse_root_list, ScanConfig};
use marquee_library::{LibraryConfig, MarqueeApi, SlackWebhookNotifier, TmdbCatalog};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "marquee-rpc")]
#[command(about = "JSON-RPC server for the Marquee artwork dashboard")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Comma separated movie library roots
    #[arg(long, env = "MOVIE_FOLDERS", default_value = "")]
    movie_folders: String,

    /// Comma separated TV library roots
    #[arg(long, env = "TV_FOLDERS", default_value = "")]
    tv_folders: String,

    /// Directory for the ledger and directory map (defaults to the platform data dir)
    #[arg(long, env = "MARQUEE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// TMDb API key; artwork search is disabled without it
    #[arg(long, env = "TMDB_API_KEY", hide_env_values = true)]
    tmdb_api_key: Option<String>,

    /// Slack incoming webhook for save notifications
    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
    slack_webhook_url: Option<String>,

    /// Item directories probed in parallel during a scan
    #[arg(long, default_value_t = ScanConfig::DEFAULT_CONCURRENCY)]
    scan_concurrency: usize,
}

impl Args {
    fn library_config(&self) -> Result<LibraryConfig> {
        let data_dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => LibraryConfig::default_data_dir()
                .context("No platform data directory; pass --data-dir")?,
        };
        let mut config = LibraryConfig::new(data_dir);
        config.movie_roots = parse_root_list(&self.movie_folders);
        config.tv_roots = parse_root_list(&self.tv_folders);
        config.scan_concurrency = self.scan_concurrency;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --debug
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Starting Marquee RPC Server");

    let config = args.library_config()?;
    let mut builder = MarqueeApi::builder(config);

    match args.tmdb_api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => builder = builder.with_catalog(Arc::new(TmdbCatalog::new(key)?)),
        None => warn!("TMDB_API_KEY not set, artwork search disabled"),
    }
    if let Some(url) = args.slack_webhook_url.as_deref().filter(|u| !u.is_empty()) {
        builder = builder.with_notifier(Arc::new(SlackWebhookNotifier::new(url)?));
    }

    let api = builder.build().await?;
    info!("Data directory: {}", api.data_dir().display());

    // Start the server
    let addr = server::start_server(api, &args.host, args.port).await?;

    // Print port for the presentation layer to read (intentional stdout)
    println!("RPC_PORT={}", addr.port());

    info!("RPC server running on {}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
