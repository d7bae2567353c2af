//! board-exporter - GitHub project board metrics
//!
//! Usage:
//!   board-exporter [serve]          Refresh in the background and serve /metrics
//!   board-exporter render           Run one cycle and print the metrics

use anyhow::{Context, Result};
use board_core::ExporterConfig;
use board_metrics::{BoardExporter, RefreshingCache};
use board_source::GithubSource;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "board-exporter")]
#[command(author, version, about = "Export GitHub project board metrics")]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "board-exporter.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh metrics periodically and serve them over HTTP
    Serve {
        /// Listen address, overrides the configuration
        #[arg(long)]
        listen: Option<String>,
    },

    /// Run one refresh cycle and print the metrics
    Render {
        /// Do not write column summaries back to the board
        #[arg(long)]
        no_update: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = load_config(&cli.config)?;

    match cli.command.unwrap_or(Commands::Serve { listen: None }) {
        Commands::Serve { listen } => serve(config, listen).await,
        Commands::Render { no_update } => render(config, no_update).await,
    }
}

fn load_config(path: &Path) -> Result<ExporterConfig> {
    ExporterConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

fn exporter(config: &ExporterConfig) -> Result<BoardExporter<GithubSource>> {
    let source = GithubSource::new(
        config.api_url.as_str(),
        config.access_token.as_str(),
        config.request_timeout(),
    )?;
    Ok(BoardExporter::from_config(source, config)?)
}

async fn serve(config: ExporterConfig, listen: Option<String>) -> Result<()> {
    let exporter = exporter(&config)?;
    let addr = listen.unwrap_or_else(|| config.listen.clone());

    info!(
        "Exporting project {} every {:?}",
        config.project_id,
        config.refresh_period()
    );
    let cache = RefreshingCache::start(config.refresh_period(), exporter).await;

    let served = board_server::serve(cache.handle(), &addr, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
        }
    })
    .await;

    cache.shutdown().await;
    served
}

async fn render(config: ExporterConfig, no_update: bool) -> Result<()> {
    let exporter = exporter(&config)?.with_write_back(config.update_notes && !no_update);
    let text = exporter
        .render()
        .await
        .context("Failed to collect board metrics")?;
    println!("{}", text);
    Ok(())
}
