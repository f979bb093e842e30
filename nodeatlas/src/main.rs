use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::{error, info, warn};

use nodeatlas::config::AtlasConfig;
use nodeatlas::geo::GeoReader;
use nodeatlas::output::{self, OutputFormat};
use nodeatlas::persist;
use nodeatlas::pipeline;
use nodeatlas::probes::Network;

#[derive(Parser)]
#[command(name = "nodeatlas")]
#[command(version)]
#[command(about = "Locate block-producing nodes and map their hosting infrastructure", long_about = None)]
struct Cli {
    /// Network to probe, or "all"
    #[arg(long, short)]
    network: String,

    /// Output format
    #[arg(long, short, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Path to a TOML config file
    #[arg(long, short, env = "NODEATLAS_CONFIG")]
    config: Option<String>,

    /// Skip writing results to the database
    #[arg(long)]
    no_persist: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AtlasConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => AtlasConfig::default(),
    };

    // Initialize structured logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid config: {}", e))?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting nodeatlas");

    let networks: Vec<Network> = if cli.network.eq_ignore_ascii_case("all") {
        Network::ALL.to_vec()
    } else {
        vec![cli.network.parse()?]
    };

    let geo = GeoReader::open(&config.geodb)?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.sources.source_timeout_seconds))
        .build()
        .context("Failed to build HTTP client")?;

    let mut db = if cli.no_persist {
        None
    } else {
        Some(persist::init_db(&config.database.path).context("Failed to open database")?)
    };

    let deadline = Duration::from_secs(config.sources.run_deadline_seconds);
    let mut stdout = std::io::stdout().lock();
    let mut any_failed = false;

    for network in networks {
        // One network failing must not abort the others
        let outcome =
            match tokio::time::timeout(deadline, pipeline::run_network(network, &config, &geo, &client))
                .await
            {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    error!(network = %network, error = %e, "Run failed");
                    any_failed = true;
                    continue;
                }
                Err(_) => {
                    error!(network = %network, deadline_secs = deadline.as_secs(), "Run deadline exceeded");
                    any_failed = true;
                    continue;
                }
            };

        if !outcome.failed_sources.is_empty() {
            warn!(
                network = %network,
                failed = ?outcome.failed_sources,
                "Run completed with partial failures"
            );
        }

        if let Some(conn) = db.as_mut() {
            let run_id = persist::save_crawl_run(conn, &outcome.crawl_run())?;
            persist::save_nodes(conn, &outcome.nodes, &run_id)?;
        }

        output::render(&mut stdout, &outcome, cli.format)?;
    }

    if any_failed {
        std::process::exit(1);
    }
    Ok(())
}
