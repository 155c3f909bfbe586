// ------------------------------------------------------------
// Module declarations
// ------------------------------------------------------------
//
// Each module represents a well-defined responsibility:
//
// - config:      Configuration structs loaded from JSON
// - schema:      Listing types shared by adapters and stores
// - util:        Shared helpers (text cleanup, selectors, URLs)
// - error:       Error taxonomy per pipeline stage
// - metrics:     Process-wide counters
// - http_client: Retrying HTTP GET used by every adapter
// - sources:     Source adapters and adapter registry
// - store:       Listing persistence (Redis, in-memory)
// - collector:   Run orchestration (freshness, pool, summary)
//
mod collector;
mod config;
mod error;
mod http_client;
mod metrics;
mod schema;
mod sources;
mod store;
mod util;

// ------------------------------------------------------------
// External dependencies
// ------------------------------------------------------------

use std::fs;
use std::time::Duration;

use anyhow::Context;
use log::{info, warn};

use collector::runner::{run_all, RunContext, RunOptions};
use config::Config;
use http_client::HttpFetcher;
use metrics::METRICS;
use sources::build_registrations;

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// Usage: jobfeed-collector [config.json] [--purge | --list <source_id>]
//
// Responsibilities:
// - Initialize logging and the rustls crypto backend
// - Load and validate configuration
// - Open the listing store
// - Run every enabled source once, or on a fixed interval
//
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    http_client::install_crypto_provider();

    let cli = parse_args(std::env::args().skip(1))?;

    // --------------------------------------------------------
    // Load configuration from disk
    //
    // NOTE:
    // - The store URL may carry credentials.
    // - It must not be committed to version control.
    // --------------------------------------------------------
    let config = load_config(&cli.config_path)?;
    config.validate()?;

    let store = store::open(&config.store)
        .await
        .context("failed to open listing store")?;

    // --------------------------------------------------------
    // Maintenance commands: run against the store and exit
    // --------------------------------------------------------
    match &cli.command {
        Command::Run => {}
        Command::Purge => {
            let removed = store.delete_all().await?;
            info!("purged {} listings", removed);
            return Ok(());
        }
        Command::List(source_id) => {
            let listings = store.listings_for(source_id).await?;
            for listing in &listings {
                println!("{}", serde_json::to_string(listing)?);
            }
            info!("{} listings stored for {}", listings.len(), source_id);
            return Ok(());
        }
    }

    let ctx = RunContext {
        store,
        http: HttpFetcher::new(&config.http)?,
    };
    let opts = RunOptions {
        concurrency: config.ingest.concurrency,
        freshness_window: config.ingest.freshness_window(),
    };

    let registrations = build_registrations(&config.sources);
    if registrations.is_empty() {
        warn!("no enabled sources configured, nothing to do");
        return Ok(());
    }

    // --------------------------------------------------------
    // Single run, or one run per interval tick
    //
    // Runs never overlap: the next tick is awaited only after
    // the previous summary is complete.
    // --------------------------------------------------------
    let Some(every) = config.ingest.run_interval_secs.filter(|s| *s > 0) else {
        let summary = run_all(&registrations, &ctx, &opts).await?;
        summary.log_report();
        info!("[METRICS] {}", METRICS.report());
        return Ok(());
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(every));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let summary = run_all(&registrations, &ctx, &opts).await?;
        summary.log_report();
        info!("[METRICS] {}", METRICS.report());
    }
}

// ------------------------------------------------------------
// Command line
// ------------------------------------------------------------

const USAGE: &str = "usage: jobfeed-collector [config.json] [--purge | --list <source_id>]";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    /// Ingest every enabled source
    Run,

    /// Delete every stored listing
    Purge,

    /// Print the stored listings of one source as JSON lines
    List(String),
}

#[derive(Debug, PartialEq, Eq)]
struct Cli {
    config_path: String,
    command: Command,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Cli> {
    let mut config_path = None;
    let mut command = Command::Run;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let next = match arg.as_str() {
            "--purge" => Command::Purge,
            "--list" => match args.next() {
                Some(id) if !id.starts_with('-') => Command::List(id),
                _ => anyhow::bail!("--list needs a source id\n{USAGE}"),
            },
            flag if flag.starts_with('-') => {
                anyhow::bail!("unknown option '{flag}'\n{USAGE}")
            }
            path => {
                if config_path.replace(path.to_string()).is_some() {
                    anyhow::bail!("more than one config path given\n{USAGE}");
                }
                continue;
            }
        };

        if command != Command::Run {
            anyhow::bail!("--purge and --list are mutually exclusive\n{USAGE}");
        }
        command = next;
    }

    Ok(Cli {
        config_path: config_path.unwrap_or_else(|| "config.json".to_string()),
        command,
    })
}

// ------------------------------------------------------------
// Configuration loader
// ------------------------------------------------------------
//
// Reads a JSON configuration file from disk and deserializes
// it into the strongly typed `Config` structure.
//
fn load_config(path: &str) -> anyhow::Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {path}"))?;
    let cfg = serde_json::from_str(&data)
        .with_context(|| format!("invalid config file {path}"))?;
    Ok(cfg)
}
