//! vatcache - command line access to a locally cached VATSIM network snapshot.
//!
//! Every query goes through the snapshot store, which refreshes the cached
//! data feed when it is older than the staleness threshold. `watch` keeps
//! the cache warm on a fixed interval and prints newly connected clients.

mod output;

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vatcache_core::queries::ClientFilter;
use vatcache_core::{Config, DataHandler, SnapshotStore, Upstream};

#[derive(Debug, Parser)]
#[command(name = "vatcache", version, about = "Query a locally cached VATSIM network snapshot")]
struct Cli {
    /// Directory holding the cached snapshot files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Seconds before the cached snapshot is refreshed
    #[arg(long, global = true)]
    stale_after: Option<u64>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Number of connected clients (all, pilots or controllers)
    Count {
        #[arg(default_value = "all")]
        filter: ClientFilter,
    },
    /// Pilots, controllers and ATIS for an airport
    Airport { icao: String },
    /// Top 10 airports by filed departures and arrivals
    Popular,
    /// Flight information for a callsign
    Flight { callsign: String },
    /// Flight information for a connected pilot by CID
    Client { cid: i64 },
    /// All connected pilots
    Pilots,
    /// Connected controllers on active positions
    Controllers,
    /// Connected supervisors and administrators
    Supervisors,
    /// Show the cached snapshot age without refreshing
    Status,
    /// Fetch a new snapshot now
    Refresh,
    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
    /// Refresh on a fixed interval and print newly connected clients
    Watch {
        /// Seconds between refreshes
        #[arg(long)]
        interval: Option<u64>,

        /// Also write logs to a daily rolling file in this directory
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
}

/// Initialize the tracing subscriber for logging.
/// The returned guard must live until exit so buffered file logs are flushed.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "vatcache.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

/// Config file, then environment, then command line flags.
fn resolve_config(cli: &Cli) -> Config {
    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    config.apply_env();

    if let Some(ref dir) = cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if let Some(secs) = cli.stale_after {
        config.stale_after_secs = Some(secs);
    }
    if let Command::Watch {
        interval: Some(secs),
        ..
    } = cli.command
    {
        config.refresh_interval_secs = Some(secs);
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_dir = match &cli.command {
        Command::Watch { log_dir, .. } => log_dir.clone(),
        _ => None,
    };
    let _log_guard = init_tracing(log_dir.as_deref());

    let config = resolve_config(&cli);
    let json = cli.json;

    let data_dir = config.cache_dir()?;
    let client = config
        .build_client()
        .context("Failed to build HTTP client")?;
    let store = SnapshotStore::new(client, data_dir, config.stale_after())
        .context("Failed to open snapshot cache")?;
    let handler = DataHandler::new(store.clone());

    match cli.command {
        Command::Count { filter } => {
            let count = handler.count(filter).await?;
            output::print_count(count, json)?;
        }
        Command::Airport { icao } => {
            let icao = icao.trim().to_ascii_uppercase();
            let info = handler.airport_info(&icao).await?;
            output::print_airport(&icao, info.as_ref(), json)?;
        }
        Command::Popular => {
            let airports = handler.popular_airports().await?;
            output::print_popular(&airports, json)?;
        }
        Command::Flight { callsign } => {
            let pilot = handler.flight_info(&callsign.to_ascii_uppercase()).await?;
            output::print_pilot(pilot.as_ref(), json)?;
        }
        Command::Client { cid } => {
            let pilot = handler.client_details(cid).await?;
            output::print_pilot(pilot.as_ref(), json)?;
        }
        Command::Pilots => {
            let pilots = handler.clients().await?;
            output::print_pilots(&pilots, json)?;
        }
        Command::Controllers => {
            let controllers = handler.controllers().await?;
            output::print_controllers(&controllers, json)?;
        }
        Command::Supervisors => {
            let controllers = handler.supervisors().await?;
            output::print_controllers(&controllers, json)?;
        }
        Command::Status => {
            let snapshot = store
                .current()
                .await
                .context("Failed to read cached snapshot")?;
            let stale = store.is_stale().await;
            output::print_status(&store, snapshot.as_deref(), stale, json)?;
        }
        Command::Refresh => {
            let snapshot = store.refresh().await?;
            output::print_status(&store, Some(snapshot.as_ref()), false, json)?;
        }
        Command::Watch { .. } => {
            watch(store, config.refresh_interval(), json, shutdown_signal()).await?;
        }
        Command::Config { save } => {
            if save {
                config.save().context("Failed to save config")?;
                info!(path = %Config::config_path()?.display(), "Config saved");
            }
            output::print_config(&config, json)?;
        }
    }

    Ok(())
}

/// Resolves on Ctrl-C. A failure to install the handler is logged and
/// treated as never interrupted.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Refresh on every tick regardless of staleness until `shutdown` resolves.
/// A failed refresh is logged and retried on the next tick. Shutdown also
/// interrupts a refresh that is still in progress.
async fn watch<U: Upstream>(
    store: SnapshotStore<U>,
    interval: Duration,
    json: bool,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let mut events = store.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    debug!(clients = event.len(), "Network event");
                    if let Err(e) = output::print_event(&event, json) {
                        error!(error = %e, "Failed to print event");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event printer fell behind, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = interval.as_secs(), data_file = %store.current_path().display(), "Watching network");

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                info!("Interrupted, stopping watch");
                break;
            }
        }

        tokio::select! {
            result = store.refresh() => match result {
                Ok(snapshot) => info!(
                    pilots = snapshot.pilots.len(),
                    controllers = snapshot.controllers.len(),
                    "Snapshot updated"
                ),
                Err(e) => error!(error = %e, "Refresh failed, retrying on next tick"),
            },
            _ = &mut shutdown => {
                info!("Interrupted during refresh, stopping watch");
                break;
            }
        }
    }

    printer.abort();
    Ok(())
}
