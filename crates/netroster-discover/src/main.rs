//! CLI entry point for netroster.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use netroster_core::{CompanionRecord, EventSource, ScanResult};
use netroster_inventory::{FileStore, GraphConfig, GraphStore, InventoryStore, MemoryStore};

use netroster_discover::companion::{self, CommandSource, PairedDeviceSource};
use netroster_discover::config::{DiscoverConfig, StoreBackend, StoreConfig};
use netroster_discover::range::SweepRange;
use netroster_discover::scheduler::SweepScheduler;
use netroster_discover::{classify, ingest, merge, Sweeper};

const COMPANION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "netroster")]
#[command(about = "Network sweep and device inventory reconciliation")]
struct Cli {
    /// Config file prefix (default: netroster).
    #[arg(short, long, default_value = "netroster", global = true)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe a range and reconcile live hosts with the inventory.
    Sweep {
        /// Range in CIDR notation, e.g. 192.168.1.0/24.
        #[arg(short, long)]
        range: String,
    },
    /// List live interfaces of this machine.
    Interfaces,
    /// Label inventory segments by operational role.
    Classify,
    /// Paired companion devices.
    Companion {
        #[command(subcommand)]
        action: CompanionAction,
    },
    /// Reconcile a router client list (JSON) with the inventory.
    MergeClients {
        /// JSON file holding the client list.
        #[arg(short, long)]
        file: String,
        /// Range the clients were collected from.
        #[arg(short, long)]
        range: String,
    },
    /// Run scheduled sweeps from the config.
    Daemon,
}

#[derive(Subcommand)]
enum CompanionAction {
    /// List paired devices and whether they are already known.
    Scan,
    /// Import paired devices into the inventory.
    Import {
        /// JSON array of records to import; defaults to everything listed.
        #[arg(short, long)]
        file: Option<String>,
    },
    /// Refresh connectivity status of known companion devices.
    Refresh,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_discover_config(&cli.config)?;
    let store = open_store(&config.store).await?;

    match cli.command {
        Command::Sweep { range } => {
            let sweeper = Sweeper::from_config(&config, store);
            let report = sweeper.probe_range(&range).await?;
            emit(&report.results)?;
        }
        Command::Interfaces => {
            let sweeper = Sweeper::from_config(&config, store);
            emit(&sweeper.collaborators().interfaces.list_interfaces().await)?;
        }
        Command::Classify => {
            let sweeper = Sweeper::from_config(&config, store.clone());
            let interfaces = sweeper.collaborators().interfaces.clone();
            let labels = classify::classify_inventory(store.as_ref(), interfaces.as_ref()).await?;
            emit(&labels)?;
        }
        Command::Companion { action } => {
            let source = companion_source(&config);
            let sweeper = Sweeper::from_config(&config, store.clone());
            let vendors = sweeper.collaborators().vendors.clone();
            match action {
                CompanionAction::Scan => {
                    let listed =
                        companion::scan(source.as_ref(), store.as_ref(), vendors.as_ref()).await?;
                    emit(&listed)?;
                }
                CompanionAction::Import { file } => {
                    let records = match file {
                        Some(path) => {
                            let text = tokio::fs::read_to_string(&path).await?;
                            serde_json::from_str::<Vec<CompanionRecord>>(&text)?
                        }
                        None => source.paired_devices().await?,
                    };
                    let outcome =
                        companion::import(store.as_ref(), vendors.as_ref(), records).await?;
                    emit(&serde_json::json!({
                        "imported": outcome.imported,
                        "renamed": outcome.renamed,
                    }))?;
                }
                CompanionAction::Refresh => {
                    let outcome = companion::refresh_status(source.as_ref(), store.as_ref()).await?;
                    emit(&serde_json::json!({ "updated": outcome.updated }))?;
                }
            }
        }
        Command::MergeClients { file, range } => {
            let range = SweepRange::parse(&range)?;
            let text = tokio::fs::read_to_string(&file).await?;
            let (inside, outside): (Vec<_>, Vec<_>) = ingest::parse_client_records(&text)?
                .into_iter()
                .partition(|host| range.contains(&host.address));
            if !outside.is_empty() {
                tracing::warn!(
                    range = %range,
                    skipped = outside.len(),
                    "Client records outside the range ignored"
                );
            }

            let outcome =
                merge::reconcile(store.as_ref(), &range.cidr(), inside, EventSource::Import).await?;
            let results: Vec<ScanResult> = outcome.results.iter().map(ScanResult::from).collect();
            emit(&results)?;
        }
        Command::Daemon => {
            let sweeper = Sweeper::from_config(&config, store);
            let scheduler = SweepScheduler::new(config.clone(), sweeper)
                .with_companions(companion_source(&config));
            scheduler.run().await?;
        }
    }

    Ok(())
}

fn emit<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn companion_source(config: &DiscoverConfig) -> Arc<dyn PairedDeviceSource> {
    Arc::new(CommandSource::new(
        config.companion_command.clone(),
        COMPANION_TIMEOUT,
    ))
}

async fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn InventoryStore>> {
    let store: Arc<dyn InventoryStore> = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File => Arc::new(FileStore::open(&config.path).await?),
        StoreBackend::Neo4j => {
            let graph_config = GraphConfig {
                uri: config.neo4j_uri.clone(),
                user: config.neo4j_user.clone(),
                password: config.neo4j_password.clone(),
                ..Default::default()
            };
            Arc::new(GraphStore::connect(&graph_config).await?)
        }
    };
    tracing::info!(backend = ?config.backend, "Inventory store opened");
    Ok(store)
}

fn load_discover_config(file_prefix: &str) -> anyhow::Result<DiscoverConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("NETROSTER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<DiscoverConfig>("discover") {
        Ok(c) => Ok(c),
        Err(config::ConfigError::NotFound(_)) => Ok(DiscoverConfig::default()),
        Err(e) => Err(e.into()),
    }
}
