use std::path::PathBuf;

use azimuth_common::{
    Address,
    types::{AuditEntry, RawEvent},
};
use azimuth_replay::{
    ReplayConfig, Replayer,
    config::{DEFAULT_MAX_COMMIT_RETRIES, DEFAULT_PAGE_SIZE},
};
use azimuth_storage::Store;
use clap::{Parser as ClapParser, Subcommand as ClapSubcommand};
use eyre::eyre;
use tracing::{Level, info};
use url::Url;

use crate::{initializers::init_store, roller::check_points_against_roller};

pub const VERSION_STRING: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_DATADIR: &str = "azimuth.db";

#[allow(clippy::upper_case_acronyms)]
#[derive(ClapParser)]
#[command(name="azimuth", author, version=VERSION_STRING, about, long_about = None)]
pub struct CLI {
    #[clap(flatten)]
    pub opts: Options,
    #[command(subcommand)]
    pub command: Subcommand,
}

#[derive(ClapParser)]
pub struct Options {
    #[arg(
        long = "datadir",
        value_name = "DATABASE_PATH",
        default_value = DEFAULT_DATADIR,
        env = "AZIMUTH_DATADIR",
        help = "If the datadir is the word `memory`, azimuth will use the in-memory engine and nothing is persisted.",
        global = true
    )]
    pub datadir: String,
    #[arg(
        long = "log.level",
        default_value_t = Level::INFO,
        value_name = "LOG_LEVEL",
        global = true
    )]
    pub log_level: Level,
}

#[derive(ClapParser)]
pub struct ReplayOptions {
    #[arg(
        long,
        value_name = "ADDRESS",
        env = "AZIMUTH_REGISTRY_ADDRESS",
        help = "Contract emitting the L1 registry events.",
        help_heading = "Deployment options"
    )]
    pub registry_address: Address,
    #[arg(
        long,
        value_name = "ADDRESS",
        env = "AZIMUTH_ROLLUP_ADDRESS",
        help = "Contract emitting the rollup batch events.",
        help_heading = "Deployment options"
    )]
    pub rollup_address: Address,
    #[arg(
        long,
        value_name = "UINT64",
        env = "AZIMUTH_ROLLUP_GENESIS_BLOCK",
        help = "First L1 block of the rollup.",
        help_heading = "Deployment options"
    )]
    pub rollup_genesis_block: u64,
    #[arg(
        long,
        value_name = "ADDRESS",
        env = "AZIMUTH_DEPOSIT_ADDRESS",
        help = "Address that moves a point onto the rollup when it becomes its owner or spawn proxy.",
        help_heading = "Deployment options"
    )]
    pub deposit_address: Address,
    #[arg(
        long,
        default_value_t = DEFAULT_PAGE_SIZE,
        value_name = "UINT64",
        help = "Registry events committed per page before the rollup genesis.",
        help_heading = "Replay options"
    )]
    pub page_size: u64,
    #[arg(
        long,
        value_name = "UINT64",
        help = "Events committed per page after the rollup genesis. Everything is committed at once when unset.",
        help_heading = "Replay options"
    )]
    pub interleaved_page_size: Option<u64>,
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_COMMIT_RETRIES,
        value_name = "UINT32",
        help_heading = "Replay options"
    )]
    pub max_commit_retries: u32,
}

impl From<ReplayOptions> for ReplayConfig {
    fn from(opts: ReplayOptions) -> Self {
        Self {
            registry_address: opts.registry_address,
            rollup_address: opts.rollup_address,
            rollup_genesis_block: opts.rollup_genesis_block,
            deposit_address: opts.deposit_address,
            page_size: opts.page_size,
            interleaved_page_size: opts.interleaved_page_size,
            max_commit_retries: opts.max_commit_retries,
        }
    }
}

#[allow(clippy::large_enum_variant)]
#[derive(ClapSubcommand)]
pub enum Subcommand {
    #[command(name = "replay", about = "Replay every unprocessed event into the point table")]
    Replay {
        #[clap(flatten)]
        opts: ReplayOptions,
    },
    #[command(name = "import", about = "Ingest raw events from a JSON file")]
    Import {
        #[arg(value_name = "FILE", help = "JSON array of raw event logs.")]
        path: PathBuf,
    },
    #[command(name = "point", about = "Print the stored record of a point as JSON")]
    Point {
        #[arg(value_name = "POINT")]
        number: u32,
    },
    #[command(name = "diffs", about = "Print the audit log of a point")]
    Diffs {
        #[arg(value_name = "POINT")]
        number: u32,
        #[arg(
            long,
            value_name = "ADDRESS",
            env = "AZIMUTH_ROLLUP_ADDRESS",
            help = "Diffs from this contract are shown as L2, everything else as L1."
        )]
        rollup_address: Address,
    },
    #[command(name = "checkpoint", about = "Write a consistent copy of the database")]
    Checkpoint {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    #[command(
        name = "check-roller",
        about = "Compare every stored point with a roller's getPoint answer"
    )]
    CheckRoller {
        #[arg(long, value_name = "URL", env = "AZIMUTH_ROLLER_URL")]
        url: Url,
    },
}

impl Subcommand {
    pub async fn run(self, opts: &Options) -> eyre::Result<()> {
        let store = init_store(&opts.datadir)?;
        match self {
            Subcommand::Replay { opts } => {
                let stats = Replayer::new(store, opts.into()).run().await?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            Subcommand::Import { path } => {
                let contents = std::fs::read(&path)?;
                let events: Vec<RawEvent> = serde_json::from_slice(&contents)?;
                let imported = import_events(&store, events).await?;
                info!("Imported {imported} events from {}", path.display());
            }
            Subcommand::Point { number } => {
                let point = store
                    .get_point(number)
                    .await?
                    .ok_or_else(|| eyre!("Point {number} not found"))?;
                println!("{}", serde_json::to_string_pretty(&point)?);
            }
            Subcommand::Diffs {
                number,
                rollup_address,
            } => {
                let entries = store.get_diffs_for_point(number).await?;
                println!(
                    "{:>8}  {:<5} {:<66} {:>5}  {:<22} DATA",
                    "ID", "LAYER", "TX HASH", "IDX", "OPERATION"
                );
                for entry in &entries {
                    println!("{}", format_audit_entry(entry, rollup_address));
                }
            }
            Subcommand::Checkpoint { path } => {
                store.checkpoint(&path).await?;
            }
            Subcommand::CheckRoller { url } => {
                let mismatched = check_points_against_roller(&store, url).await?;
                info!("{mismatched} points differ from the roller");
            }
        }
        Ok(())
    }
}

/// Adds every event to the store. A log that was already ingested without its
/// call-data gets it back-filled.
async fn import_events(store: &Store, events: Vec<RawEvent>) -> eyre::Result<usize> {
    let count = events.len();
    for event in events {
        let (block_number, log_index) = event.position();
        let data = event.data.clone();
        let id = store.add_event(event).await?;
        if data.is_empty() {
            continue;
        }
        let stored_without_data = store
            .get_event(id)
            .await?
            .is_some_and(|stored| stored.data.is_empty());
        if stored_without_data {
            store.set_event_data(block_number, log_index, data).await?;
        }
    }
    Ok(count)
}

fn format_audit_entry(entry: &AuditEntry, rollup_address: Address) -> String {
    let layer = if entry.contract_address == rollup_address {
        "L2"
    } else {
        "L1"
    };
    format!(
        "{:>8}  {:<5} {:#x} {:>5}  {:<22} 0x{}",
        entry.id,
        layer,
        entry.tx_hash,
        entry.diff.intra_batch_index,
        entry.diff.operation.to_string(),
        hex::encode(&entry.diff.data)
    )
}
