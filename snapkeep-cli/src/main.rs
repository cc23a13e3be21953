/*!
snapkeep CLI - change-aware snapshot rotation for btrfs-style subvolumes.

For every subvolume argument: take a new read-only snapshot if the subvolume
changed since the last one, then prune expired snapshots while always keeping
the newest `--min-count`.
*/

use std::path::{Path, PathBuf};
use std::process::{exit, Command};

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::error::ErrorKind;
use clap::Parser;
use snapkeep_core::{
    naming, BtrfsStore, RetentionEngine, RetentionPolicy, SnapkeepError, SnapshotIndex,
    SnapshotStore,
};
use tabled::{Table, Tabled};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "snapkeep")]
#[command(about = "Snapshot rotation for btrfs-style subvolumes")]
#[command(version)]
struct Cli {
    /// Days after which a snapshot expires; 0 disables the age filter and
    /// prunes down to the floor on every run
    #[arg(
        short = 't',
        long,
        env = "SNAP_EXPIRATION_DAYS",
        default_value_t = RetentionPolicy::DEFAULT_EXPIRATION_DAYS,
        value_name = "DAYS"
    )]
    expiration_days: u32,

    /// Number of newest snapshots that always survive pruning
    #[arg(
        short = 'n',
        long,
        env = "SNAP_MIN_COUNT",
        default_value_t = RetentionPolicy::DEFAULT_MIN_COUNT,
        value_name = "COUNT"
    )]
    min_count: u32,

    /// Print what would be created and deleted, without touching the store
    #[arg(long)]
    dry_run: bool,

    /// List existing snapshots instead of running retention
    #[arg(short, long, conflicts_with = "dry_run")]
    list: bool,

    /// Emit --list output as JSON
    #[arg(long, requires = "list")]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Subvolumes to process
    #[arg(required = true, value_name = "SUBVOL")]
    subvolumes: Vec<PathBuf>,
}

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "Snapshot")]
    name: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Age (days)")]
    age_days: i64,
    #[tabled(rename = "Path")]
    path: String,
}

fn main() {
    let cli = parse_or_exit();

    init_logging(cli.verbose);

    // Mutating runs need store privileges; listing and planning do not.
    if !cli.list && !cli.dry_run {
        if let Err(err) = require_root() {
            error!("{err:#}");
            exit(1);
        }
    }

    match run(&cli) {
        Ok(true) => {}
        Ok(false) => exit(1),
        Err(err) => {
            error!("{err:#}");
            exit(1);
        }
    }
}

/// Parse arguments with the historical exit-code contract: 1 for missing
/// arguments or unknown flags, 2 for invalid option values.
fn parse_or_exit() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = exit_code_for(err.kind());
            let _ = err.print();
            exit(code);
        }
    }
}

fn exit_code_for(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        ErrorKind::ValueValidation | ErrorKind::InvalidValue => 2,
        _ => 1,
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"))
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Store mutations require an effective uid of 0; checked once at startup.
fn require_root() -> anyhow::Result<()> {
    let output = Command::new("id")
        .arg("-u")
        .output()
        .context("failed to determine effective uid")?;
    let uid = String::from_utf8_lossy(&output.stdout);
    if uid.trim() != "0" {
        anyhow::bail!("snapkeep must be run as root");
    }
    Ok(())
}

/// Process every subvolume argument in order. Invalid targets are skipped
/// (reported, final exit nonzero); store failures abort the run.
fn run(cli: &Cli) -> anyhow::Result<bool> {
    let policy = RetentionPolicy::new(cli.expiration_days, cli.min_count);
    let store = BtrfsStore::new();
    let engine = RetentionEngine::new(&store, policy);
    let now = Utc::now();

    let mut all_ok = true;
    for subvolume in &cli.subvolumes {
        let outcome = if cli.list {
            list_snapshots(&store, subvolume, cli.json, now)
        } else if cli.dry_run {
            dry_run(&engine, subvolume, now)
        } else {
            run_retention(&engine, subvolume, now)
        };

        match outcome {
            Ok(()) => {}
            Err(err) => match err.downcast_ref::<SnapkeepError>() {
                Some(SnapkeepError::NotASubvolume(path)) => {
                    error!("not a subvolume, skipped: {}", path.display());
                    all_ok = false;
                }
                _ => return Err(err),
            },
        }
    }
    Ok(all_ok)
}

fn run_retention(
    engine: &RetentionEngine<'_, BtrfsStore>,
    subvolume: &Path,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let report = engine
        .process(subvolume, now)
        .with_context(|| format!("processing {}", subvolume.display()))?;
    info!(
        subvolume = %report.subvolume.display(),
        created = report.created.is_some(),
        deleted = report.deleted.len(),
        "done"
    );
    Ok(())
}

fn dry_run(
    engine: &RetentionEngine<'_, BtrfsStore>,
    subvolume: &Path,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let decision = engine.decide(subvolume, now)?;

    match &decision.create {
        Some(target) => println!("would create {}", target.display()),
        None => println!("{}: unchanged, no snapshot needed", subvolume.display()),
    }
    for snapshot in &decision.to_delete {
        println!("would delete {}", snapshot.path.display());
    }
    Ok(())
}

fn list_snapshots(
    store: &BtrfsStore,
    subvolume: &Path,
    json: bool,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    if !store.is_subvolume(subvolume)? {
        return Err(SnapkeepError::NotASubvolume(subvolume.to_path_buf()).into());
    }
    let name = naming::subvolume_name(subvolume)?;
    let snap_dir = naming::snapshot_dir(subvolume)?;
    let snapshots = SnapshotIndex::new(store).list(&snap_dir, name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
        return Ok(());
    }

    if snapshots.is_empty() {
        println!("no snapshots for {}", subvolume.display());
        return Ok(());
    }

    let rows: Vec<SnapshotRow> = snapshots
        .iter()
        .map(|snap| SnapshotRow {
            name: snap.name.clone(),
            created: snap.timestamp.format(naming::TIMESTAMP_FORMAT).to_string(),
            age_days: (now - snap.modified).num_days(),
            path: snap.path.display().to_string(),
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}
