//! # Sync Runner
//!
//! Runs one sync cycle against the configured remote store.
//!
//! ## Usage
//! ```bash
//! # Uses ~/.config/tally-pos/sync.toml plus TALLY_* overrides
//! cargo run -p tally-sync --bin tally-sync
//!
//! # Explicit config file, only report what is pending
//! cargo run -p tally-sync --bin tally-sync -- --config ./sync.toml --status
//! ```
//!
//! Exits non-zero when the cycle was aborted (remote unreachable).

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use tally_db::{Database, DbConfig};
use tally_sync::{SyncConfig, SyncEngine};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut status_only = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--status" | "-s" => status_only = true,
            "--help" | "-h" => {
                println!("Tally POS Sync Runner");
                println!();
                println!("Usage: tally-sync [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -s, --status         Print pending counts and exit");
                println!("  -h, --help           Show this help message");
                return ExitCode::SUCCESS;
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    match run(config_path, status_only).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!(error = %e, "Sync failed");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when the cycle was aborted.
async fn run(
    config_path: Option<PathBuf>,
    status_only: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let config = SyncConfig::load(config_path)?;
    let db_path = config.database_path()?;

    info!(path = ?db_path, "Opening ledger");
    let db = Database::new(DbConfig::new(db_path)).await?;

    if status_only {
        for count in db.sync().pending_summary().await? {
            println!("{:<22} {:>6} live {:>6} deleted", count.table.table_name(), count.live, count.tombstones);
        }
        db.close().await;
        return Ok(true);
    }

    let business_id = config.business_id()?.to_string();
    let engine = SyncEngine::from_config(db.clone(), &config)?;
    let report = engine.run(&business_id).await?;

    info!(
        uploaded = report.uploaded,
        marked = report.marked,
        failed = report.failed,
        held_back = report.held_back,
        "Sync finished"
    );

    db.close().await;
    Ok(report.aborted.is_none())
}
