//! pgsentinel: scheduled Postgres backups to S3-compatible storage, with
//! guarded restores into a test database.

// pgsentinel/src/main.rs
mod backup;
mod config;
mod errors;
mod http;
mod logstore;
mod pgtools;
mod restore;
mod scheduler;
mod service;
mod storage;
mod utils;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use service::Sentinel;
use utils::format_megabytes;

#[derive(Parser)]
#[command(name = "pgsentinel", version, about = "Postgres backup and restore orchestrator")]
struct Cli {
    /// Increase log verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daily scheduler and the HTTP API
    Serve,
    /// Take one backup now
    Backup,
    /// Restore a stored backup into the test database
    Restore {
        /// Object key of the backup, e.g. backup_20240101_030000.sql
        filename: String,
    },
    /// List stored backups, newest first
    List,
    /// Show recent backup log entries
    Logs {
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Create the backup log table if it does not exist
    InitDb,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run_app(cli.command).await {
        Ok(()) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = if verbose > 0 { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn run_app(command: Command) -> Result<()> {
    let service = Arc::new(Sentinel::from_environment());

    match command {
        Command::Serve => {
            let settings = service.settings().load();
            let schedule = settings.schedule().context("Invalid backup schedule")?;
            let addr = settings.bind_addr().context("Invalid bind address")?;
            service.init_log_store().await;

            let scheduler = scheduler::spawn_daily_backup(service.clone(), schedule);
            let served = http::serve(service, addr).await;
            scheduler.abort();
            served?;
        }
        Command::Backup => {
            println!("🚀 Starting Backup Process...");
            service.init_log_store().await;
            let outcome = service.perform_backup().await;
            if !outcome.success {
                bail!(outcome.message);
            }
            info!("{}", outcome.message);
        }
        Command::Restore { filename } => {
            println!("🔄 Restoring {} into the test database...", filename);
            let outcome = service.perform_restore(&filename).await;
            if !outcome.success {
                bail!(outcome.message);
            }
            info!("{}", outcome.message);
        }
        Command::List => {
            let backups = service.list_backups().await?;
            if backups.is_empty() {
                println!("No backups found.");
            }
            for object in backups {
                println!(
                    "{}  {:>10}  {}",
                    object.last_modified.format("%Y-%m-%d %H:%M:%S"),
                    format_megabytes(object.size),
                    object.filename
                );
            }
        }
        Command::Logs { limit } => {
            let records = service.list_recent_logs(limit.max(1)).await?;
            if records.is_empty() {
                println!("No backup log entries yet.");
            }
            for record in records {
                println!(
                    "{}  {:<7}  {:>10}  {}  {}",
                    record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    record.status,
                    record.size_display(),
                    record.filename,
                    record.message
                );
            }
        }
        Command::InitDb => {
            if !service.init_log_store().await {
                error!("Backup log table could not be created");
                bail!("Backup log initialization failed");
            }
        }
    }
    Ok(())
}
