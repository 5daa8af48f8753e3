// pgsentinel/src/logstore/mod.rs
//! Append-only audit trail of backup attempts.

pub(crate) mod postgres;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::error;

use crate::errors::Result;
use crate::utils::format_megabytes;

pub use postgres::PgLogProvider;

pub const LOG_TABLE: &str = "_admin_backup_logs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BackupStatus {
    Success,
    Failed,
}

impl BackupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupStatus::Success => "SUCCESS",
            BackupStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(BackupStatus::Success),
            "FAILED" => Ok(BackupStatus::Failed),
            other => Err(format!("unknown backup status '{}'", other)),
        }
    }
}

/// A row about to be written; id and timestamp are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBackupRecord {
    pub status: BackupStatus,
    pub filename: String,
    pub size_bytes: u64,
    pub message: String,
}

impl NewBackupRecord {
    pub fn success(filename: &str, size_bytes: u64, message: impl Into<String>) -> Self {
        Self {
            status: BackupStatus::Success,
            filename: filename.to_string(),
            size_bytes,
            message: message.into(),
        }
    }

    pub fn failed(filename: &str, message: impl Into<String>) -> Self {
        Self {
            status: BackupStatus::Failed,
            filename: filename.to_string(),
            size_bytes: 0,
            message: message.into(),
        }
    }
}

/// A persisted backup attempt. Never updated after insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupRecord {
    pub id: i32,
    pub timestamp: NaiveDateTime,
    pub status: BackupStatus,
    pub filename: String,
    pub size_bytes: u64,
    pub message: String,
}

impl BackupRecord {
    pub fn size_display(&self) -> String {
        format_megabytes(self.size_bytes)
    }
}

#[async_trait]
pub trait BackupLog: Send + Sync {
    /// Creates the log table if it does not exist yet.
    async fn ensure_schema(&self) -> Result<()>;

    async fn record(&self, entry: &NewBackupRecord) -> Result<()>;

    /// Up to `limit` records, newest first.
    async fn list_recent(&self, limit: i64) -> Result<Vec<BackupRecord>>;
}

/// Opens the log store that lives in the database at `database_url`.
pub trait BackupLogProvider: Send + Sync {
    fn open(&self, database_url: &str) -> Arc<dyn BackupLog>;
}

/// Writes `entry`, logging and discarding any failure. A lost audit row must
/// never change the outcome of the backup that produced it.
pub async fn record_best_effort(log: &dyn BackupLog, entry: NewBackupRecord) {
    if let Err(e) = log.record(&entry).await {
        error!(
            "Failed to log {} backup of {} to {}: {}",
            entry.status, entry.filename, LOG_TABLE, e
        );
    }
}
