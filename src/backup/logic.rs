// pgsentinel/src/backup/logic.rs
use chrono::Utc;
use std::path::Path;
use tracing::{error, info, warn};

use super::db_dump::{dump_snapshot, snapshot_filename};
use crate::config::Settings;
use crate::errors::Result;
use crate::logstore::{BackupLogProvider, NewBackupRecord, record_best_effort};
use crate::pgtools::DatabaseTools;
use crate::storage::ObjectStoreProvider;
use crate::utils::{format_megabytes, redact_url, remove_if_exists};

/// Terminal state of one backup attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupState {
    /// The source database is not configured; nothing ran and nothing was logged.
    ConfigRejected,
    DumpFailed,
    UploadFailed,
    Succeeded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    pub state: BackupState,
    pub filename: Option<String>,
    pub size_bytes: u64,
    pub message: String,
}

impl BackupReport {
    pub fn succeeded(&self) -> bool {
        self.state == BackupState::Succeeded
    }
}

/// Dump, upload, log.
///
/// Every attempt past configuration ends in exactly one log record. A dump
/// failure removes the partial file; an upload failure leaves the dump in the
/// work directory for inspection; success removes it.
pub async fn perform_backup(
    settings: &Settings,
    tools: &dyn DatabaseTools,
    stores: &dyn ObjectStoreProvider,
    logs: &dyn BackupLogProvider,
) -> BackupReport {
    let database_url = match settings.database_url() {
        Ok(url) => url,
        Err(e) => {
            error!("❌ Backup not started: {}", e);
            return BackupReport {
                state: BackupState::ConfigRejected,
                filename: None,
                size_bytes: 0,
                message: e.to_string(),
            };
        }
    };

    let filename = snapshot_filename(Utc::now());
    let work_dir = settings.work_dir();
    let log = logs.open(&database_url);
    info!("🚀 Backing up {} as {}", redact_url(&database_url), filename);

    let dump_path = match dump_snapshot(tools, &database_url, &work_dir, &filename).await {
        Ok(path) => path,
        Err(e) => {
            let message = e.to_string();
            error!("❌ {}", message);
            record_best_effort(log.as_ref(), NewBackupRecord::failed(&filename, &message)).await;
            remove_if_exists(&work_dir.join(&filename)).await;
            return BackupReport {
                state: BackupState::DumpFailed,
                filename: Some(filename),
                size_bytes: 0,
                message,
            };
        }
    };

    if let Err(e) = upload_snapshot(settings, stores, &dump_path, &filename).await {
        let message = e.to_string();
        error!("❌ {}", message);
        warn!("Leaving {} in place for inspection", dump_path.display());
        record_best_effort(log.as_ref(), NewBackupRecord::failed(&filename, &message)).await;
        return BackupReport {
            state: BackupState::UploadFailed,
            filename: Some(filename),
            size_bytes: 0,
            message,
        };
    }

    let size_bytes = match tokio::fs::metadata(&dump_path).await {
        Ok(meta) => meta.len(),
        Err(e) => {
            warn!("Could not measure {}: {}", dump_path.display(), e);
            0
        }
    };
    let size = format_megabytes(size_bytes);

    record_best_effort(
        log.as_ref(),
        NewBackupRecord::success(
            &filename,
            size_bytes,
            format!("Backup uploaded successfully ({})", size),
        ),
    )
    .await;
    remove_if_exists(&dump_path).await;

    let message = format!("Backup successful ({})", size);
    info!("🎉 {}", message);
    BackupReport {
        state: BackupState::Succeeded,
        filename: Some(filename),
        size_bytes,
        message,
    }
}

/// Storage settings are only required once there is something to upload.
async fn upload_snapshot(
    settings: &Settings,
    stores: &dyn ObjectStoreProvider,
    dump_path: &Path,
    filename: &str,
) -> Result<()> {
    let storage = settings.storage()?;
    let store = stores.connect(&storage).await;
    store.upload(dump_path, &storage.bucket_name, filename).await
}
