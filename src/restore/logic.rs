// pgsentinel/src/restore/logic.rs
use std::fmt;
use std::path::Path;
use tempfile::{Builder as TempFileBuilder, NamedTempFile};
use tracing::{error, info, warn};

use crate::config::{RestoreConfig, Settings};
use crate::errors::{AppError, Result};
use crate::pgtools::DatabaseTools;
use crate::storage::ObjectStoreProvider;
use crate::utils::redact_url;

/// How far a restore got before it finished or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStage {
    Validating,
    Downloading,
    Resetting,
    Replaying,
    Done,
}

impl fmt::Display for RestoreStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RestoreStage::Validating => "validating",
            RestoreStage::Downloading => "downloading",
            RestoreStage::Resetting => "resetting",
            RestoreStage::Replaying => "replaying",
            RestoreStage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub stage: RestoreStage,
    pub success: bool,
    pub message: String,
}

impl RestoreReport {
    fn failed(stage: RestoreStage, err: AppError) -> Self {
        error!("❌ Restore failed while {}: {}", stage, err);
        Self {
            stage,
            success: false,
            message: err.to_string(),
        }
    }
}

/// Restores the snapshot `filename` from the bucket into the test database.
///
/// The production guard runs before anything touches the network or disk.
/// Once a local file exists it is removed on every exit path.
pub async fn perform_restore(
    settings: &Settings,
    filename: &str,
    tools: &dyn DatabaseTools,
    stores: &dyn ObjectStoreProvider,
) -> RestoreReport {
    let config = match validate_restore(settings, filename) {
        Ok(config) => config,
        Err(e) => return RestoreReport::failed(RestoreStage::Validating, e),
    };
    let filename = filename.trim();

    info!(
        "🔄 Restoring {} into {}",
        filename,
        redact_url(&config.test_db_url)
    );

    let local = match create_local_file(&settings.work_dir(), filename).await {
        Ok(file) => file,
        Err(e) => return RestoreReport::failed(RestoreStage::Downloading, e),
    };

    let result = restore_from(&config, filename, local.path(), tools, stores).await;
    discard(local);

    match result {
        Ok(()) => {
            let message = format!("Restored {} into the test database", filename);
            info!("✅ {}", message);
            RestoreReport {
                stage: RestoreStage::Done,
                success: true,
                message,
            }
        }
        Err((stage, e)) => RestoreReport::failed(stage, e),
    }
}

/// Resolves settings and enforces that the target is not production.
fn validate_restore(settings: &Settings, filename: &str) -> Result<RestoreConfig> {
    let config = settings.restore()?;

    if config.test_db_url == config.production_db_url {
        return Err(AppError::Safety);
    }

    if filename.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "a backup filename is required".to_string(),
        ));
    }

    Ok(config)
}

async fn create_local_file(work_dir: &Path, filename: &str) -> Result<NamedTempFile> {
    let local_name = Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| AppError::InvalidInput(format!("'{}' is not a file name", filename)))?;

    tokio::fs::create_dir_all(work_dir).await?;
    let file = TempFileBuilder::new()
        .prefix("restore_")
        .suffix(&format!("_{}", local_name))
        .tempfile_in(work_dir)?;
    Ok(file)
}

async fn restore_from(
    config: &RestoreConfig,
    key: &str,
    local_path: &Path,
    tools: &dyn DatabaseTools,
    stores: &dyn ObjectStoreProvider,
) -> std::result::Result<(), (RestoreStage, AppError)> {
    let store = stores.connect(&config.storage).await;
    store
        .download(&config.storage.bucket_name, key, local_path)
        .await
        .map_err(|e| (RestoreStage::Downloading, e))?;

    tools
        .reset_schema(&config.test_db_url)
        .await
        .map_err(|e| (RestoreStage::Resetting, e))?;

    tools
        .replay(&config.test_db_url, local_path)
        .await
        .map_err(|e| (RestoreStage::Replaying, e))?;

    Ok(())
}

fn discard(file: NamedTempFile) {
    let path = file.path().to_path_buf();
    if let Err(e) = file.close() {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove downloaded file {}: {}", path.display(), e);
        }
    }
}
