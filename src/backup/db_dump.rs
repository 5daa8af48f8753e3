// pgsentinel/src/backup/db_dump.rs
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::{AppError, Result};
use crate::pgtools::DatabaseTools;

/// Object key and local file name for a snapshot taken at `at`, e.g.
/// `backup_20240101_030000.sql`.
pub fn snapshot_filename(at: DateTime<Utc>) -> String {
    format!("backup_{}.sql", at.format("%Y%m%d_%H%M%S"))
}

/// Dumps the source database to `work_dir/filename`.
///
/// The name is chosen by the caller before the dump starts so that a failed
/// attempt can still be logged under it. A partial file left behind by a
/// failing dump is not removed here.
pub async fn dump_snapshot(
    tools: &dyn DatabaseTools,
    source_db_url: &str,
    work_dir: &Path,
    filename: &str,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(work_dir).await.map_err(|e| {
        AppError::Dump(format!(
            "could not create work directory {}: {}",
            work_dir.display(),
            e
        ))
    })?;

    let dump_path = work_dir.join(filename);
    info!("Starting backup: {}", filename);
    tools.dump(source_db_url, &dump_path).await?;
    Ok(dump_path)
}
