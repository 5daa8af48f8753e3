// pgsentinel/src/service.rs
//! Presentation-facing operations. Each call takes a fresh settings snapshot.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::backup::{self, BackupReport};
use crate::config::{EnvSettings, SettingsSource};
use crate::errors::Result;
use crate::logstore::{BackupLogProvider, BackupRecord, PgLogProvider};
use crate::pgtools::{DatabaseTools, PgClientTools};
use crate::restore::{self, RestoreReport};
use crate::storage::{self, BackupObject, ObjectStoreProvider, S3Provider};

/// What the UI or CLI gets back from a backup or restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    pub success: bool,
    pub message: String,
}

impl From<BackupReport> for OperationOutcome {
    fn from(report: BackupReport) -> Self {
        Self {
            success: report.succeeded(),
            message: report.message,
        }
    }
}

impl From<RestoreReport> for OperationOutcome {
    fn from(report: RestoreReport) -> Self {
        Self {
            success: report.success,
            message: report.message,
        }
    }
}

pub struct Sentinel {
    settings: Arc<dyn SettingsSource>,
    tools: Arc<dyn DatabaseTools>,
    stores: Arc<dyn ObjectStoreProvider>,
    logs: Arc<dyn BackupLogProvider>,
    // One run of each kind at a time within this process.
    backup_lock: Mutex<()>,
    restore_lock: Mutex<()>,
}

impl Sentinel {
    pub fn new(
        settings: Arc<dyn SettingsSource>,
        tools: Arc<dyn DatabaseTools>,
        stores: Arc<dyn ObjectStoreProvider>,
        logs: Arc<dyn BackupLogProvider>,
    ) -> Self {
        Self {
            settings,
            tools,
            stores,
            logs,
            backup_lock: Mutex::new(()),
            restore_lock: Mutex::new(()),
        }
    }

    /// Environment settings, `pg_dump`/`psql`, S3 and the Postgres log table.
    pub fn from_environment() -> Self {
        Self::new(
            Arc::new(EnvSettings),
            Arc::new(PgClientTools::new()),
            Arc::new(S3Provider),
            Arc::new(PgLogProvider),
        )
    }

    pub fn settings(&self) -> &dyn SettingsSource {
        self.settings.as_ref()
    }

    /// Creates the log table. Failures are logged and otherwise ignored so
    /// the rest of the service keeps working without an audit trail.
    pub async fn init_log_store(&self) -> bool {
        let settings = self.settings.load();
        let database_url = match settings.database_url() {
            Ok(url) => url,
            Err(e) => {
                warn!("Backup log unavailable: {}", e);
                return false;
            }
        };
        match self.logs.open(&database_url).ensure_schema().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Error initializing backup log table: {}", e);
                false
            }
        }
    }

    pub async fn perform_backup(&self) -> OperationOutcome {
        let _guard = self.backup_lock.lock().await;
        let settings = self.settings.load();
        backup::perform_backup(
            &settings,
            self.tools.as_ref(),
            self.stores.as_ref(),
            self.logs.as_ref(),
        )
        .await
        .into()
    }

    pub async fn perform_restore(&self, filename: &str) -> OperationOutcome {
        let _guard = self.restore_lock.lock().await;
        let settings = self.settings.load();
        restore::perform_restore(&settings, filename, self.tools.as_ref(), self.stores.as_ref())
            .await
            .into()
    }

    /// Bucket contents, newest first.
    pub async fn list_backups(&self) -> Result<Vec<BackupObject>> {
        let settings = self.settings.load();
        let config = settings.storage()?;
        let store = self.stores.connect(&config).await;
        let objects = storage::list_backups(store.as_ref(), &config.bucket_name).await?;
        info!("Found {} backups in {}", objects.len(), config.bucket_name);
        Ok(objects)
    }

    /// Up to `limit` log records, newest first.
    pub async fn list_recent_logs(&self, limit: i64) -> Result<Vec<BackupRecord>> {
        let settings = self.settings.load();
        let database_url = settings.database_url()?;
        self.logs.open(&database_url).list_recent(limit).await
    }
}
