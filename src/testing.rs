//! In-memory stand-ins for the database tools, the bucket and the log table.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::config::{
    DATABASE_URL, R2_ACCESS_KEY_ID, R2_BUCKET_NAME, R2_ENDPOINT_URL, R2_SECRET_ACCESS_KEY,
    StorageConfig, Settings, BACKUP_WORK_DIR, TEST_DATABASE_URL,
};
use crate::errors::{AppError, Result};
use crate::logstore::{BackupLog, BackupLogProvider, BackupRecord, NewBackupRecord};
use crate::pgtools::DatabaseTools;
use crate::storage::{BackupObject, ObjectStore, ObjectStoreProvider};

pub fn backup_settings(work_dir: &Path) -> Settings {
    Settings::from_pairs([
        (DATABASE_URL, "postgres://app:pw@prod:5432/app".to_string()),
        (R2_ENDPOINT_URL, "https://r2.example.com".to_string()),
        (R2_ACCESS_KEY_ID, "key".to_string()),
        (R2_SECRET_ACCESS_KEY, "secret".to_string()),
        (R2_BUCKET_NAME, "backups".to_string()),
        (BACKUP_WORK_DIR, work_dir.display().to_string()),
    ])
}

pub fn restore_settings(work_dir: &Path) -> Settings {
    backup_settings(work_dir).with(TEST_DATABASE_URL, "postgres://app:pw@test:5432/app")
}

pub fn object(filename: &str, size: u64, epoch_secs: i64) -> BackupObject {
    BackupObject {
        filename: filename.to_string(),
        size,
        last_modified: DateTime::<Utc>::from_timestamp(epoch_secs, 0).unwrap(),
    }
}

#[derive(Default)]
struct ToolCalls {
    dumps: Vec<String>,
    resets: Vec<String>,
    replayed: Vec<String>,
}

/// Scripted `DatabaseTools`. Dumps write a file of a fixed size.
#[derive(Clone)]
pub struct FakeTools {
    dump_size: usize,
    dump_error: Option<String>,
    partial_output: bool,
    reset_error: Option<String>,
    replay_error: Option<String>,
    calls: Arc<Mutex<ToolCalls>>,
}

impl Default for FakeTools {
    fn default() -> Self {
        Self {
            dump_size: 16,
            dump_error: None,
            partial_output: false,
            reset_error: None,
            replay_error: None,
            calls: Arc::default(),
        }
    }
}

impl FakeTools {
    pub fn dumping(size: usize) -> Self {
        Self {
            dump_size: size,
            ..Self::default()
        }
    }

    pub fn failing_dump(diagnostic: &str) -> Self {
        Self {
            dump_error: Some(diagnostic.to_string()),
            ..Self::default()
        }
    }

    /// A failing dump leaves a half-written file behind.
    pub fn with_partial_output(mut self) -> Self {
        self.partial_output = true;
        self
    }

    pub fn failing_reset(mut self, diagnostic: &str) -> Self {
        self.reset_error = Some(diagnostic.to_string());
        self
    }

    pub fn failing_replay(mut self, diagnostic: &str) -> Self {
        self.replay_error = Some(diagnostic.to_string());
        self
    }

    pub fn dump_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().dumps.clone()
    }

    pub fn reset_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().resets.clone()
    }

    /// Contents of each file handed to `replay`, read at call time.
    pub fn replayed_contents(&self) -> Vec<String> {
        self.calls.lock().unwrap().replayed.clone()
    }
}

#[async_trait]
impl DatabaseTools for FakeTools {
    async fn dump(&self, conn: &str, dest: &Path) -> Result<()> {
        self.calls.lock().unwrap().dumps.push(conn.to_string());
        if let Some(diagnostic) = &self.dump_error {
            if self.partial_output {
                std::fs::write(dest, b"-- partial")?;
            }
            return Err(AppError::Dump(diagnostic.clone()));
        }
        std::fs::write(dest, vec![b'x'; self.dump_size])?;
        Ok(())
    }

    async fn replay(&self, _conn: &str, src: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(src)?;
        self.calls.lock().unwrap().replayed.push(contents);
        match &self.replay_error {
            Some(diagnostic) => Err(AppError::Replay(diagnostic.clone())),
            None => Ok(()),
        }
    }

    async fn reset_schema(&self, conn: &str) -> Result<()> {
        self.calls.lock().unwrap().resets.push(conn.to_string());
        match &self.reset_error {
            Some(diagnostic) => Err(AppError::Reset(diagnostic.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub bucket: String,
    pub key: String,
    pub size: u64,
}

#[derive(Default)]
struct StoreState {
    objects: Vec<BackupObject>,
    contents: HashMap<String, Vec<u8>>,
    uploads: Vec<Upload>,
    downloads: Vec<String>,
    connects: usize,
    upload_error: Option<String>,
    list_error: Option<String>,
}

/// A bucket held in memory; doubles as its own provider.
#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<Mutex<StoreState>>,
}

impl FakeStore {
    pub fn with_objects(objects: Vec<BackupObject>) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().objects = objects;
        store
    }

    pub fn with_content(self, key: &str, body: &[u8]) -> Self {
        self.state
            .lock()
            .unwrap()
            .contents
            .insert(key.to_string(), body.to_vec());
        self
    }

    pub fn failing_upload(self, reason: &str) -> Self {
        self.state.lock().unwrap().upload_error = Some(reason.to_string());
        self
    }

    pub fn failing_list(self, reason: &str) -> Self {
        self.state.lock().unwrap().list_error = Some(reason.to_string());
        self
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.state.lock().unwrap().downloads.clone()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()> {
        if let Some(reason) = self.state.lock().unwrap().upload_error.clone() {
            return Err(AppError::Upload(reason));
        }
        let size = std::fs::metadata(local_path)?.len();
        self.state.lock().unwrap().uploads.push(Upload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size,
        });
        Ok(())
    }

    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
        let body = {
            let mut state = self.state.lock().unwrap();
            state.downloads.push(key.to_string());
            state.contents.get(key).cloned()
        };
        match body {
            Some(body) => {
                std::fs::write(local_path, body)?;
                Ok(())
            }
            None => Err(AppError::Download(format!(
                "object {} not found in bucket {}",
                key, bucket
            ))),
        }
    }

    async fn list(&self, _bucket: &str) -> Result<Vec<BackupObject>> {
        let state = self.state.lock().unwrap();
        match &state.list_error {
            Some(reason) => Err(AppError::List(reason.clone())),
            None => Ok(state.objects.clone()),
        }
    }
}

#[async_trait]
impl ObjectStoreProvider for FakeStore {
    async fn connect(&self, _config: &StorageConfig) -> Arc<dyn ObjectStore> {
        self.state.lock().unwrap().connects += 1;
        Arc::new(self.clone())
    }
}

/// Log table in memory. Timestamps advance one second per insert.
#[derive(Clone, Default)]
pub struct MemoryLog {
    records: Arc<Mutex<Vec<NewBackupRecord>>>,
    failing: bool,
}

impl MemoryLog {
    /// Every call fails, as if the database were unreachable.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<NewBackupRecord> {
        self.records.lock().unwrap().clone()
    }

    fn check(&self) -> Result<()> {
        if self.failing {
            return Err(AppError::LogStore(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl BackupLog for MemoryLog {
    async fn ensure_schema(&self) -> Result<()> {
        self.check()
    }

    async fn record(&self, entry: &NewBackupRecord) -> Result<()> {
        self.check()?;
        self.records.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<BackupRecord>> {
        self.check()?;
        let base = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let mut records: Vec<BackupRecord> = self
            .records()
            .into_iter()
            .enumerate()
            .map(|(i, entry)| BackupRecord {
                id: i as i32 + 1,
                timestamp: base + Duration::seconds(i as i64),
                status: entry.status,
                filename: entry.filename,
                size_bytes: entry.size_bytes,
                message: entry.message,
            })
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }
}

impl BackupLogProvider for MemoryLog {
    fn open(&self, _database_url: &str) -> Arc<dyn BackupLog> {
        Arc::new(self.clone())
    }
}
