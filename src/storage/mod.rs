// pgsentinel/src/storage/mod.rs
pub(crate) mod s3;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::errors::Result;

pub use s3::S3Provider;

/// An entry in the bucket, derived live from a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupObject {
    pub filename: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Upload, download and list against an S3-compatible bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()>;

    /// Fails with `AppError::Download` when the key does not exist.
    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()>;

    /// All objects in the bucket, in no particular order. An empty bucket is
    /// an empty vector.
    async fn list(&self, bucket: &str) -> Result<Vec<BackupObject>>;
}

/// Builds a store client for a resolved storage configuration.
#[async_trait]
pub trait ObjectStoreProvider: Send + Sync {
    async fn connect(&self, config: &StorageConfig) -> Arc<dyn ObjectStore>;
}

/// Lists the bucket with the most recently modified object first.
pub async fn list_backups(store: &dyn ObjectStore, bucket: &str) -> Result<Vec<BackupObject>> {
    let mut objects = store.list(bucket).await?;
    sort_most_recent_first(&mut objects);
    Ok(objects)
}

pub fn sort_most_recent_first(objects: &mut [BackupObject]) {
    objects.sort_by(|a, b| {
        b.last_modified
            .cmp(&a.last_modified)
            .then_with(|| b.filename.cmp(&a.filename))
    });
}
