// pgsentinel/src/storage/s3.rs
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use chrono::{DateTime, Utc};
use s3::config::Region;
use s3::error::DisplayErrorContext;
use s3::primitives::ByteStream;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{BackupObject, ObjectStore, ObjectStoreProvider};
use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use crate::utils::remove_if_exists;

/// Connects to any S3-compatible service (R2, Spaces, MinIO, AWS).
#[derive(Debug, Default, Clone)]
pub struct S3Provider;

#[async_trait]
impl ObjectStoreProvider for S3Provider {
    async fn connect(&self, config: &StorageConfig) -> Arc<dyn ObjectStore> {
        Arc::new(S3Store::connect(config).await)
    }
}

pub struct S3Store {
    client: s3::Client,
}

impl S3Store {
    pub async fn connect(config: &StorageConfig) -> Self {
        let sdk_config = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region.clone()))
            .credentials_provider(s3::config::Credentials::new(
                &config.access_key_id,
                &config.secret_access_key,
                None, // session_token
                None, // expiry
                "Static",
            ))
            .load()
            .await;

        // Path-style addressing works across S3-compatible providers.
        let s3_config = s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(s3_config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()> {
        info!(
            "Uploading {} to s3://{}/{}",
            local_path.display(),
            bucket,
            key
        );

        let body = ByteStream::from_path(local_path).await.map_err(|e| {
            AppError::Upload(format!(
                "could not read {}: {}",
                local_path.display(),
                e
            ))
        })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Upload(DisplayErrorContext(&e).to_string()))?;

        info!("✅ Uploaded s3://{}/{}", bucket, key);
        Ok(())
    }

    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
        info!(
            "Downloading s3://{}/{} to {}",
            bucket,
            key,
            local_path.display()
        );

        let mut object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let not_found = e
                    .as_service_error()
                    .map(|service| service.is_no_such_key())
                    .unwrap_or(false);
                if not_found {
                    AppError::Download(format!("object {} not found in bucket {}", key, bucket))
                } else {
                    AppError::Download(DisplayErrorContext(&e).to_string())
                }
            })?;

        let written = async {
            let mut output_file = File::create(local_path).await?;
            let mut total_bytes = 0usize;
            while let Some(chunk) = object
                .body
                .try_next()
                .await
                .map_err(|e| std::io::Error::other(e.to_string()))?
            {
                output_file.write_all(&chunk).await?;
                total_bytes += chunk.len();
            }
            output_file.flush().await?;
            Ok::<usize, std::io::Error>(total_bytes)
        }
        .await;

        match written {
            Ok(total_bytes) => {
                info!(
                    "✅ Downloaded {} bytes from s3://{}/{}",
                    total_bytes, bucket, key
                );
                Ok(())
            }
            Err(e) => {
                remove_if_exists(local_path).await;
                Err(AppError::Download(format!(
                    "failed writing {}: {}",
                    local_path.display(),
                    e
                )))
            }
        }
    }

    async fn list(&self, bucket: &str) -> Result<Vec<BackupObject>> {
        debug!("Listing s3://{}", bucket);

        let mut objects = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| AppError::List(DisplayErrorContext(&e).to_string()))?;
            for entry in page.contents() {
                let Some(key) = entry.key() else {
                    continue;
                };
                let last_modified = entry
                    .last_modified()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
                    .unwrap_or_default();
                objects.push(BackupObject {
                    filename: key.to_string(),
                    size: entry.size().unwrap_or(0).max(0) as u64,
                    last_modified,
                });
            }
        }

        debug!("Found {} objects in s3://{}", objects.len(), bucket);
        Ok(objects)
    }
}
