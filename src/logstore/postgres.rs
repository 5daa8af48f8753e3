// pgsentinel/src/logstore/postgres.rs
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{Connection, PgConnection, Row};
use std::sync::Arc;
use tracing::{debug, info};

use super::{BackupLog, BackupLogProvider, BackupRecord, BackupStatus, LOG_TABLE, NewBackupRecord};
use crate::errors::Result;

#[derive(Debug, Default, Clone)]
pub struct PgLogProvider;

impl BackupLogProvider for PgLogProvider {
    fn open(&self, database_url: &str) -> Arc<dyn BackupLog> {
        Arc::new(PgBackupLog::new(database_url))
    }
}

/// Log table in a Postgres database. Opens a fresh connection per call.
pub struct PgBackupLog {
    database_url: String,
}

impl PgBackupLog {
    pub fn new(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
        }
    }

    async fn connect(&self) -> Result<PgConnection> {
        Ok(PgConnection::connect(&self.database_url).await?)
    }
}

#[async_trait]
impl BackupLog for PgBackupLog {
    async fn ensure_schema(&self) -> Result<()> {
        let mut conn = self.connect().await?;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id SERIAL PRIMARY KEY,
                timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                status VARCHAR(50),
                filename VARCHAR(255),
                size_bytes BIGINT,
                message TEXT
            )
            "#,
            LOG_TABLE
        ))
        .execute(&mut conn)
        .await?;
        conn.close().await?;

        info!("Initialized backup log table {}.", LOG_TABLE);
        Ok(())
    }

    async fn record(&self, entry: &NewBackupRecord) -> Result<()> {
        let mut conn = self.connect().await?;
        sqlx::query(&format!(
            "INSERT INTO {} (status, filename, size_bytes, message) VALUES ($1, $2, $3, $4)",
            LOG_TABLE
        ))
        .bind(entry.status.as_str())
        .bind(&entry.filename)
        .bind(i64::try_from(entry.size_bytes).unwrap_or(i64::MAX))
        .bind(&entry.message)
        .execute(&mut conn)
        .await?;
        conn.close().await?;

        debug!("Logged {} for {}", entry.status, entry.filename);
        Ok(())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<BackupRecord>> {
        let mut conn = self.connect().await?;
        let rows = sqlx::query(&format!(
            "SELECT id, timestamp, status, filename, size_bytes, message FROM {} ORDER BY timestamp DESC LIMIT $1",
            LOG_TABLE
        ))
        .bind(limit.max(0))
        .fetch_all(&mut conn)
        .await?;
        conn.close().await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let status: Option<String> = row.try_get("status")?;
            let status = status
                .unwrap_or_default()
                .parse::<BackupStatus>()
                .map_err(|e| sqlx::Error::Decode(e.into()))?;
            let timestamp: Option<NaiveDateTime> = row.try_get("timestamp")?;
            let size_bytes: Option<i64> = row.try_get("size_bytes")?;
            let filename: Option<String> = row.try_get("filename")?;
            let message: Option<String> = row.try_get("message")?;

            records.push(BackupRecord {
                id: row.try_get("id")?,
                timestamp: timestamp.unwrap_or_default(),
                status,
                filename: filename.unwrap_or_default(),
                size_bytes: size_bytes.unwrap_or(0).max(0) as u64,
                message: message.unwrap_or_default(),
            });
        }
        Ok(records)
    }
}
