// pgsentinel/src/pgtools/mod.rs
//! Thin adapter over the PostgreSQL client tools.
//!
//! Every argument is passed to the child process as its own argv entry; no
//! shell is involved, so connection strings are never interpolated into a
//! command line string.

use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{AppError, Result};
use crate::utils::{find_executable, redact_url};

/// Statement used to discard everything in the restore target.
pub const RESET_SCHEMA_SQL: &str = "DROP SCHEMA IF EXISTS public CASCADE; CREATE SCHEMA public;";

/// The external operations the orchestrators need from a database.
#[async_trait]
pub trait DatabaseTools: Send + Sync {
    /// Writes a plain SQL snapshot of the database at `conn` to `dest`.
    async fn dump(&self, conn: &str, dest: &Path) -> Result<()>;

    /// Executes the statements in `src` against the database at `conn`.
    async fn replay(&self, conn: &str, src: &Path) -> Result<()>;

    /// Drops and recreates the default schema of the database at `conn`.
    async fn reset_schema(&self, conn: &str) -> Result<()>;
}

/// `pg_dump` / `psql` found on PATH at call time.
#[derive(Debug, Default, Clone)]
pub struct PgClientTools;

impl PgClientTools {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatabaseTools for PgClientTools {
    async fn dump(&self, conn: &str, dest: &Path) -> Result<()> {
        let pg_dump = find_executable("pg_dump").map_err(AppError::Dump)?;
        info!("Dumping {} to {}", redact_url(conn), dest.display());

        let output = Command::new(pg_dump)
            .arg("--no-owner")
            .arg("--no-privileges")
            .arg("--file")
            .arg(dest)
            .arg("--dbname")
            .arg(conn)
            .output()
            .await
            .map_err(|e| AppError::Dump(format!("failed to run pg_dump: {}", e)))?;

        if !output.status.success() {
            return Err(AppError::Dump(diagnostic(&output)));
        }
        debug!("pg_dump finished for {}", dest.display());
        Ok(())
    }

    async fn replay(&self, conn: &str, src: &Path) -> Result<()> {
        let psql = find_executable("psql").map_err(AppError::Replay)?;
        info!("Replaying {} into {}", src.display(), redact_url(conn));

        let output = Command::new(psql)
            .arg("-X") // Do not read psqlrc
            .arg("-q")
            .arg("-v")
            .arg("ON_ERROR_STOP=1")
            .arg("--dbname")
            .arg(conn)
            .arg("--file")
            .arg(src)
            .output()
            .await
            .map_err(|e| AppError::Replay(format!("failed to run psql: {}", e)))?;

        if !output.status.success() {
            return Err(AppError::Replay(diagnostic(&output)));
        }
        Ok(())
    }

    async fn reset_schema(&self, conn: &str) -> Result<()> {
        let psql = find_executable("psql").map_err(AppError::Reset)?;
        info!("Resetting public schema of {}", redact_url(conn));

        let output = Command::new(psql)
            .arg("-X")
            .arg("-q")
            .arg("-v")
            .arg("ON_ERROR_STOP=1")
            .arg("--dbname")
            .arg(conn)
            .arg("--command")
            .arg(RESET_SCHEMA_SQL)
            .output()
            .await
            .map_err(|e| AppError::Reset(format!("failed to run psql: {}", e)))?;

        if !output.status.success() {
            return Err(AppError::Reset(diagnostic(&output)));
        }
        Ok(())
    }
}

/// Best available explanation for a failed tool run: stderr, then stdout,
/// then the bare exit status.
fn diagnostic(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        return stderr.trim().to_string();
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        return stdout.trim().to_string();
    }
    format!("process exited with {}", output.status)
}
