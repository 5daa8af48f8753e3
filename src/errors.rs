use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing required configuration: {}", .missing.join(", "))]
    Configuration { missing: Vec<String> },

    #[error("Invalid value for {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Dump failed: {0}")]
    Dump(String),

    #[error("Replay failed: {0}")]
    Replay(String),

    #[error("Schema reset failed: {0}")]
    Reset(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Refusing to restore: the test database URL is identical to the production database URL")]
    Safety,

    #[error("Listing backups failed: {0}")]
    List(String),

    #[error("Backup log error: {0}")]
    LogStore(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
