use std::path::{Path, PathBuf};

use tracing::warn;
use url::Url;
use which::which;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Finds an executable in the system PATH.
pub fn find_executable(name: &str) -> std::result::Result<PathBuf, String> {
    which(name).map_err(|_| {
        format!(
            "{} executable not found in PATH. Please ensure PostgreSQL client tools are installed and in your PATH.",
            name
        )
    })
}

/// Renders a byte count as megabytes rounded to two decimals, e.g. "2.0 MB".
pub fn format_megabytes(bytes: u64) -> String {
    let mb = (bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0;
    let fixed = format!("{:.2}", mb);
    let trimmed = fixed.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{}0 MB", trimmed)
    } else {
        format!("{} MB", trimmed)
    }
}

/// Masks the password of a connection URL so it can be logged.
pub fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("****"));
            }
            parsed.to_string()
        }
        Err(_) => "<unparseable connection string>".to_string(),
    }
}

/// Deletes a transient file, logging instead of failing.
pub async fn remove_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove temporary file {}: {}", path.display(), e),
    }
}
