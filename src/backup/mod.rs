pub(crate) mod db_dump;
mod logic;

pub use logic::{BackupReport, BackupState, perform_backup};
