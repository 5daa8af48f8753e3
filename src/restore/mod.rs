mod logic;

pub use logic::{RestoreReport, RestoreStage, perform_restore};
