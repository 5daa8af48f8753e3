//! Daily backup scheduling.
//!
//! Computes the next local wall-clock firing time and drives a tokio task that
//! sleeps until then. Runs are not serialized against manually triggered
//! backups here; the service facade owns that.

use std::sync::Arc;

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::service::Sentinel;

/// A fixed time of day at which the backup runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    hour: u32,
    minute: u32,
}

impl DailySchedule {
    /// Out-of-range values are clamped; `Settings::schedule` rejects them earlier.
    pub fn new(hour: u32, minute: u32) -> Self {
        Self {
            hour: hour.min(23),
            minute: minute.min(59),
        }
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    /// The first firing time strictly after `now`.
    pub fn next_run_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let tz = now.timezone();
        let at = NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or_default();
        let mut day = now.date_naive();

        // A day's slot can be missing (DST gap) or already passed; try the
        // following days until one lands after `now`.
        for _ in 0..3 {
            if let Some(candidate) = tz.from_local_datetime(&day.and_time(at)).earliest() {
                if candidate > *now {
                    return candidate;
                }
            }
            day = match day.checked_add_days(Days::new(1)) {
                Some(next) => next,
                None => break,
            };
        }

        now.clone() + chrono::Duration::days(1)
    }
}

/// Spawns the background task that runs a backup every day at `schedule`.
pub fn spawn_daily_backup(service: Arc<Sentinel>, schedule: DailySchedule) -> JoinHandle<()> {
    info!(
        "Scheduler started. Backup set for {:02}:{:02} daily.",
        schedule.hour(),
        schedule.minute()
    );

    tokio::spawn(async move {
        loop {
            let now = Local::now();
            let next = schedule.next_run_after(&now);
            let wait = (next.clone() - now).to_std().unwrap_or_default();
            info!("Next scheduled backup at {}", next.format("%Y-%m-%d %H:%M:%S"));
            tokio::time::sleep(wait).await;

            info!("Running scheduled backup...");
            let outcome = service.perform_backup().await;
            if outcome.success {
                info!("Scheduled backup finished: {}", outcome.message);
            } else {
                error!("Scheduled backup failed: {}", outcome.message);
            }
        }
    })
}
