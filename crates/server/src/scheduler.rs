use std::time::Duration;

use chrono::NaiveDate;
use server_api::{jobs, today, ApiContext};
use tokio::task::JoinHandle;
use tracing::info;

const TICK: Duration = Duration::from_secs(15 * 60);

/// Remembers which calendar date the daily batch last ran for.
#[derive(Debug, Default)]
pub(crate) struct DailyGate {
    last_run: Option<NaiveDate>,
}

impl DailyGate {
    /// True once per date; the first call for a new date claims it.
    pub(crate) fn claim(&mut self, date: NaiveDate) -> bool {
        if self.last_run == Some(date) {
            return false;
        }
        self.last_run = Some(date);
        true
    }
}

/// Runs the daily batch on the first tick of each local date.
pub(crate) fn spawn(api: ApiContext) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut gate = DailyGate::default();
        loop {
            interval.tick().await;
            let date = today();
            if gate.claim(date) {
                info!(%date, "running daily jobs");
                jobs::run_daily(&api, date).await;
            }
        }
    })
}
