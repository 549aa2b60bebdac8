//! Background job that persists a snapshot on a fixed interval.

use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::{fetcher::CachedFetcher, storage::SnapshotWriter};

// ---

/// Owns only handles to the fetcher and the writer. A failed run is logged
/// and the schedule carries on.
pub struct PeriodicPersister {
    fetcher: Arc<CachedFetcher>,
    writer: Arc<SnapshotWriter>,
    box_id: String,
    interval: Duration,
}

impl PeriodicPersister {
    pub fn new(
        fetcher: Arc<CachedFetcher>,
        writer: Arc<SnapshotWriter>,
        box_id: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            fetcher,
            writer,
            box_id: box_id.into(),
            interval,
        }
    }

    /// Spawn the loop. The first run is one full interval after start; abort
    /// the returned handle to stop it. An interval too long to schedule ends
    /// the task without a run.
    pub fn spawn(self) -> JoinHandle<()> {
        // ---
        tokio::spawn(async move {
            let Some(start) = Instant::now().checked_add(self.interval) else {
                error!(
                    "Periodic persistence disabled: interval of {}s cannot be scheduled",
                    self.interval.as_secs()
                );
                return;
            };
            let mut ticker = tokio::time::interval_at(start, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                "Periodic persistence every {}s for box {}",
                self.interval.as_secs(),
                self.box_id
            );

            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }

    /// One persistence run. Returns the object name when something was stored.
    pub async fn run_once(&self) -> Option<String> {
        // ---
        debug!("Periodic persistence run starting");

        let snapshot = match self.fetcher.get_snapshot(&self.box_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Periodic persistence skipped, no snapshot: {}", e);
                return None;
            }
        };

        match self.writer.persist(&snapshot).await {
            Ok(name) => Some(name),
            Err(e) => {
                error!("Error in periodic data storage: {}", e);
                None
            }
        }
    }
}
