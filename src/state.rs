//! Explicitly constructed service objects shared by every handler and the
//! periodic job. Built once at startup, dropped at shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    cache::CacheStore, fetcher::CachedFetcher, health::HealthAggregator, metrics::Metrics,
    scheduler::PeriodicPersister, storage::ObjectStore, storage::SnapshotWriter,
    upstream::SenseBoxClient, Config,
};

// ---

#[derive(Clone)]
pub struct AppState {
    // ---
    pub config: Arc<Config>,
    pub metrics: Metrics,
    pub fetcher: Arc<CachedFetcher>,
    pub health: Arc<HealthAggregator>,
    pub writer: Arc<SnapshotWriter>,
}

impl AppState {
    /// Wire the components around an already connected cache and object
    /// store.
    pub fn new(config: Config, cache: CacheStore, store: ObjectStore) -> Result<Self> {
        // ---
        let metrics = Metrics::new().context("Failed to register metrics")?;

        let upstream = SenseBoxClient::new(&config.sensebox_api_url, config.upstream_timeout)
            .context("Failed to build upstream HTTP client")?;

        let fetcher = Arc::new(CachedFetcher::new(
            upstream,
            cache,
            metrics.clone(),
            config.sensor_title.clone(),
            config.cache_ttl,
        ));

        let health = Arc::new(HealthAggregator::new(
            fetcher.clone(),
            metrics.clone(),
            config.sensebox_id.clone(),
            config.reachability_cooldown,
        ));

        let writer = Arc::new(SnapshotWriter::new(store, metrics.clone()));

        Ok(AppState {
            config: Arc::new(config),
            metrics,
            fetcher,
            health,
            writer,
        })
    }

    /// The background persistence job over this state's fetcher and writer.
    pub fn periodic_persister(&self) -> PeriodicPersister {
        // ---
        PeriodicPersister::new(
            self.fetcher.clone(),
            self.writer.clone(),
            self.config.sensebox_id.clone(),
            self.config.store_interval,
        )
    }
}
