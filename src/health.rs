//! Readiness aggregation.
//!
//! Two independent signals: whether the upstream answered recently, and
//! whether the cache still holds an entry younger than the TTL. The service
//! stays ready while either holds.
//!
//! Reaching the upstream costs one forced GET. Its outcome is reused for the
//! configured cooldown, so frequent readiness polling does not turn into the
//! same rate of calls against openSenseMap.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{fetcher::CachedFetcher, metrics::Metrics, models::HealthStatus};

// ---

/// Number of boxes this service watches.
pub const TOTAL_BOXES: u32 = 1;

pub struct HealthAggregator {
    // ---
    fetcher: Arc<CachedFetcher>,
    metrics: Metrics,
    box_id: String,
    cooldown: Duration,
    last_check: Mutex<Option<(Instant, bool)>>,
}

impl HealthAggregator {
    /// `cooldown` is how long an upstream result is reused; zero disables
    /// reuse.
    pub fn new(
        fetcher: Arc<CachedFetcher>,
        metrics: Metrics,
        box_id: impl Into<String>,
        cooldown: Duration,
    ) -> Self {
        Self {
            fetcher,
            metrics,
            box_id: box_id.into(),
            cooldown,
            last_check: Mutex::new(None),
        }
    }

    /// Check upstream (or reuse a recent result), inspect the cache, and
    /// combine the two.
    pub async fn check_health(&self) -> HealthStatus {
        // ---
        let reachable = self.upstream_reachable().await;

        let accessible = u32::from(reachable);
        self.metrics
            .sensebox_availability
            .set(f64::from(accessible) / f64::from(TOTAL_BOXES) * 100.0);

        let cache_fresh = match self.fetcher.cached_age(&self.box_id).await {
            Some(age) => age <= self.fetcher.ttl(),
            None => false,
        };

        let status = HealthStatus::from_signals(reachable, cache_fresh);
        debug!(
            reachable = status.reachable,
            cache_fresh = status.cache_fresh,
            "Readiness evaluated: {:?}",
            status.overall
        );
        status
    }

    /// Last result if it is younger than the cooldown, otherwise a fresh
    /// check.
    async fn upstream_reachable(&self) -> bool {
        // ---
        let last = *self.last_check.lock();
        if let Some((checked_at, reachable)) = last {
            if checked_at.elapsed() < self.cooldown {
                debug!(reachable, "Reusing upstream check from {:?} ago", checked_at.elapsed());
                return reachable;
            }
        }

        let reachable = self.check_upstream().await;
        *self.last_check.lock() = Some((Instant::now(), reachable));
        reachable
    }

    /// Forced fetch, so a warm cache does not mask an unreachable upstream; a
    /// success also refreshes the cache. Only `Unreachable` counts against
    /// reachability: a box that answers without a usable temperature sensor
    /// is still reachable.
    async fn check_upstream(&self) -> bool {
        // ---
        match self.fetcher.refresh(&self.box_id).await {
            Ok(_) => true,
            Err(e) if e.is_unreachable() => {
                warn!("Readiness check: senseBox {} unreachable: {}", self.box_id, e);
                false
            }
            Err(e) => {
                debug!("Readiness check: senseBox {} reachable but: {}", self.box_id, e);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{
        cache::{CacheStore, MemoryCache},
        fetcher::cache_key,
        models::{Overall, SensorReading, Snapshot},
        upstream::SenseBoxClient,
    };
    use chrono::{TimeDelta, Utc};
    use std::time::Duration;

    fn offline(cache: &MemoryCache) -> (HealthAggregator, Metrics) {
        offline_with_cooldown(cache, Duration::ZERO)
    }

    fn offline_with_cooldown(
        cache: &MemoryCache,
        cooldown: Duration,
    ) -> (HealthAggregator, Metrics) {
        // ---
        let metrics = Metrics::new().unwrap();
        let fetcher = CachedFetcher::new(
            SenseBoxClient::new("http://127.0.0.1:1/boxes", Duration::from_secs(2)).unwrap(),
            CacheStore::from(cache.clone()),
            metrics.clone(),
            "Temperatur",
            Duration::from_secs(300),
        );
        let health = HealthAggregator::new(Arc::new(fetcher), metrics.clone(), "box", cooldown);
        (health, metrics)
    }

    async fn seed(cache: &MemoryCache, fetched_ago: TimeDelta) {
        // ---
        let now = Utc::now();
        let snapshot = Snapshot {
            box_id: "box".into(),
            reading: SensorReading {
                temperature: 30.0,
                measured_at: now,
                fetched_at: now - fetched_ago,
            },
            document: serde_json::json!({}),
        };
        cache
            .set(&cache_key("box"), &serde_json::to_string(&snapshot).unwrap())
            .await;
    }

    #[tokio::test]
    async fn test_unreachable_and_empty_cache_is_unhealthy() {
        // ---
        let (health, metrics) = offline(&MemoryCache::new(Duration::from_secs(3600)));
        let status = health.check_health().await;

        assert!(!status.reachable);
        assert!(!status.cache_fresh);
        assert_eq!(status.overall, Overall::Unhealthy);
        assert_eq!(metrics.sensebox_availability.get(), 0.0);
    }

    #[tokio::test]
    async fn test_warm_cache_keeps_service_ready() {
        // ---
        let cache = MemoryCache::new(Duration::from_secs(3600));
        seed(&cache, TimeDelta::seconds(60)).await;
        let (health, _) = offline(&cache);
        let status = health.check_health().await;

        assert!(!status.reachable);
        assert!(status.cache_fresh);
        assert_eq!(status.overall, Overall::Healthy);
    }

    #[tokio::test]
    async fn test_stale_cache_does_not_count() {
        // ---
        let cache = MemoryCache::new(Duration::from_secs(3600));
        seed(&cache, TimeDelta::seconds(301)).await;
        let (health, _) = offline(&cache);

        assert!(!health.check_health().await.is_healthy());
    }

    #[tokio::test]
    async fn test_recent_upstream_result_is_reused() {
        // ---
        let cache = MemoryCache::new(Duration::from_secs(3600));
        let (health, metrics) = offline_with_cooldown(&cache, Duration::from_secs(3600));

        assert!(!health.check_health().await.reachable);

        // Pretend the upstream answered a moment ago; the offline upstream
        // is not contacted again inside the cooldown.
        *health.last_check.lock() = Some((Instant::now(), true));
        let status = health.check_health().await;
        assert!(status.reachable);
        assert_eq!(metrics.sensebox_availability.get(), 100.0);
    }

    #[tokio::test]
    async fn test_zero_cooldown_always_checks_upstream() {
        // ---
        let cache = MemoryCache::new(Duration::from_secs(3600));
        let (health, _) = offline(&cache);

        *health.last_check.lock() = Some((Instant::now(), true));
        assert!(!health.check_health().await.reachable);
    }
}
