//! Cached access to the watched senseBox.
//!
//! A cache hit is served without touching upstream as long as the entry's
//! `fetched_at` is within the TTL, whatever the backend still holds. A miss
//! costs exactly one upstream call, and a successful one exactly one cache
//! write. Failed fetches are never cached. There is no single-flight guard:
//! concurrent misses each go upstream.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    cache::CacheStore,
    errors::FetchError,
    freshness::{age_seconds, is_fresh},
    metrics::Metrics,
    models::{SensorReading, Snapshot},
    upstream::{extract_measurement, SenseBoxClient},
};

// ---

pub struct CachedFetcher {
    // ---
    upstream: SenseBoxClient,
    cache: CacheStore,
    metrics: Metrics,
    sensor_title: String,
    ttl: Duration,
}

/// Cache key for a box.
pub fn cache_key(box_id: &str) -> String {
    format!("sensor_data_{}", box_id)
}

impl CachedFetcher {
    pub fn new(
        upstream: SenseBoxClient,
        cache: CacheStore,
        metrics: Metrics,
        sensor_title: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            upstream,
            cache,
            metrics,
            sensor_title: sensor_title.into(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Latest reading for `box_id`, from cache when possible.
    pub async fn get_reading(&self, box_id: &str) -> Result<SensorReading, FetchError> {
        // ---
        self.get_snapshot(box_id).await.map(|s| s.reading)
    }

    /// Latest snapshot for `box_id`, from cache when possible.
    pub async fn get_snapshot(&self, box_id: &str) -> Result<Snapshot, FetchError> {
        // ---
        if let Some(snapshot) = self.cached_snapshot(box_id).await {
            let now = Utc::now();
            let age = age_seconds(snapshot.reading.fetched_at, now);
            if is_fresh(snapshot.reading.fetched_at, now, self.ttl) {
                debug!("Retrieved sensor data from cache ({:.1}s old)", age);
                self.metrics.cache_age_seconds.set(age);
                return Ok(snapshot);
            }
            debug!("Cached sensor data expired ({:.1}s old), refetching", age);
        }

        self.refresh(box_id).await
    }

    /// Fetch from upstream unconditionally and, on success, replace the cache
    /// entry.
    pub async fn refresh(&self, box_id: &str) -> Result<Snapshot, FetchError> {
        // ---
        let document = self.upstream.fetch_box(box_id).await?;
        let measurement = extract_measurement(&document, &self.sensor_title)?;

        let snapshot = Snapshot {
            box_id: box_id.to_string(),
            reading: SensorReading {
                temperature: measurement.value,
                measured_at: measurement.measured_at,
                fetched_at: Utc::now(),
            },
            document,
        };

        self.store_snapshot(&snapshot).await;
        self.metrics.cache_age_seconds.set(0.0);

        info!(
            "Fetched sensor data for box {}: {} measured at {}",
            box_id, snapshot.reading.temperature, snapshot.reading.measured_at
        );
        Ok(snapshot)
    }

    /// Age of the current cache entry regardless of TTL, `None` if there is
    /// no decodable entry.
    pub async fn cached_age(&self, box_id: &str) -> Option<Duration> {
        // ---
        let snapshot = self.cached_snapshot(box_id).await?;
        let age = Utc::now().signed_duration_since(snapshot.reading.fetched_at);
        Some(age.to_std().unwrap_or(Duration::ZERO))
    }

    /// Read and decode the cache entry. Backend and decode errors degrade to
    /// a miss.
    async fn cached_snapshot(&self, box_id: &str) -> Option<Snapshot> {
        // ---
        let key = cache_key(box_id);
        let raw = match self.cache.get(&key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str::<Snapshot>(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    async fn store_snapshot(&self, snapshot: &Snapshot) {
        // ---
        let key = cache_key(&snapshot.box_id);
        let value = match serde_json::to_string(snapshot) {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not serialize snapshot for {}: {}", key, e);
                return;
            }
        };

        if let Err(e) = self.cache.set(&key, &value, self.ttl).await {
            warn!("Cache write failed for {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::cache::MemoryCache;
    use chrono::TimeDelta;

    const BOX_ID: &str = "5eba5fbad46fb8001b799786";

    /// Fetcher whose upstream refuses connections, so only the cache can
    /// answer.
    fn offline_fetcher(cache: &MemoryCache) -> (CachedFetcher, Metrics) {
        // ---
        let metrics = Metrics::new().unwrap();
        let upstream =
            SenseBoxClient::new("http://127.0.0.1:1/boxes", Duration::from_secs(2)).unwrap();
        let fetcher = CachedFetcher::new(
            upstream,
            CacheStore::from(cache.clone()),
            metrics.clone(),
            "Temperatur",
            Duration::from_secs(300),
        );
        (fetcher, metrics)
    }

    fn memory() -> MemoryCache {
        MemoryCache::new(Duration::from_secs(3600))
    }

    async fn seed(cache: &MemoryCache, fetched_ago: TimeDelta) -> Snapshot {
        // ---
        let now = Utc::now();
        let snapshot = Snapshot {
            box_id: BOX_ID.into(),
            reading: SensorReading {
                temperature: 24.5,
                measured_at: now - TimeDelta::minutes(10),
                fetched_at: now - fetched_ago,
            },
            document: serde_json::json!({ "sensors": [] }),
        };
        cache
            .set(&cache_key(BOX_ID), &serde_json::to_string(&snapshot).unwrap())
            .await;
        snapshot
    }

    #[tokio::test]
    async fn test_cache_hit_skips_upstream() {
        // ---
        let cache = memory();
        let seeded = seed(&cache, TimeDelta::seconds(30)).await;
        let (fetcher, metrics) = offline_fetcher(&cache);

        let reading = tokio_test::assert_ok!(fetcher.get_reading(BOX_ID).await);
        assert_eq!(reading, seeded.reading);
        assert!(metrics.cache_age_seconds.get() >= 30.0);
    }

    #[tokio::test]
    async fn test_entry_past_ttl_is_treated_as_absent() {
        // ---
        // The backend still holds the entry, but fetched_at is past the TTL.
        let cache = memory();
        seed(&cache, TimeDelta::seconds(301)).await;
        let (fetcher, _) = offline_fetcher(&cache);

        let err = tokio_test::assert_err!(fetcher.get_reading(BOX_ID).await);
        assert!(err.is_unreachable(), "got {err:?}");
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        // ---
        let cache = memory();
        cache.set(&cache_key(BOX_ID), "not json").await;
        let (fetcher, _) = offline_fetcher(&cache);

        assert!(fetcher.cached_age(BOX_ID).await.is_none());
        assert!(fetcher.get_reading(BOX_ID).await.unwrap_err().is_unreachable());
    }

    #[tokio::test]
    async fn test_cached_age_ignores_ttl() {
        // ---
        let cache = memory();
        seed(&cache, TimeDelta::seconds(900)).await;
        let (fetcher, _) = offline_fetcher(&cache);

        let age = fetcher.cached_age(BOX_ID).await.unwrap();
        assert!(age >= Duration::from_secs(900));
    }

    #[tokio::test]
    async fn test_refresh_bypasses_warm_cache() {
        // ---
        let cache = memory();
        seed(&cache, TimeDelta::seconds(1)).await;
        let (fetcher, _) = offline_fetcher(&cache);

        assert!(fetcher.refresh(BOX_ID).await.unwrap_err().is_unreachable());
        // A failed refresh leaves the cached entry alone.
        assert!(fetcher.get_reading(BOX_ID).await.is_ok());
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key("abc"), "sensor_data_abc");
    }
}
