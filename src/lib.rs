//! Temperature, readiness and snapshot service for a single openSenseMap
//! senseBox.
//!
//! The crate follows the Explicit Module Boundary Pattern (EMBP): this file is
//! the gateway that declares the modules and re-exports what sibling modules
//! use, so `routes/*.rs` only ever import from `crate::` and never from each
//! other's internals.
//!
//! Layering, leaves first:
//! - `models`     – readings, snapshots, the status classifier, health verdict
//! - `freshness`  – age checks shared by the serving and health decisions
//! - `upstream`   – openSenseMap client and measurement extraction
//! - `cache`      – key-value store with expiry (Redis or in-process)
//! - `fetcher`    – time-boxed cache in front of the upstream
//! - `health`     – readiness aggregation
//! - `storage`    – snapshot naming and object storage
//! - `scheduler`  – periodic persistence job
//! - `routes`     – HTTP surface

use anyhow::{Context, Result};
use tracing::{error, info};

pub mod cache;
pub mod config;
pub mod errors;
pub mod fetcher;
pub mod freshness;
pub mod health;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod storage;
pub mod upstream;

pub use config::Config;
pub use errors::{CacheError, FetchError, StorageError};
pub use models::{classify, HealthStatus, SensorReading, Snapshot, TemperatureStatus};
pub use state::AppState;

use cache::CacheStore;
use storage::{LocalStore, ObjectStore, S3Store};

// ---

/// Connect the configured backends and wire the service state.
///
/// A cache that cannot be reached is fatal, as is an unusable storage
/// configuration. A bucket that cannot be created is only logged: snapshots
/// will fail until it exists, everything else keeps working.
pub async fn build_state(config: Config) -> Result<AppState> {
    // ---
    let cache = CacheStore::connect(config.redis_url.as_deref(), config.cache_ttl)
        .await
        .context("Failed to connect to cache")?;
    info!("Using {} cache", cache.provider_name());

    let store = match &config.storage_url {
        Some(url) => {
            let keys = config.storage_keys();
            info!(
                "Using S3 storage bucket {} ({})",
                config.storage_bucket,
                if keys.is_some() { "signed" } else { "anonymous" }
            );
            ObjectStore::S3(
                S3Store::new(
                    url,
                    &config.storage_bucket,
                    &config.storage_region,
                    keys,
                    config.upstream_timeout,
                )
                .context("Failed to build S3 storage client")?,
            )
        }
        None => {
            let local = LocalStore::new(&config.storage_dir, &config.storage_bucket);
            info!("Using local storage at {}", local.bucket_dir().display());
            ObjectStore::Local(local)
        }
    };

    let state = AppState::new(config, cache, store)?;

    if let Err(e) = state.writer.ensure_bucket().await {
        error!("Error ensuring storage bucket exists: {}", e);
    }

    Ok(state)
}
