//! Prometheus metrics for the service.
//!
//! One `Metrics` value is built at startup and cloned into every component
//! that records observations; all clones share the same registry.

use std::sync::Arc;

use prometheus::{
    register_gauge_with_registry, register_histogram_with_registry,
    register_int_counter_vec_with_registry, register_int_counter_with_registry, Encoder, Gauge,
    Histogram, IntCounter, IntCounterVec, Registry, TextEncoder,
};

// ---

/// `operation_type` label values for `storage_operations_total`.
pub mod storage_op {
    pub const BUCKET_CREATION: &str = "bucket_creation";
    pub const DATA_STORAGE: &str = "data_storage";
    pub const DATA_STORAGE_FAILURE: &str = "data_storage_failure";
}

#[derive(Clone)]
pub struct Metrics {
    // ---
    pub request_count: IntCounter,
    pub request_latency: Histogram,
    pub last_temperature: Gauge,
    pub sensebox_availability: Gauge,
    pub cache_age_seconds: Gauge,
    pub storage_operations: IntCounterVec,

    registry: Arc<Registry>,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        // ---
        let registry = Registry::new();

        let request_count = register_int_counter_with_registry!(
            "beekeeping_api_request_count_total",
            "Total number of requests served",
            registry
        )?;

        let request_latency = register_histogram_with_registry!(
            "beekeeping_api_latency_seconds",
            "Time taken to process API requests",
            vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            registry
        )?;

        let last_temperature = register_gauge_with_registry!(
            "beekeeping_api_last_temperature",
            "Last measured temperature",
            registry
        )?;

        let sensebox_availability = register_gauge_with_registry!(
            "beekeeping_api_sensebox_availability",
            "Percentage of senseBoxes that are currently accessible",
            registry
        )?;

        let cache_age_seconds = register_gauge_with_registry!(
            "beekeeping_api_cache_age_seconds",
            "Age of the cached data in seconds",
            registry
        )?;

        let storage_operations = register_int_counter_vec_with_registry!(
            "beekeeping_api_storage_operations_total",
            "Total number of storage operations performed",
            &["operation_type"],
            registry
        )?;

        Ok(Metrics {
            request_count,
            request_latency,
            last_temperature,
            sensebox_availability,
            cache_age_seconds,
            storage_operations,
            registry: Arc::new(registry),
        })
    }

    pub fn record_storage(&self, operation_type: &str) {
        self.storage_operations
            .with_label_values(&[operation_type])
            .inc();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn gather(&self) -> prometheus::Result<String> {
        // ---
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
