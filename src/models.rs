//! Simple data models for the temperature service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Upper bound (inclusive) of the "Too Cold" band, in degrees Celsius.
pub const COLD_THRESHOLD: f64 = 10.0;

/// Upper bound (inclusive) of the "Good" band, in degrees Celsius.
pub const HOT_THRESHOLD: f64 = 36.0;

/// One temperature observation.
///
/// `measured_at` comes from the sensor box, `fetched_at` is stamped locally
/// when the reading is written to the cache. A reading is never mutated; the
/// next fetch supersedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    // ---
    pub temperature: f64,
    pub measured_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

/// What the cache holds and what gets persisted to object storage: the
/// extracted reading plus the raw upstream document it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    // ---
    pub box_id: String,
    pub reading: SensorReading,
    pub document: serde_json::Value,
}

/// Qualitative temperature band for the hive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TemperatureStatus {
    #[serde(rename = "Too Cold")]
    TooCold,
    Good,
    #[serde(rename = "Too Hot")]
    TooHot,
}

/// Map a temperature onto its band. Both thresholds are inclusive on the
/// lower band: 10.0 is too cold, 36.0 is still good.
pub fn classify(temperature: f64) -> TemperatureStatus {
    // ---
    if temperature <= COLD_THRESHOLD {
        TemperatureStatus::TooCold
    } else if temperature <= HOT_THRESHOLD {
        TemperatureStatus::Good
    } else {
        TemperatureStatus::TooHot
    }
}

impl TemperatureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TooCold => "Too Cold",
            Self::Good => "Good",
            Self::TooHot => "Too Hot",
        }
    }
}

/// Readiness verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Overall {
    Healthy,
    Unhealthy,
}

/// Derived on every health check, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthStatus {
    // ---
    pub reachable: bool,
    pub cache_fresh: bool,
    pub overall: Overall,
}

impl HealthStatus {
    /// Unhealthy only when the upstream is unreachable *and* the cache is
    /// stale; a warm cache keeps the service ready.
    pub fn from_signals(reachable: bool, cache_fresh: bool) -> Self {
        // ---
        let overall = if reachable || cache_fresh {
            Overall::Healthy
        } else {
            Overall::Unhealthy
        };

        HealthStatus {
            reachable,
            cache_fresh,
            overall,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.overall == Overall::Healthy
    }
}
