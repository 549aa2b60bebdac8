//! Typed error kinds for the fetch, cache and storage paths.
//!
//! These never carry HTTP semantics; the translation to status codes and
//! response bodies happens at the request boundary in `routes`.

use thiserror::Error;

// ---

/// Why a temperature reading could not be produced.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The upstream call failed (network, timeout, non-2xx, undecodable body).
    #[error("sensor box unreachable: {0}")]
    Unreachable(String),

    /// The payload has no sensor with the configured title.
    #[error("temperature sensor not found")]
    SensorNotFound,

    /// The sensor exists but has no last measurement.
    #[error("no temperature measurements available")]
    NoMeasurement,

    /// The last measurement lacks a usable value or timestamp.
    #[error("invalid measurement data: {0}")]
    InvalidMeasurement(String),

    /// The measurement is older than the serving threshold.
    #[error("measurement is {age_secs}s old, threshold is {max_age_secs}s")]
    StaleMeasurement { age_secs: i64, max_age_secs: u64 },

    #[error("invalid timestamp format: {0}")]
    TimestampParse(String),

    /// The payload does not have the expected shape at all.
    #[error("invalid upstream payload: {0}")]
    InvalidPayload(String),
}

impl FetchError {
    /// True when the upstream could not be reached at all. Every other kind
    /// means a response came back.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unreachable(err.to_string())
    }
}

/// Cache backend failures. Callers degrade on these (miss / skipped write).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(String),

    #[error("cache backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
            Self::Connection(err.to_string())
        } else {
            Self::Backend(err.to_string())
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Object store failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage request failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("invalid storage credentials: {0}")]
    Credentials(#[from] s3::creds::error::CredentialsError),

    #[error("storage rejected {operation} with status {status}")]
    Rejected { operation: &'static str, status: u16 },

    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;
