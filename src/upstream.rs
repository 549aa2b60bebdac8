//! openSenseMap client for the single watched senseBox.
//!
//! One `GET {base}/{box_id}?format=json` per call, bounded by the configured
//! timeout, no retries. Extraction of the temperature measurement from the
//! raw document lives here too, so the fetcher only deals in readings.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::FetchError;

// ---

/// Timestamp layout of `lastMeasurement.createdAt`, e.g. `2025-06-01T12:00:00.123Z`.
pub const MEASUREMENT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// The slice of a box document this service looks at.
#[derive(Debug, Deserialize)]
struct BoxDocument {
    #[serde(default)]
    sensors: Vec<RawSensor>,
}

#[derive(Debug, Deserialize)]
struct RawSensor {
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "lastMeasurement", default)]
    last_measurement: Option<serde_json::Value>,
}

/// Temperature value and measurement time pulled out of a box document.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub value: f64,
    pub measured_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SenseBoxClient {
    // ---
    client: reqwest::Client,
    base_url: String,
}

impl SenseBoxClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        // ---
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the raw box document. Any transport error, non-2xx status or
    /// non-JSON body is `Unreachable`.
    pub async fn fetch_box(&self, box_id: &str) -> Result<serde_json::Value, FetchError> {
        // ---
        let url = format!("{}/{}", self.base_url, box_id);
        debug!("Fetching senseBox document from: {}", url);

        let result = async {
            self.client
                .get(&url)
                .query(&[("format", "json")])
                .send()
                .await?
                .error_for_status()?
                .json::<serde_json::Value>()
                .await
        }
        .await;

        result.map_err(|e| {
            warn!("Error fetching sensor data from {}: {}", url, e);
            FetchError::from(e)
        })
    }
}

/// Locate the sensor titled `sensor_title` and extract its last measurement.
pub fn extract_measurement(
    document: &serde_json::Value,
    sensor_title: &str,
) -> Result<Measurement, FetchError> {
    // ---
    let doc = BoxDocument::deserialize(document)
        .map_err(|e| FetchError::InvalidPayload(e.to_string()))?;

    let sensor = doc
        .sensors
        .iter()
        .find(|s| s.title.as_deref() == Some(sensor_title))
        .ok_or(FetchError::SensorNotFound)?;

    let measurement = match &sensor.last_measurement {
        Some(serde_json::Value::Object(m)) if !m.is_empty() => m,
        Some(serde_json::Value::Object(_)) | Some(serde_json::Value::Null) | None => {
            return Err(FetchError::NoMeasurement)
        }
        Some(other) => {
            return Err(FetchError::InvalidMeasurement(format!(
                "lastMeasurement is not an object: {other}"
            )))
        }
    };

    let value = measurement
        .get("value")
        .and_then(parse_value)
        .ok_or_else(|| FetchError::InvalidMeasurement("missing or non-numeric value".into()))?;

    let created_at = measurement
        .get("createdAt")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FetchError::InvalidMeasurement("missing createdAt".into()))?;

    Ok(Measurement {
        value,
        measured_at: parse_measurement_time(created_at)?,
    })
}

/// Parse a `createdAt` string into UTC.
pub fn parse_measurement_time(raw: &str) -> Result<DateTime<Utc>, FetchError> {
    // ---
    NaiveDateTime::parse_from_str(raw, MEASUREMENT_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| FetchError::TimestampParse(format!("{raw:?}: {e}")))
}

/// openSenseMap sends values as strings ("25.5"); accept plain numbers too.
fn parse_value(value: &serde_json::Value) -> Option<f64> {
    // ---
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{TimeZone, Timelike};
    use serde_json::json;

    fn box_with(measurement: serde_json::Value) -> serde_json::Value {
        json!({
            "_id": "5eba5fbad46fb8001b799786",
            "sensors": [
                { "title": "PM10", "lastMeasurement": { "value": "3.1", "createdAt": "2025-06-01T11:59:00.000Z" } },
                { "title": "Temperatur", "lastMeasurement": measurement }
            ]
        })
    }

    #[test]
    fn test_extracts_string_value() {
        // ---
        let doc = box_with(json!({ "value": "25.5", "createdAt": "2025-06-01T12:00:00.123Z" }));
        let m = extract_measurement(&doc, "Temperatur").unwrap();

        assert_eq!(m.value, 25.5);
        assert_eq!(
            m.measured_at,
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
                + chrono::TimeDelta::milliseconds(123)
        );
    }

    #[test]
    fn test_extracts_numeric_value() {
        // ---
        let doc = box_with(json!({ "value": 18, "createdAt": "2025-06-01T12:00:00.000Z" }));
        assert_eq!(extract_measurement(&doc, "Temperatur").unwrap().value, 18.0);
    }

    #[test]
    fn test_missing_sensor() {
        // ---
        let doc = json!({ "sensors": [] });
        assert!(matches!(
            extract_measurement(&doc, "Temperatur"),
            Err(FetchError::SensorNotFound)
        ));

        let doc = json!({ "name": "no sensors field" });
        assert!(matches!(
            extract_measurement(&doc, "Temperatur"),
            Err(FetchError::SensorNotFound)
        ));
    }

    #[test]
    fn test_null_or_empty_measurement() {
        // ---
        for measurement in [json!(null), json!({})] {
            let doc = box_with(measurement);
            assert!(matches!(
                extract_measurement(&doc, "Temperatur"),
                Err(FetchError::NoMeasurement)
            ));
        }
    }

    #[test]
    fn test_missing_value_or_timestamp() {
        // ---
        let no_value = box_with(json!({ "createdAt": "2025-06-01T12:00:00.000Z" }));
        assert!(matches!(
            extract_measurement(&no_value, "Temperatur"),
            Err(FetchError::InvalidMeasurement(_))
        ));

        let no_time = box_with(json!({ "value": "21.0" }));
        assert!(matches!(
            extract_measurement(&no_time, "Temperatur"),
            Err(FetchError::InvalidMeasurement(_))
        ));

        let garbage = box_with(json!({ "value": "warm", "createdAt": "2025-06-01T12:00:00.000Z" }));
        assert!(matches!(
            extract_measurement(&garbage, "Temperatur"),
            Err(FetchError::InvalidMeasurement(_))
        ));
    }

    #[test]
    fn test_malformed_timestamp() {
        // ---
        let doc = box_with(json!({ "value": "21.0", "createdAt": "01.06.2025 12:00" }));
        assert!(matches!(
            extract_measurement(&doc, "Temperatur"),
            Err(FetchError::TimestampParse(_))
        ));
    }

    #[test]
    fn test_sensors_not_an_array() {
        // ---
        let doc = json!({ "sensors": "none" });
        assert!(matches!(
            extract_measurement(&doc, "Temperatur"),
            Err(FetchError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_parse_measurement_time_fraction_digits() {
        // ---
        let micro = parse_measurement_time("2025-03-26T18:45:00.123456Z").unwrap();
        assert_eq!(micro.hour(), 18);
        assert_eq!(micro.nanosecond(), 123_456_000);
    }

    #[tokio::test]
    async fn test_unreachable_host_maps_to_unreachable() {
        // ---
        let client = SenseBoxClient::new("http://127.0.0.1:1/boxes", Duration::from_secs(2)).unwrap();
        let err = client.fetch_box("abc").await.unwrap_err();
        assert!(err.is_unreachable(), "got {err:?}");
    }
}
