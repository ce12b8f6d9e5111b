use crate::time::serialize_canonical;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored battery measurement
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct TelemetrySample {
    pub id: i64,
    pub battery_id: String,
    pub current: f64,
    pub voltage: f64,
    pub temperature: f64,
    #[serde(serialize_with = "serialize_canonical")]
    pub timestamp: DateTime<Utc>,
}

/// Write payload. `time` is normalized before storage; when absent the
/// current instant is used.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSample {
    pub battery_id: String,
    pub current: f64,
    pub voltage: f64,
    pub temperature: f64,
    #[serde(default, alias = "timestamp")]
    pub time: Option<String>,
}

/// A single projected measurement
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct FieldValue {
    #[serde(serialize_with = "serialize_canonical")]
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_sample_json() {
        let sample = TelemetrySample {
            id: 7,
            battery_id: "B1".to_string(),
            current: 1.5,
            voltage: 3.7,
            temperature: 25.0,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };

        assert_eq!(
            serde_json::to_value(&sample).unwrap(),
            json!({
                "id": 7,
                "battery_id": "B1",
                "current": 1.5,
                "voltage": 3.7,
                "temperature": 25.0,
                "timestamp": "2024-01-01T00:00:00.000Z"
            })
        );
    }

    #[test]
    fn test_field_value_json() {
        let value = FieldValue {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            value: 3.7,
        };

        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({ "timestamp": "2024-01-01T00:00:00.000Z", "value": 3.7 })
        );
    }

    #[test]
    fn test_new_sample_time_alias() {
        let sample: NewSample = serde_json::from_value(json!({
            "battery_id": "B1",
            "current": 1.5,
            "voltage": 3.7,
            "temperature": 25.0,
            "timestamp": "2024-01-01"
        }))
        .unwrap();
        assert_eq!(sample.time.as_deref(), Some("2024-01-01"));

        let sample: NewSample = serde_json::from_value(json!({
            "battery_id": "B1",
            "current": 1.5,
            "voltage": 3.7,
            "temperature": 25.0
        }))
        .unwrap();
        assert!(sample.time.is_none());
    }
}
