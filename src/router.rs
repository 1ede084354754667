//! Inbound message classification.
//!
//! Everything off the wire passes through [`MessageRouter::route`] before it
//! can touch aggregation, logging, or notifications. A message that fails to
//! parse or coerce is dropped by the caller; it never reaches downstream
//! components and never aborts the stream.

use chrono::{DateTime, Utc};
use sonic_rs::{JsonValueTrait, Value};
use thiserror::Error;

use crate::core::{SensorReading, StatusLevel};

/// Reserved sensor name that carries a device status side signal.
const STATUS_SENSOR: &str = "status";

/// Outcome of classifying one inbound payload. First match wins: an `alert`
/// field beats a `system` marker, which beats a `{name, value}` reading.
#[derive(Debug, Clone)]
pub enum Classified {
    Alert { text: String },
    System { message: String },
    Reading(SensorReading),
    Unrecognized,
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("non-numeric value for sensor `{name}`: {value}")]
    ValueCoercion { name: String, value: String },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MessageRouter;

impl MessageRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, raw: &[u8], received_at: DateTime<Utc>) -> Result<Classified, RouteError> {
        let value: Value = sonic_rs::from_slice(raw)
            .map_err(|err| RouteError::InvalidPayload(err.to_string()))?;

        if let Some(text) = value.get("alert").as_str() {
            return Ok(Classified::Alert {
                text: text.to_string(),
            });
        }

        if value.get("system").as_bool() == Some(true) {
            let message = value
                .get("message")
                .as_str()
                .unwrap_or("system notice")
                .to_string();
            return Ok(Classified::System { message });
        }

        if let Some(name) = value.get("name").as_str() {
            let raw_value = value.get("value");
            if !raw_value.is_none() && !raw_value.is_null() {
                let coerced = coerce_numeric(&raw_value).ok_or_else(|| {
                    RouteError::ValueCoercion {
                        name: name.to_string(),
                        value: raw_value
                            .as_str()
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("{raw_value:?}")),
                    }
                })?;
                return Ok(Classified::Reading(SensorReading {
                    name: name.to_string(),
                    value: coerced,
                    raw_text: value.get("raw_data").as_str().map(str::to_string),
                    received_at,
                }));
            }
        }

        Ok(Classified::Unrecognized)
    }

    /// Derived device status for readings on the reserved `status` sensor.
    /// The reading itself is still aggregated like any other.
    pub fn status_signal(&self, reading: &SensorReading) -> Option<StatusLevel> {
        if reading.name == STATUS_SENSOR {
            StatusLevel::from_value(reading.value)
        } else {
            None
        }
    }
}

fn coerce_numeric(value: &Option<&Value>) -> Option<f64> {
    if let Some(n) = value.as_f64() {
        return Some(n);
    }
    value.as_str().and_then(|s| s.trim().parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(raw: &str) -> Result<Classified, RouteError> {
        MessageRouter::new().route(raw.as_bytes(), Utc::now())
    }

    #[test]
    fn alert_field_wins_over_reading_shape() {
        let classified = route(r#"{"alert":"overheating","name":"temperature","value":90}"#);
        match classified {
            Ok(Classified::Alert { text }) => assert_eq!(text, "overheating"),
            other => panic!("expected alert, got {other:?}"),
        }
    }

    #[test]
    fn system_marker_with_and_without_message() {
        match route(r#"{"system":true,"message":"rebooting"}"#) {
            Ok(Classified::System { message }) => assert_eq!(message, "rebooting"),
            other => panic!("expected system notice, got {other:?}"),
        }
        match route(r#"{"system":true}"#) {
            Ok(Classified::System { message }) => assert_eq!(message, "system notice"),
            other => panic!("expected system notice, got {other:?}"),
        }
    }

    #[test]
    fn reading_coerces_numeric_strings() {
        match route(r#"{"name":"niveausonore","value":"42.5"}"#) {
            Ok(Classified::Reading(reading)) => {
                assert_eq!(reading.name, "niveausonore");
                assert_eq!(reading.value, 42.5);
                assert!(reading.raw_text.is_none());
            }
            other => panic!("expected reading, got {other:?}"),
        }
    }

    #[test]
    fn reading_keeps_raw_data_for_log_display() {
        match route(r#"{"name":"temperature","value":20,"raw_data":"T:20C"}"#) {
            Ok(Classified::Reading(reading)) => {
                assert_eq!(reading.raw_text.as_deref(), Some("T:20C"));
            }
            other => panic!("expected reading, got {other:?}"),
        }
    }

    #[test]
    fn non_numeric_value_is_a_coercion_error() {
        match route(r#"{"name":"temperature","value":"warm"}"#) {
            Err(RouteError::ValueCoercion { name, .. }) => assert_eq!(name, "temperature"),
            other => panic!("expected coercion error, got {other:?}"),
        }
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            route("not valid structured data"),
            Err(RouteError::InvalidPayload(_))
        ));
    }

    #[test]
    fn null_value_and_unknown_shapes_are_unrecognized() {
        assert!(matches!(
            route(r#"{"name":"temperature","value":null}"#),
            Ok(Classified::Unrecognized)
        ));
        assert!(matches!(
            route(r#"{"name":"temperature"}"#),
            Ok(Classified::Unrecognized)
        ));
        assert!(matches!(route(r#"{"foo":1}"#), Ok(Classified::Unrecognized)));
    }

    #[test]
    fn status_sensor_yields_side_signal() {
        let router = MessageRouter::new();
        let reading = |value: f64| SensorReading {
            name: "status".to_string(),
            value,
            raw_text: None,
            received_at: Utc::now(),
        };

        assert_eq!(router.status_signal(&reading(1.0)), Some(StatusLevel::Well));
        assert_eq!(
            router.status_signal(&reading(2.0)),
            Some(StatusLevel::NotWell)
        );
        assert_eq!(router.status_signal(&reading(3.0)), None);

        let other = SensorReading {
            name: "temperature".to_string(),
            value: 1.0,
            raw_text: None,
            received_at: Utc::now(),
        };
        assert_eq!(router.status_signal(&other), None);
    }
}
