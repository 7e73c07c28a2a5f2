// Device line protocol
//
// The rig prints newline-delimited text. A line may carry one JSON object
// with the keys `t_water`, `t_air`, `p_air` and `p_water`, optionally
// surrounded by firmware debug output on the same line. Anything outside the
// outermost braces is ignored.

use crate::streaming::types::{DecodeError, Reading};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Line prefixes the firmware uses for pure diagnostic output
const DEFAULT_DIAGNOSTIC_PREFIXES: &[&str] = &["DEBUG", "[DEBUG]", "INFO", "[INFO]", "#", "//"];

/// Extracts, validates and decodes one [`Reading`] per device line
#[derive(Debug, Clone)]
pub struct DeviceLineParser {
    diagnostic_prefixes: Vec<String>,
}

impl Default for DeviceLineParser {
    fn default() -> Self {
        Self {
            diagnostic_prefixes: DEFAULT_DIAGNOSTIC_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl DeviceLineParser {
    /// Substring from the first `{` to the last `}` inclusive
    pub fn extract_payload<'a>(&self, line: &'a str) -> Option<&'a str> {
        let start = line.find('{')?;
        let end = line.rfind('}')?;
        if start < end {
            Some(&line[start..=end])
        } else {
            None
        }
    }

    /// Decode a payload, stamping it with the current instant
    pub fn decode_and_validate(&self, payload: &str) -> Result<Reading, DecodeError> {
        self.decode_at(payload, Utc::now())
    }

    pub fn decode_at(&self, payload: &str, timestamp: DateTime<Utc>) -> Result<Reading, DecodeError> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;

        let object = value
            .as_object()
            .ok_or_else(|| DecodeError::SchemaViolation("payload is not an object".to_string()))?;

        Ok(Reading {
            timestamp,
            water_temp: required_number(object, "t_water")?,
            air_temp: required_number(object, "t_air")?,
            air_pressure: required_number(object, "p_air")?,
            water_pressure: required_number(object, "p_water")?,
        })
    }

    /// Turn one raw line into a reading. Never fails: every rejected line
    /// degrades to `None`.
    pub fn process_line(&self, line: &str) -> Option<Reading> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        let Some(payload) = self.extract_payload(trimmed) else {
            if self.is_diagnostic(trimmed) {
                debug!("Device diagnostic: {}", trimmed);
            } else {
                debug!("Ignoring device line without payload: {}", trimmed);
            }
            return None;
        };

        match self.decode_and_validate(payload) {
            Ok(reading) => Some(reading),
            Err(e) => {
                warn!("Dropping device line: {} (line: {})", e, trimmed);
                None
            }
        }
    }

    fn is_diagnostic(&self, line: &str) -> bool {
        self.diagnostic_prefixes
            .iter()
            .any(|prefix| line.starts_with(prefix.as_str()))
    }
}

fn required_number(object: &Map<String, Value>, key: &str) -> Result<f64, DecodeError> {
    let value = object
        .get(key)
        .ok_or_else(|| DecodeError::SchemaViolation(format!("missing field `{}`", key)))?;

    match value.as_f64() {
        Some(n) if n.is_finite() => Ok(n),
        Some(_) => Err(DecodeError::SchemaViolation(format!(
            "field `{}` is not finite",
            key
        ))),
        None => Err(DecodeError::SchemaViolation(format!(
            "field `{}` is not numeric",
            key
        ))),
    }
}
