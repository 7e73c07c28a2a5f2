// Common types for the ingestion pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// One validated sensor sample from the SOFC rig.
///
/// Every field is finite; readings that fail validation are never built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Receipt instant (the device does not supply timestamps)
    pub timestamp: DateTime<Utc>,
    pub water_temp: f64,
    pub air_temp: f64,
    pub air_pressure: f64,
    pub water_pressure: f64,
}

/// One time-step pushed by the external simulation tool.
///
/// The field set is open: new signal names may show up in any sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalSample {
    /// Simulation time in seconds, as reported by the producer
    pub time: f64,
    #[serde(rename = "data")]
    pub fields: BTreeMap<String, Option<f64>>,
}

/// Serial line parameters for the device link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
}

/// Errors produced while turning a device line into a [`Reading`]
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecodeError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Schema violation: {0}")]
    SchemaViolation(String),
}

/// Rejection reasons for an externally pushed sample
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Sample must be a JSON object")]
    NotAnObject,

    #[error("`time` must be a finite number")]
    InvalidTime,

    #[error("`data` must be an object")]
    InvalidFields,
}

/// Device transport failures. Always recoverable: the link retries.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to open {port}: {reason}")]
    Open { port: String, reason: String },

    #[error("Read failed: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to enumerate ports: {0}")]
    Enumerate(String),
}

/// Severity attached to a status event on the live channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}
