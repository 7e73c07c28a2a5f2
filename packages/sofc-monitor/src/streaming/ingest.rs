// External simulation sample ingestion
//
// The modelling tool pushes `{time, data}` objects over HTTP. Only the
// envelope shape is checked; field values that are not numbers become null.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::live::Broadcaster;
use crate::streaming::history::SharedHistory;
use crate::streaming::types::{ExternalSample, ValidationError};

/// Accepts external samples, stores and broadcasts them, and remembers every
/// signal name ever seen.
#[derive(Clone)]
pub struct SampleIngestor {
    broadcaster: Broadcaster,
    known_fields: Arc<RwLock<BTreeSet<String>>>,
    last_received: Arc<RwLock<Option<Instant>>>,
}

impl SampleIngestor {
    pub fn new(broadcaster: Broadcaster) -> Self {
        Self {
            broadcaster,
            known_fields: Arc::new(RwLock::new(BTreeSet::new())),
            last_received: Arc::new(RwLock::new(None)),
        }
    }

    /// Validate and ingest one raw sample
    pub fn ingest(&self, raw: &Value) -> Result<ExternalSample, ValidationError> {
        let sample = parse_sample(raw)?;

        self.known_fields
            .write()
            .extend(sample.fields.keys().cloned());
        *self.last_received.write() = Some(Instant::now());

        self.broadcaster.publish_sample(sample.clone());
        Ok(sample)
    }

    /// Every field name seen so far, sorted. Never shrinks on eviction.
    pub fn known_fields(&self) -> Vec<String> {
        self.known_fields.read().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<ExternalSample> {
        self.history().latest()
    }

    pub fn history_slice(&self, limit: Option<usize>) -> Vec<ExternalSample> {
        self.history().slice(limit)
    }

    pub fn count(&self) -> usize {
        self.history().len()
    }

    /// Receipt instant of the most recent accepted sample
    pub fn last_received_at(&self) -> Option<Instant> {
        *self.last_received.read()
    }

    fn history(&self) -> &SharedHistory<ExternalSample> {
        self.broadcaster.samples()
    }
}

fn parse_sample(raw: &Value) -> Result<ExternalSample, ValidationError> {
    let object = raw.as_object().ok_or(ValidationError::NotAnObject)?;

    let time = object
        .get("time")
        .and_then(Value::as_f64)
        .filter(|t| t.is_finite())
        .ok_or(ValidationError::InvalidTime)?;

    let data = object
        .get("data")
        .and_then(Value::as_object)
        .ok_or(ValidationError::InvalidFields)?;

    let fields: BTreeMap<String, Option<f64>> = data
        .iter()
        .map(|(name, value)| {
            let number = value.as_f64();
            if number.is_none() && !value.is_null() {
                debug!("Sample field `{}` is not numeric, storing null", name);
            }
            (name.clone(), number)
        })
        .collect();

    Ok(ExternalSample { time, fields })
}
