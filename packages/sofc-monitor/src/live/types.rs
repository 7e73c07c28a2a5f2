use serde::{Deserialize, Serialize};

use crate::streaming::types::{ExternalSample, Reading, StatusLevel};

/// Messages pushed to dashboard clients over the live channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LiveMessage {
    /// One new device (or demo) reading
    Reading { payload: Reading },

    /// Device reading history, sent once on connect
    History { payload: Vec<Reading> },

    /// Lifecycle and mode notices
    Status { level: StatusLevel, message: String },

    /// One external simulation sample
    SimulinkSample { payload: ExternalSample },
}

impl LiveMessage {
    pub fn status(level: StatusLevel, message: impl Into<String>) -> Self {
        Self::Status {
            level,
            message: message.into(),
        }
    }

    /// Envelope name, as it appears in the `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Reading { .. } => "reading",
            Self::History { .. } => "history",
            Self::Status { .. } => "status",
            Self::SimulinkSample { .. } => "simulink-sample",
        }
    }
}
