// Real-time ingestion pipeline
//
// Architecture:
// - `parser`: device line protocol (tolerant payload extraction and validation)
// - `transport` / `device`: serial link lifecycle with automatic reconnect
// - `ingest`: externally pushed simulation samples
// - `history`: bounded per-stream buffers
// - `fallback` / `arbiter`: demo data while no device is attached

pub mod arbiter;
pub mod device;
pub mod fallback;
pub mod history;
pub mod ingest;
pub mod parser;
pub mod transport;
pub mod types;

pub use arbiter::{ArbiterSettings, DeviceMode, ModeArbiter, ModeBoard, Modes, SimMode};
pub use device::{ConnectionState, DeviceLink, LinkEvent, LinkSettings};
pub use fallback::FallbackGenerator;
pub use history::{BoundedHistory, SharedHistory};
pub use ingest::SampleIngestor;
pub use parser::DeviceLineParser;
pub use transport::{DeviceStream, DeviceTransport, SerialTransport};
pub use types::{
    DecodeError, ExternalSample, Reading, SerialConfig, StatusLevel, TransportError,
    ValidationError,
};
