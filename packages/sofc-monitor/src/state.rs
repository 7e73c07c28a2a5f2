use std::sync::Arc;
use std::time::Instant;

use crate::config::ServerConfig;
use crate::live::Broadcaster;
use crate::streaming::{
    DeviceLink, DeviceTransport, ModeArbiter, ModeBoard, SampleIngestor, SharedHistory,
};

/// Main server state shared across all handlers
pub struct ServerState {
    pub config: ServerConfig,
    pub broadcaster: Broadcaster,
    pub ingestor: SampleIngestor,
    pub device: DeviceLink,
    pub modes: ModeBoard,
    pub start_time: Instant,
}

impl ServerState {
    /// Build the pipeline and start the device link driver. The link is
    /// left disconnected until [`DeviceLink::connect`] is called.
    pub fn new(config: ServerConfig, transport: Arc<dyn DeviceTransport>) -> Self {
        let broadcaster = Broadcaster::new(
            SharedHistory::new(config.reading_history_capacity),
            SharedHistory::new(config.sample_history_capacity),
        )
        .with_backlog(config.live_client_backlog);
        let ingestor = SampleIngestor::new(broadcaster.clone());
        let device = DeviceLink::spawn(
            transport,
            broadcaster.clone(),
            config.serial_config(),
            config.link_settings(),
        );

        Self {
            config,
            broadcaster,
            ingestor,
            device,
            modes: ModeBoard::default(),
            start_time: Instant::now(),
        }
    }

    /// Arbiter wired to this state's components
    pub fn arbiter(&self) -> ModeArbiter {
        ModeArbiter::new(
            self.device.clone(),
            self.broadcaster.clone(),
            self.ingestor.clone(),
            self.modes.clone(),
            self.config.arbiter_settings(),
        )
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
