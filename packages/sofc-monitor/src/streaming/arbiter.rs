// Mode arbitration
//
// A fixed-tick control loop with two independent sub-states. The device side
// decides between live device data and demo data (and drives the fallback
// generator while in demo). The external-sample side only reports whether the
// simulation producer is live, idle or has never pushed anything.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::live::Broadcaster;
use crate::streaming::device::{ConnectionState, DeviceLink};
use crate::streaming::fallback::FallbackGenerator;
use crate::streaming::ingest::SampleIngestor;
use crate::streaming::types::StatusLevel;

/// Client-observable mode of the device channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceMode {
    Connecting,
    Live,
    Demo,
    Disconnected,
}

/// Client-observable mode of the external-sample channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimMode {
    Live,
    Idle,
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modes {
    pub device: DeviceMode,
    pub simulink: SimMode,
}

impl Default for Modes {
    fn default() -> Self {
        Self {
            device: DeviceMode::Connecting,
            simulink: SimMode::NoData,
        }
    }
}

/// Shared, read-mostly view of the current modes
#[derive(Debug, Clone, Default)]
pub struct ModeBoard {
    inner: Arc<RwLock<Modes>>,
}

impl ModeBoard {
    pub fn current(&self) -> Modes {
        *self.inner.read()
    }

    pub fn is_demo(&self) -> bool {
        self.current().device == DeviceMode::Demo
    }

    fn set(&self, modes: Modes) {
        *self.inner.write() = modes;
    }
}

#[derive(Debug, Clone)]
pub struct ArbiterSettings {
    /// Tick period; also the demo reading interval
    pub tick: Duration,
    /// Generate demo readings while the device is away
    pub demo_enabled: bool,
    /// A sample older than this makes the external channel idle
    pub sample_stale_after: Duration,
}

impl Default for ArbiterSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            demo_enabled: true,
            sample_stale_after: Duration::from_secs(5),
        }
    }
}

pub struct ModeArbiter {
    device: DeviceLink,
    broadcaster: Broadcaster,
    ingestor: SampleIngestor,
    generator: FallbackGenerator,
    board: ModeBoard,
    settings: ArbiterSettings,
}

impl ModeArbiter {
    pub fn new(
        device: DeviceLink,
        broadcaster: Broadcaster,
        ingestor: SampleIngestor,
        board: ModeBoard,
        settings: ArbiterSettings,
    ) -> Self {
        Self {
            device,
            broadcaster,
            ingestor,
            generator: FallbackGenerator,
            board,
            settings,
        }
    }

    /// Evaluate both channels once. In demo mode this also emits one
    /// synthetic reading.
    pub fn tick(&self, now: Instant) -> Modes {
        let previous = self.board.current();
        let modes = Modes {
            device: self.device_mode(),
            simulink: self.sim_mode(now),
        };

        if modes.device != previous.device {
            info!("Device mode {:?} -> {:?}", previous.device, modes.device);
            let (level, message) = match modes.device {
                DeviceMode::Live => (StatusLevel::Info, "Live device data"),
                DeviceMode::Demo => (
                    StatusLevel::Warning,
                    "Serial device unavailable, streaming demo data",
                ),
                DeviceMode::Connecting => (StatusLevel::Info, "Connecting to serial device"),
                DeviceMode::Disconnected => (StatusLevel::Warning, "Serial device disconnected"),
            };
            self.broadcaster.publish_status(level, message);
        }

        if modes.simulink != previous.simulink {
            info!("Simulink mode {:?} -> {:?}", previous.simulink, modes.simulink);
            let message = match modes.simulink {
                SimMode::Live => "Simulink stream live",
                SimMode::Idle => "Simulink stream idle",
                SimMode::NoData => "No Simulink data received",
            };
            self.broadcaster.publish_status(StatusLevel::Info, message);
        }

        self.board.set(modes);

        if modes.device == DeviceMode::Demo {
            self.broadcaster.publish_reading(self.generator.generate());
        }

        modes
    }

    /// Run the tick loop until `cancel` fires
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.settings.tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        info!("Mode arbiter stopped");
                        break;
                    }

                    _ = ticker.tick() => {
                        self.tick(Instant::now());
                    }
                }
            }
        })
    }

    fn device_mode(&self) -> DeviceMode {
        if self.device.is_connected() {
            DeviceMode::Live
        } else if self.settings.demo_enabled {
            DeviceMode::Demo
        } else if self.device.state() == ConnectionState::Connecting {
            DeviceMode::Connecting
        } else {
            DeviceMode::Disconnected
        }
    }

    fn sim_mode(&self, now: Instant) -> SimMode {
        match self.ingestor.last_received_at() {
            None => SimMode::NoData,
            Some(at) if now.saturating_duration_since(at) <= self.settings.sample_stale_after => {
                SimMode::Live
            }
            Some(_) => SimMode::Idle,
        }
    }
}
