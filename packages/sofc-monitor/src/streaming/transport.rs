// Device transport seam
//
// `DeviceTransport` opens a byte stream to the instrument and lists the
// endpoints it could open. `SerialTransport` is the production
// implementation; tests substitute in-memory streams.

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio_serial::SerialPortBuilderExt;
use tracing::info;

use crate::streaming::types::{SerialConfig, TransportError};

/// Raw byte stream from an opened device
pub type DeviceStream = Box<dyn AsyncRead + Send + Unpin>;

#[async_trait]
pub trait DeviceTransport: Send + Sync + 'static {
    async fn open(&self, config: &SerialConfig) -> Result<DeviceStream, TransportError>;

    fn list_endpoints(&self) -> Result<Vec<String>, TransportError>;
}

/// Serial port transport (e.g. /dev/ttyUSB0, /dev/ttyACM0, COM3)
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialTransport;

#[async_trait]
impl DeviceTransport for SerialTransport {
    async fn open(&self, config: &SerialConfig) -> Result<DeviceStream, TransportError> {
        info!(
            "Opening serial port: {} at {} baud",
            config.port, config.baud_rate
        );

        let port = tokio_serial::new(&config.port, config.baud_rate)
            .open_native_async()
            .map_err(|e| TransportError::Open {
                port: config.port.clone(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(port))
    }

    fn list_endpoints(&self) -> Result<Vec<String>, TransportError> {
        let ports = tokio_serial::available_ports()
            .map_err(|e| TransportError::Enumerate(e.to_string()))?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }
}
