use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::streaming::{ArbiterSettings, LinkSettings, SerialConfig};

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind address (0.0.0.0 for LAN, 127.0.0.1 for localhost)
    pub bind_addr: String,
    /// Serial device path
    pub serial_port: String,
    /// Serial line rate
    pub baud_rate: u32,
    /// Device readings kept in memory
    pub reading_history_capacity: usize,
    /// External simulation samples kept in memory
    pub sample_history_capacity: usize,
    /// Delay before reconnecting a lost or failed serial link
    pub reconnect_delay_seconds: u64,
    /// Mode arbiter tick, which is also the demo reading interval
    pub demo_interval_ms: u64,
    /// Age after which the simulation stream is reported idle
    pub sample_stale_seconds: u64,
    /// Generate demo readings while no device is attached
    pub enable_demo_mode: bool,
    /// Live messages a dashboard client may fall behind by before it is dropped
    pub live_client_backlog: usize,
    /// CORS allowed origins (comma-separated in env var)
    pub cors_origins: Vec<String>,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            bind_addr: "0.0.0.0".to_string(),
            serial_port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            reading_history_capacity: 500,
            sample_history_capacity: 2000,
            reconnect_delay_seconds: 5,
            demo_interval_ms: 1000,
            sample_stale_seconds: 5,
            enable_demo_mode: true,
            live_client_backlog: 256,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            max_body_size: 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            port: env::var("SOFC_PORT")
                .map(|v| v.parse().map_err(|_| ConfigError::InvalidPort))
                .unwrap_or(Ok(defaults.port))?,
            bind_addr: env::var("SOFC_BIND_ADDR").unwrap_or(defaults.bind_addr),
            serial_port: env::var("SERIAL_PORT").unwrap_or(defaults.serial_port),
            baud_rate: parse_var("SERIAL_BAUD_RATE", defaults.baud_rate)?,
            reading_history_capacity: parse_var(
                "READING_HISTORY_CAPACITY",
                defaults.reading_history_capacity,
            )?,
            sample_history_capacity: parse_var(
                "SAMPLE_HISTORY_CAPACITY",
                defaults.sample_history_capacity,
            )?,
            reconnect_delay_seconds: parse_var(
                "RECONNECT_DELAY_SECONDS",
                defaults.reconnect_delay_seconds,
            )?,
            demo_interval_ms: parse_var("DEMO_INTERVAL_MS", defaults.demo_interval_ms)?,
            sample_stale_seconds: parse_var("SAMPLE_STALE_SECONDS", defaults.sample_stale_seconds)?,
            enable_demo_mode: env::var("ENABLE_DEMO_MODE")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(defaults.enable_demo_mode),
            live_client_backlog: parse_var("LIVE_CLIENT_BACKLOG", defaults.live_client_backlog)?,
            cors_origins: env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_body_size: parse_var("MAX_BODY_SIZE", defaults.max_body_size)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("SERIAL_BAUD_RATE", self.baud_rate as u64),
            ("READING_HISTORY_CAPACITY", self.reading_history_capacity as u64),
            ("SAMPLE_HISTORY_CAPACITY", self.sample_history_capacity as u64),
            ("DEMO_INTERVAL_MS", self.demo_interval_ms),
            ("LIVE_CLIENT_BACKLOG", self.live_client_backlog as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue(format!("{} must be greater than 0", name)));
            }
        }
        Ok(())
    }

    /// Get the full bind address (addr:port)
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig {
            port: self.serial_port.clone(),
            baud_rate: self.baud_rate,
        }
    }

    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            reconnect_delay: Duration::from_secs(self.reconnect_delay_seconds),
        }
    }

    pub fn arbiter_settings(&self) -> ArbiterSettings {
        ArbiterSettings {
            tick: Duration::from_millis(self.demo_interval_ms),
            demo_enabled: self.enable_demo_mode,
            sample_stale_after: Duration::from_secs(self.sample_stale_seconds),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{} is not a valid number: {}", name, raw))),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
