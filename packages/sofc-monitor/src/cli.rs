use clap::{Args, Parser, Subcommand};

use crate::config::ServerConfig;

/// SOFC Monitor - serial ingestion and live dashboard feed
#[derive(Parser)]
#[command(name = "sofc-monitor")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the server (default)
    Serve(ServeArgs),

    /// List serial ports that can be opened
    Ports,
}

/// Overrides applied on top of the environment configuration
#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Bind address
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Serial device path
    #[arg(long)]
    pub serial_port: Option<String>,

    /// Serial line rate
    #[arg(long)]
    pub baud_rate: Option<u32>,

    /// Do not generate demo readings while the device is away
    #[arg(long)]
    pub no_demo: bool,
}

impl ServeArgs {
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = &self.bind {
            config.bind_addr = bind.clone();
        }
        if let Some(serial_port) = &self.serial_port {
            config.serial_port = serial_port.clone();
        }
        if let Some(baud_rate) = self.baud_rate {
            config.baud_rate = baud_rate;
        }
        if self.no_demo {
            config.enable_demo_mode = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_is_default() {
        let cli = Cli::try_parse_from(["sofc-monitor"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::try_parse_from([
            "sofc-monitor",
            "serve",
            "--port",
            "8080",
            "--serial-port",
            "/dev/ttyACM0",
            "--baud-rate",
            "115200",
            "--no-demo",
        ])
        .unwrap();

        let Some(Commands::Serve(args)) = cli.command else {
            panic!("expected serve command");
        };
        let mut config = ServerConfig::default();
        args.apply(&mut config);

        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_addr, "0.0.0.0");
        assert_eq!(config.serial_port, "/dev/ttyACM0");
        assert_eq!(config.baud_rate, 115_200);
        assert!(!config.enable_demo_mode);
    }

    #[test]
    fn test_ports_command() {
        let cli = Cli::try_parse_from(["sofc-monitor", "ports"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Ports)));
    }
}
