use clap::Parser;
use sofc_monitor::{
    cli::{Cli, Commands, ServeArgs},
    config::ServerConfig,
    router,
    state::ServerState,
    streaming::{DeviceTransport, SerialTransport},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sofc_monitor=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    let args = match cli.command {
        Some(Commands::Ports) => {
            match SerialTransport.list_endpoints() {
                Ok(ports) => ports.iter().for_each(|port| println!("{}", port)),
                Err(e) => warn!("{}", e),
            }
            return Ok(());
        }
        Some(Commands::Serve(args)) => args,
        None => ServeArgs::default(),
    };

    // Load configuration
    let mut config = ServerConfig::from_env()?;
    args.apply(&mut config);
    config.validate()?;

    info!("Starting SOFC Monitor v{}", VERSION);
    info!("Configuration loaded:");
    info!("   Port: {}", config.port);
    info!("   Bind address: {}", config.bind_addr);
    info!("   Serial port: {} at {} baud", config.serial_port, config.baud_rate);
    info!(
        "   History capacity: {} readings, {} samples",
        config.reading_history_capacity, config.sample_history_capacity
    );
    info!("   Demo mode enabled: {}", config.enable_demo_mode);
    info!("   CORS origins: {:?}", config.cors_origins);

    let addr: SocketAddr = config.bind_address().parse()?;

    // Create server state
    let state = Arc::new(ServerState::new(config, Arc::new(SerialTransport)));

    // Initial connect runs in the background; failure schedules a reconnect
    {
        let device = state.device.clone();
        let serial = state.config.serial_config();
        tokio::spawn(async move {
            if !device.connect(serial).await {
                warn!("Serial device not available at startup");
            }
        });
    }

    let cancel = CancellationToken::new();
    let arbiter = state.arbiter().spawn(cancel.child_token());

    let app = router(state.clone());

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Live WebSocket endpoint: ws://{}/ws", addr);
    info!("Live SSE endpoint: http://{}/events", addr);

    let broadcaster = state.broadcaster.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Live feeds would otherwise hold their connections open
            broadcaster.disconnect_all();
        })
        .await?;

    info!("Shutting down");
    cancel.cancel();
    if let Err(e) = arbiter.await {
        warn!("Mode arbiter task failed: {}", e);
    }
    state.device.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
