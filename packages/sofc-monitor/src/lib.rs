pub mod app;
pub mod cli;
pub mod config;
pub mod handlers;
pub mod live;
pub mod state;
pub mod streaming;

pub use app::router;
pub use config::ServerConfig;
pub use state::ServerState;
