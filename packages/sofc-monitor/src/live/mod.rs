mod broadcaster;
mod events;
mod types;
pub mod websocket;

pub use broadcaster::{Broadcaster, ClientId, LiveClient};
pub use events::live_events;
pub use types::LiveMessage;
pub use websocket::handle_websocket;
