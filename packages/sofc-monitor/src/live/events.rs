use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, info};

use crate::live::broadcaster::{Broadcaster, ClientId};
use crate::state::ServerState;

/// SSE mirror of the live channel for clients without WebSocket support
pub async fn live_events(
    State(state): State<Arc<ServerState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut client = state.broadcaster.register();
    let guard = Deregister {
        broadcaster: state.broadcaster.clone(),
        id: client.id,
    };
    info!("Live SSE {} connected", client.id);

    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(message) = client.receiver.recv().await {
            match serde_json::to_string(&message) {
                Ok(data) => yield Ok(Event::default().event(message.kind()).data(data)),
                Err(e) => error!("Failed to serialize {} message: {}", message.kind(), e),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Removes the SSE client once axum drops its stream
struct Deregister {
    broadcaster: Broadcaster,
    id: ClientId,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        self.broadcaster.deregister(&self.id);
    }
}
