use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::state::ServerState;

/// Handle WebSocket upgrade on `/ws`
pub async fn handle_websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Forward the client's live feed until either side goes away
async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut client = state.broadcaster.register();
    let client_id = client.id;

    info!("Live WebSocket {} connected", client_id);

    loop {
        tokio::select! {
            outgoing = client.receiver.recv() => {
                let Some(message) = outgoing else { break };
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize {} message: {}", message.kind(), e);
                        continue;
                    }
                };
                if let Err(e) = sender.send(Message::Text(json.into())).await {
                    debug!("Failed to send to {}: {}", client_id, e);
                    break;
                }
            }

            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => {
                    info!("Live WebSocket {} closed by client", client_id);
                    break;
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = sender.send(Message::Pong(data)).await {
                        debug!("Failed to send pong to {}: {}", client_id, e);
                        break;
                    }
                }
                // The live channel is push-only; client text is ignored
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
            },
        }
    }

    state.broadcaster.deregister(&client_id);
    info!("Live WebSocket {} terminated", client_id);
}
