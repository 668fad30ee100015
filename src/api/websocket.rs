//! WebSocket feed of casino events.
//!
//! Each connection gets its own subscription to the broadcast bus.
//! Events are pushed as JSON; inbound traffic is ignored apart from
//! pings and close frames. A subscriber that lags far enough to drop
//! events is told so and carries on from the live edge.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use super::handlers::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.engine.events().subscribe();

    debug!("websocket subscriber connected");
    loop {
        tokio::select! {
            event = events.recv() => {
                let payload = match event {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(_) => continue,
                    },
                    Err(RecvError::Lagged(missed)) => {
                        format!("{{\"event\":\"lagged\",\"missed\":{}}}", missed)
                    }
                    Err(RecvError::Closed) => break,
                };
                if sender.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }
    debug!("websocket subscriber disconnected");
}
