//! WebSocket handler: one socket per connection, pumped through the hub.

use crate::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use intercom_realtime::{ClientEvent, Coordinator, Outbound};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WebSocketQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.coordinator, params.user_id))
}

async fn handle_socket(
    mut socket: WebSocket,
    coordinator: Arc<Coordinator>,
    identity_id: Option<String>,
) {
    // A handshake without an identity is terminal: the connection is never
    // bound and simply discarded.
    let Some(identity_id) = identity_id.filter(|id| !id.trim().is_empty()) else {
        warn!("socket connected without userId, ignoring connection");
        let _ = socket.send(Message::Close(None)).await;
        return;
    };

    let connection_id = cuid2::create_id();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    coordinator.hub().register(&connection_id, out_tx);

    // Writer task: drains the hub channel in order. Ends when the channel
    // closes (unregister) or a forced close arrives.
    let writer_connection_id = connection_id.clone();
    let writer_task = tokio::spawn(async move {
        while let Some(outbound) = out_rx.recv().await {
            match outbound {
                Outbound::Event(event) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(error) => {
                            warn!(%error, "failed to serialize server event");
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    debug!(
                        connection_id = %writer_connection_id,
                        "forced close, dropping socket"
                    );
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    coordinator.connect(&connection_id, &identity_id).await;

    while let Some(message) = ws_receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => coordinator.handle_event(&connection_id, event).await,
                Err(error) => {
                    warn!(
                        connection_id = %connection_id,
                        %error,
                        "ignoring malformed client event"
                    );
                }
            },
            Ok(Message::Close(_)) => break,
            Err(error) => {
                warn!(connection_id = %connection_id, %error, "websocket error");
                break;
            }
            _ => {
                // Ping/pong/binary frames carry no client events.
            }
        }
    }

    coordinator.disconnect(&connection_id).await;
    let _ = writer_task.await;

    info!(
        connection_id = %connection_id,
        identity_id = %identity_id,
        "websocket handler finished"
    );
}
