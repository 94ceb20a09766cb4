//! Transport Gateway
//!
//! Long-lived WebSocket connections carrying the JSON wire protocol. The
//! bearer token is validated before the upgrade; the resulting identity is
//! bound to the connection for its whole life. Each connection gets a
//! bounded egress queue drained by its own forwarder task, so the hub
//! never blocks on a slow client — an overflowing queue force-closes the
//! connection instead.

pub mod proto;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::AppState;
use crate::auth::{self, Identity};
use crate::hub::error::HubError;
use crate::ws::proto::{ClientEvent, ServerEvent};

/// WebSocket connection query params.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT access token for authentication
    pub token: String,
}

/// WebSocket upgrade handler.
pub async fn handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Response {
    // Validate the token before the upgrade
    let identity = match auth::resolve_identity(&query.token, &state.config.jwt_secret) {
        Ok(identity) => identity,
        Err(_) => {
            return Response::builder()
                .status(401)
                .body("Invalid token".into())
                .unwrap();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

/// Handle one WebSocket connection from registration to disconnect.
async fn handle_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let conn_id = Uuid::now_v7();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(state.config.send_queue_depth);
    let shutdown = CancellationToken::new();

    // Registration delivers `ready` before any inbound frame is processed.
    let conn = state.hub.connect(conn_id, identity, tx, shutdown.clone());
    info!(conn_id = %conn_id, user_id = %conn.user_id(), "WebSocket connected");

    // Forward queued events to the socket in order.
    let sender_handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let msg = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize event: {}", e);
                    continue;
                }
            };

            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                warn!(conn_id = %conn_id, "Connection force-closed");
                break;
            }
            msg = ws_receiver.next() => {
                let Some(msg) = msg else { break };
                match msg {
                    Ok(Message::Text(text)) => {
                        if text.len() > state.config.max_frame_bytes {
                            conn.send(
                                HubError::PayloadTooLarge {
                                    size: text.len(),
                                    cap: state.config.max_frame_bytes,
                                }
                                .to_event(),
                            );
                            continue;
                        }

                        match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => state.hub.dispatch(&conn, event).await,
                            Err(e) => {
                                debug!(conn_id = %conn_id, error = %e, "Unparseable frame");
                                conn.send(ServerEvent::Error {
                                    code: "INVALID_EVENT".to_string(),
                                    message: format!("Unrecognized event: {e}"),
                                });
                            }
                        }
                    }
                    Ok(Message::Ping(_)) => {
                        // Axum replies with a pong automatically
                        debug!(conn_id = %conn_id, "Received ping");
                    }
                    Ok(Message::Close(_)) => {
                        info!(conn_id = %conn_id, "WebSocket closed");
                        break;
                    }
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // Disconnect is delivered to the hub exactly once per connection.
    state.hub.disconnect(conn_id).await;
    sender_handle.abort();

    info!(conn_id = %conn_id, "WebSocket disconnected");
}
