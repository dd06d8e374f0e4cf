//! WebSocket transport adapter.
//!
//! The thin layer between the duplex socket and the transport-agnostic core:
//! upgrade → register a connection → forward outbound frames and heartbeat
//! pings → feed inbound text through the frame dispatcher → unregister on
//! disconnect.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use relay_core::frames::Frame;

use crate::dispatch;
use crate::rpc::context::OpContext;
use crate::server::AppState;

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_connection(socket, app))
}

/// Run one WebSocket connection from upgrade through disconnect.
#[instrument(skip_all)]
pub async fn run_connection(ws: WebSocket, app: AppState) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Frame>(app.state.config.outbound_queue_size);
    let connection = match app.connections.register(send_tx) {
        Ok(connection) => connection,
        Err(e) => {
            warn!(error = %e, "rejecting connection");
            let _ = ws_tx.send(Message::Close(None)).await;
            return;
        }
    };
    let connection_id = connection.id().clone();
    info!(connection_id = %connection_id, "client connected");

    let ping_interval = Duration::from_secs(app.state.config.heartbeat_interval_secs);
    let pong_timeout = Duration::from_secs(app.state.config.heartbeat_timeout_secs);

    // Outbound forwarder with periodic Ping frames.
    let outbound_conn = connection.clone();
    let outbound = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_interval);
        // Skip the immediate first tick
        let _ = ping.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    match frame {
                        Some(frame) => match serde_json::to_string(&frame) {
                            Ok(json) => {
                                if ws_tx.send(Message::Text(json.into())).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "failed to serialize outbound frame");
                            }
                        },
                        None => break,
                    }
                }
                _ = ping.tick() => {
                    // Check if the client responded since the last cycle
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > pong_timeout
                    {
                        warn!("client unresponsive for {pong_timeout:?}, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Inbound loop: every text frame goes through the dispatcher; it never
    // blocks on a handler.
    let ctx = OpContext {
        state: app.state.clone(),
        connection: connection.clone(),
    };
    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            Message::Text(text) => {
                connection.mark_alive();
                dispatch::handle_text(&text, &app.registry, &ctx);
            }
            Message::Binary(data) => {
                connection.mark_alive();
                match std::str::from_utf8(&data) {
                    Ok(text) => dispatch::handle_text(text, &app.registry, &ctx),
                    Err(_) => {
                        info!(len = data.len(), "non-UTF8 binary frame dropped");
                    }
                }
            }
            Message::Ping(_) | Message::Pong(_) => connection.mark_alive(),
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
        }
    }

    info!(connection_id = %connection_id, dropped = connection.drop_count(), "client disconnected");
    outbound.abort();
    let _ = app.connections.unregister(&connection_id);
}
