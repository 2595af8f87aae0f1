// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the chat relay.
//!
//! The WebSocket handler owns no chat state: it forwards inbound text frames
//! into the hub queue and drains the connection's outbound channel into the
//! socket. All protocol decisions happen in the hub.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tower_http::cors::CorsLayer;

use crate::hub::{HubEvent, HubHandle};

/// Shared transport state.
pub struct AppState {
    pub hub: HubHandle,
}

/// Build the axum `Router` with all relay routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/users", get(list_users))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    users: usize,
}

/// `GET /api/v1/health`
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let users = state.hub.list_users().await;
    Json(HealthResponse { status: "running".to_owned(), users: users.len() })
}

/// `GET /api/v1/users` — presence snapshot for display layers.
async fn list_users(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.hub.list_users().await)
}

/// `GET /ws` — WebSocket upgrade for chat participants.
async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

/// Per-connection socket pump.
async fn handle_socket(state: Arc<AppState>, socket: WebSocket) {
    let (out, mut out_rx) = mpsc::unbounded_channel::<String>();
    let (ack, ack_rx) = oneshot::channel();
    state.hub.send(HubEvent::Connected { out, ack });
    let Ok(scid) = ack_rx.await else {
        // Hub is shutting down; nothing to pump.
        return;
    };

    let (mut ws_tx, mut ws_rx) = socket.split();
    loop {
        tokio::select! {
            frame = out_rx.recv() => {
                match frame {
                    Some(text) => {
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        state.hub.send(HubEvent::Inbound { scid, text: text.to_string() });
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(scid, err = %e, "socket read error");
                        break;
                    }
                    _ => {} // ping/pong/binary ignored
                }
            }
        }
    }

    // Graceful and abrupt closure are treated identically.
    state.hub.send(HubEvent::Closed { scid });
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
