// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Banterd: broadcast chat relay.
//!
//! A single hub task owns all chat state (identities, connected users,
//! history); WebSocket connections feed it through one serialized event
//! queue. Nothing is persisted — clients carry their identity across
//! reconnects and the history lives for the process lifetime only.

pub mod config;
pub mod error;
pub mod history;
pub mod hub;
pub mod ident;
pub mod registry;
pub mod transport;
pub mod wire;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::hub::Hub;
use crate::transport::AppState;

/// Server display name, used as the `user` of welcome and assignment frames.
pub fn server_name() -> String {
    format!("{}_server_{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Run the relay until SIGINT/SIGTERM.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());
    tracing::info!(%addr, "{} listening", server_name());
    serve(listener, shutdown).await
}

/// Serve on an already-bound listener until `shutdown` fires. Split out from
/// [`run`] so tests can bind an ephemeral port first.
pub async fn serve(listener: TcpListener, shutdown: CancellationToken) -> anyhow::Result<()> {
    let hub = Hub::spawn(server_name(), shutdown.clone());
    let state = Arc::new(AppState { hub });
    let router = transport::build_router(state);
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;
    Ok(())
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                tracing::info!("received SIGTERM");
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                tracing::info!("received SIGINT");
            }
        }
        shutdown.cancel();
    });
}
