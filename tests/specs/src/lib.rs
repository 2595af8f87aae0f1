// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for end-to-end tests: an in-process relay on an ephemeral
//! port, plus raw WebSocket clients for driving the wire protocol directly.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

pub const TIMEOUT: Duration = Duration::from_secs(10);

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// An in-process relay server bound to an ephemeral port.
pub struct ChatServer {
    pub addr: SocketAddr,
    shutdown: CancellationToken,
}

impl ChatServer {
    pub async fn start() -> anyhow::Result<Self> {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = banterd::serve(listener, token).await {
                eprintln!("server error: {e:#}");
            }
        });
        Ok(Self { addr, shutdown })
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Open a raw WebSocket connection to the relay.
    pub async fn connect(&self) -> anyhow::Result<WsStream> {
        let (stream, _response) = tokio_tungstenite::connect_async(self.ws_url()).await?;
        Ok(stream)
    }
}

impl Drop for ChatServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Receive the next text frame as JSON, skipping pings, within [`TIMEOUT`].
pub async fn recv_json(ws: &mut WsStream) -> anyhow::Result<serde_json::Value> {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        let remaining = deadline
            .checked_duration_since(tokio::time::Instant::now())
            .ok_or_else(|| anyhow::anyhow!("timed out waiting for a frame"))?;
        let msg = tokio::time::timeout(remaining, ws.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("connection closed"))?;
        match msg? {
            Message::Text(text) => return Ok(serde_json::from_str(&text)?),
            Message::Close(_) => anyhow::bail!("connection closed"),
            _ => continue,
        }
    }
}

/// Send one JSON value as a text frame.
pub async fn send_json(ws: &mut WsStream, value: &serde_json::Value) -> anyhow::Result<()> {
    send_text(ws, &value.to_string()).await
}

/// Send an already-serialized frame.
pub async fn send_text(ws: &mut WsStream, text: &str) -> anyhow::Result<()> {
    ws.send(Message::Text(text.to_owned().into())).await?;
    Ok(())
}
