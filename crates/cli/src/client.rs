// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection lifecycle: connect, pump, detect loss, reconnect.
//!
//! One WebSocket connection is held at a time. Any closure — read error,
//! close frame, failed send — flags the loss and re-enters the connect loop
//! with capped exponential backoff. Each new connection restarts the
//! handshake from scratch (the persisted identity is re-read); pending
//! unacknowledged messages are not resent. A send attempted while the
//! transport is down is dropped with an error, never queued.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::config::ClientConfig;
use crate::cookie::CookieStore;
use crate::session::{Outcome, Session, TranscriptChange};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Why one connection's pump ended.
enum ConnEnd {
    /// The socket closed or a send failed; reconnect.
    SocketLost,
    /// The input channel closed; the client is done.
    InputClosed,
}

/// Run the chat client until the input channel closes or reconnects are
/// exhausted. Transcript changes are pushed to `render`; the rendering layer
/// lives on the other end of that channel.
pub async fn run(
    config: ClientConfig,
    mut input: mpsc::Receiver<String>,
    render: mpsc::UnboundedSender<TranscriptChange>,
) -> anyhow::Result<()> {
    let cookie = CookieStore::new(config.cookie_path());
    let mut session = Session::new(cookie, config.name.clone());

    let mut attempt: u32 = 0;
    loop {
        match tokio_tungstenite::connect_async(&config.url).await {
            Ok((stream, _response)) => {
                attempt = 0;
                tracing::info!(url = %config.url, "connected");
                session.begin_connection();
                match run_connection(stream, &mut session, &mut input, &render).await {
                    ConnEnd::InputClosed => return Ok(()),
                    ConnEnd::SocketLost => tracing::warn!("connection lost"),
                }
            }
            Err(e) => tracing::warn!(url = %config.url, err = %e, "connect failed"),
        }

        attempt += 1;
        if config.max_reconnects > 0 && attempt > config.max_reconnects {
            anyhow::bail!("max reconnects reached, giving up");
        }
        let backoff = reconnect_backoff(attempt);
        tracing::info!(attempt, "reconnecting in {:?}", backoff);
        tokio::time::sleep(backoff).await;
    }
}

/// Pump one live connection until it drops or input ends.
async fn run_connection(
    stream: WsStream,
    session: &mut Session,
    input: &mut mpsc::Receiver<String>,
    render: &mpsc::UnboundedSender<TranscriptChange>,
) -> ConnEnd {
    let (mut ws_tx, mut ws_rx) = stream.split();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text.to_string(),
                    Some(Ok(Message::Close(_))) | None => return ConnEnd::SocketLost,
                    Some(Err(e)) => {
                        tracing::debug!(err = %e, "socket read error");
                        return ConnEnd::SocketLost;
                    }
                    _ => continue, // ping/pong/binary ignored
                };
                let outcome = session.handle_text(&text);
                if flush(&mut ws_tx, outcome, render).await.is_err() {
                    return ConnEnd::SocketLost;
                }
            }
            line = input.recv() => {
                let Some(line) = line else { return ConnEnd::InputClosed };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let Some((json, entry)) = session.submit(trimmed) else { continue };
                let _ = render.send(TranscriptChange::Append(entry));
                if ws_tx.send(Message::Text(json.into())).await.is_err() {
                    // Dropped, not queued; the reconnect loop takes over.
                    tracing::error!("send failed, message dropped");
                    return ConnEnd::SocketLost;
                }
            }
        }
    }
}

/// Transmit a frame-handling outcome: outbound frames to the socket,
/// transcript changes to the renderer.
async fn flush<S>(
    ws_tx: &mut S,
    outcome: Outcome,
    render: &mpsc::UnboundedSender<TranscriptChange>,
) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    for change in outcome.changes {
        let _ = render.send(change);
    }
    for json in outcome.outbound {
        if ws_tx.send(Message::Text(json.into())).await.is_err() {
            tracing::error!("send failed, frame dropped");
            return Err(());
        }
    }
    Ok(())
}

/// Exponential backoff, 200ms doubling to a 5s cap.
fn reconnect_backoff(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(10);
    let ms = (100u64.saturating_mul(2u64.saturating_pow(exp + 1))).min(5000);
    Duration::from_millis(ms)
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
