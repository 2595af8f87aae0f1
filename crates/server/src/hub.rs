// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The broadcast hub — the single owner of all chat state.
//!
//! One task owns the id allocators, the connected-user registry, the history
//! log, and the per-connection table. Every socket event (connect, inbound
//! frame, close) is funneled into one queue and processed strictly in arrival
//! order; the fan-out for an event completes before the next event is
//! dequeued, so every recipient observes cross-sender events in the same
//! relative order. No locks anywhere: the hub is the only writer.
//!
//! Each connection moves through two phases. A fresh connection is
//! `AwaitingInit` until it presents a handshake frame (`clientInit` or
//! `haveCookieCid`); everything else it sends is still accepted and broadcast
//! as chat from an unidentified sender. After a handshake the connection is
//! `Active` and carries its client id.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::history::HistoryLog;
use crate::ident::IdentAllocator;
use crate::registry::{Outbound, PublicUser, Registry};
use crate::wire::{
    epoch_ms, random_color, Broadcast, ChatMessage, ClientFrame, IdentityAssign, SystemNotice,
    WelcomeReplay,
};

/// Events funneled into the hub's single queue.
#[derive(Debug)]
pub enum HubEvent {
    /// A socket finished the WebSocket upgrade. The hub allocates the session
    /// id (replied on `ack`) and immediately sends the welcome replay.
    Connected { out: Outbound, ack: oneshot::Sender<u64> },
    /// One inbound text frame from session `scid`.
    Inbound { scid: u64, text: String },
    /// The socket for session `scid` closed (graceful or abrupt — no
    /// distinction).
    Closed { scid: u64 },
    /// Presence snapshot request.
    ListUsers { reply: oneshot::Sender<Vec<PublicUser>> },
}

/// Cloneable handle for feeding events to the hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubEvent>,
}

impl HubHandle {
    pub fn send(&self, event: HubEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("hub is gone, event dropped");
        }
    }

    /// Fetch the presence snapshot. Empty if the hub has shut down.
    pub async fn list_users(&self) -> Vec<PublicUser> {
        let (reply, rx) = oneshot::channel();
        self.send(HubEvent::ListUsers { reply });
        rx.await.unwrap_or_default()
    }
}

/// Which recipients to leave out of a broadcast.
enum Skip {
    /// Every session registered under this client id (join notices exclude
    /// the subject, even a stale twin tab).
    Cid(u64),
    /// One specific session (leave notices exclude the closing connection).
    Session(u64),
}

enum Phase {
    AwaitingInit,
    Active { cid: u64 },
}

struct Connection {
    out: Outbound,
    phase: Phase,
}

/// The hub state machine. Construct with [`Hub::spawn`].
pub struct Hub {
    events: mpsc::UnboundedReceiver<HubEvent>,
    shutdown: CancellationToken,
    ids: IdentAllocator,
    registry: Registry,
    history: HistoryLog,
    connections: HashMap<u64, Connection>,
    server_name: String,
}

impl Hub {
    /// Spawn the hub task and return the handle for feeding it events.
    pub fn spawn(server_name: String, shutdown: CancellationToken) -> HubHandle {
        let (tx, events) = mpsc::unbounded_channel();
        let hub = Hub {
            events,
            shutdown,
            ids: IdentAllocator::default(),
            registry: Registry::default(),
            history: HistoryLog::default(),
            connections: HashMap::new(),
            server_name,
        };
        tokio::spawn(hub.run());
        HubHandle { tx }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
            }
        }
        tracing::debug!("hub stopped");
    }

    fn handle_event(&mut self, event: HubEvent) {
        match event {
            HubEvent::Connected { out, ack } => self.on_connected(out, ack),
            HubEvent::Inbound { scid, text } => self.on_inbound(scid, &text),
            HubEvent::Closed { scid } => self.on_closed(scid),
            HubEvent::ListUsers { reply } => {
                let _ = reply.send(self.registry.list_public());
            }
        }
    }

    /// New connection: allocate the session id and send the welcome replay
    /// before any inbound frame is processed.
    fn on_connected(&mut self, out: Outbound, ack: oneshot::Sender<u64>) {
        let scid = self.ids.next_session_id();
        let welcome = WelcomeReplay {
            system_message: true,
            rx_date: epoch_ms(),
            text: "Welcome back ".to_owned(),
            user: self.server_name.clone(),
            srv_ack: true,
            init_message: true,
            scid,
            message_history: self.history.snapshot(),
        };
        send_frame(&out, &welcome);
        self.connections.insert(scid, Connection { out, phase: Phase::AwaitingInit });
        let _ = ack.send(scid);
        tracing::debug!(scid, "connection established");
    }

    fn on_inbound(&mut self, scid: u64, text: &str) {
        let frame = match ClientFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                // Unparseable frames are dropped; the connection stays open.
                tracing::warn!(scid, err = %e, "dropping unparseable frame");
                return;
            }
        };
        match frame {
            ClientFrame::Init(_) => self.on_client_init(scid),
            ClientFrame::Resume(resume) => self.on_resume(scid, resume.cid),
            ClientFrame::Chat(chat) => self.on_chat(scid, chat),
        }
    }

    /// `clientInit`: issue a fresh identity, register, reply with the
    /// assignment (history snapshot taken before the join notice so the new
    /// client never sees its own join), then announce the join to the others.
    fn on_client_init(&mut self, scid: u64) {
        let Some(conn) = self.connections.get(&scid) else {
            tracing::warn!(scid, "init from unknown session");
            return;
        };
        let cid = self.ids.next_client_id();
        let name = format!("User #{cid}");
        let now = epoch_ms();
        if let Err(e) = self.registry.register(cid, scid, name.clone(), now, conn.out.clone()) {
            tracing::error!(scid, cid, err = %e, "registration failed");
            return;
        }
        let assign = IdentityAssign {
            system_message: true,
            rx_date: now,
            cid_response: true,
            cid_option: cid,
            server: self.server_name.clone(),
            text: format!("Welcome! You got the name: Player {cid}"),
            scid,
            user: self.server_name.clone(),
            srv_ack: true,
            color: random_color().to_owned(),
            message_history: self.history.snapshot(),
        };
        send_frame(&conn.out, &assign);
        self.connections.entry(scid).and_modify(|c| c.phase = Phase::Active { cid });
        tracing::info!(cid, scid, "new client registered");
        self.announce_join(cid, scid, &name);
    }

    /// `haveCookieCid`: register under the presented identity without
    /// allocating. No fresh assignment is sent. Whether that identity is
    /// already live on another session is not checked.
    fn on_resume(&mut self, scid: u64, cid: u64) {
        let Some(conn) = self.connections.get(&scid) else {
            tracing::warn!(scid, "resume from unknown session");
            return;
        };
        let name = format!("User #{cid}");
        let now = epoch_ms();
        if let Err(e) = self.registry.register(cid, scid, name.clone(), now, conn.out.clone()) {
            tracing::error!(scid, cid, err = %e, "registration failed");
            return;
        }
        self.connections.entry(scid).and_modify(|c| c.phase = Phase::Active { cid });
        tracing::info!(cid, scid, "client resumed with existing identity");
        self.announce_join(cid, scid, &name);
    }

    /// Chat, from any phase: stamp it, rewrite the display name from the
    /// registered identity (or fall back for an unidentified sender), append
    /// to history, and echo to every registered user including the sender —
    /// the echo is what lets the sender reconcile its pending copy.
    fn on_chat(&mut self, scid: u64, mut chat: ChatMessage) {
        let user = match self.connections.get(&scid).map(|c| &c.phase) {
            Some(Phase::Active { cid }) => self
                .registry
                .find_by_session(scid)
                .map(|u| u.name.clone())
                .unwrap_or_else(|| format!("User #{cid}")),
            _ => match chat.cid {
                Some(cid) => format!("User #{cid}"),
                None => "User #?".to_owned(),
            },
        };
        chat.rx_date = Some(epoch_ms());
        chat.srv_ack_mid = chat.mid;
        chat.srv_ack = true;
        chat.user = Some(user);
        self.broadcast(Broadcast::Chat(chat), None);
    }

    /// Connection close, from any phase: announce the leave (identity may be
    /// unset) to the remaining users, then unregister the session.
    fn on_closed(&mut self, scid: u64) {
        let Some(conn) = self.connections.remove(&scid) else {
            tracing::debug!(scid, "close for unknown session");
            return;
        };
        let cid = match conn.phase {
            Phase::Active { cid } => Some(cid),
            Phase::AwaitingInit => None,
        };
        let user = match cid {
            Some(cid) => format!("User #{cid}"),
            None => "User #?".to_owned(),
        };
        let notice = SystemNotice {
            system_message: true,
            rx_date: epoch_ms(),
            srv_ack: true,
            user,
            text: "<Logged out>".to_owned(),
            user_joined: false,
            user_left: true,
            cid,
            scid,
        };
        self.broadcast(Broadcast::System(notice), Some(Skip::Session(scid)));
        if let Err(e) = self.registry.unregister(Some(scid)) {
            tracing::error!(scid, err = %e, "unregister failed");
        }
        tracing::info!(scid, "connection closed");
    }

    fn announce_join(&mut self, cid: u64, scid: u64, name: &str) {
        let notice = SystemNotice {
            system_message: true,
            rx_date: epoch_ms(),
            srv_ack: true,
            user: name.to_owned(),
            text: "<joined the chat>".to_owned(),
            user_joined: true,
            user_left: false,
            cid: Some(cid),
            scid,
        };
        self.broadcast(Broadcast::System(notice), Some(Skip::Cid(cid)));
    }

    /// Append to history and fan out to every registered user except the
    /// skipped subject. Sends are not awaited; a dead recipient just loses
    /// the frame.
    fn broadcast(&mut self, message: Broadcast, skip: Option<Skip>) {
        self.history.append(message.clone());
        let json = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(err = %e, "unserializable broadcast");
                return;
            }
        };
        if self.registry.is_empty() {
            tracing::debug!("no users connected");
        }
        for user in self.registry.iter() {
            let skipped = match skip {
                Some(Skip::Cid(cid)) => user.cid == cid,
                Some(Skip::Session(scid)) => user.scid == scid,
                None => false,
            };
            if skipped {
                tracing::debug!(cid = user.cid, scid = user.scid, "skipping broadcast to subject");
                continue;
            }
            if user.out.send(json.clone()).is_err() {
                tracing::debug!(cid = user.cid, scid = user.scid, "recipient gone, frame dropped");
            }
        }
    }
}

/// Serialize and send one frame to a single connection, fire-and-forget.
fn send_frame<T: serde::Serialize>(out: &Outbound, frame: &T) {
    match serde_json::to_string(frame) {
        Ok(json) => {
            if out.send(json).is_err() {
                tracing::debug!("connection channel closed, frame dropped");
            }
        }
        Err(e) => tracing::error!(err = %e, "failed to serialize frame"),
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
