// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client session state machine.
//!
//! Pure logic over inbound server frames: each frame produces zero or more
//! outbound frames (already serialized) and zero or more transcript changes.
//! The connection pump in `client.rs` does the socket I/O; the rendering
//! layer consumes [`TranscriptChange`]s over whatever channel the caller
//! wires up.
//!
//! Per inbound frame, in order:
//! 1. An identity assignment persists the issued id and replays the bundled
//!    history.
//! 2. Otherwise, with no persisted identity yet, the frame only triggers a
//!    `clientInit` request; processing stops until the server replies.
//! 3. Otherwise a welcome replay installs the history and announces the held
//!    identity (once per connection); anything else is reconciled into the
//!    ledger and appended.

use banterd::wire::{Broadcast, InitFrame, ResumeFrame, ServerFrame, SystemNotice};

use crate::cookie::CookieStore;
use crate::ledger::Ledger;

/// One visible transcript mutation.
#[derive(Debug, Clone)]
pub enum TranscriptChange {
    /// The whole transcript was replaced by a history replay.
    Reset(Vec<Broadcast>),
    /// One entry was appended (possibly replacing a pending copy).
    Append(Broadcast),
}

/// What one inbound frame produced.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Serialized frames to transmit, in order.
    pub outbound: Vec<String>,
    pub changes: Vec<TranscriptChange>,
}

/// Client-side session state: identity resolution plus the ledger.
#[derive(Debug)]
pub struct Session {
    cookie: CookieStore,
    ledger: Ledger,
    client_id: Option<u64>,
    display_name: Option<String>,
    /// Whether `haveCookieCid` was announced on the current connection.
    announced: bool,
}

impl Session {
    pub fn new(cookie: CookieStore, display_name: Option<String>) -> Self {
        let client_id = cookie.load();
        Self { cookie, ledger: Ledger::default(), client_id, display_name, announced: false }
    }

    /// Reset per-connection handshake state. Called on every (re)connect;
    /// the persisted identity is re-read, the transcript is kept.
    pub fn begin_connection(&mut self) {
        self.client_id = self.cookie.load();
        self.announced = false;
    }

    pub fn client_id(&self) -> Option<u64> {
        self.client_id
    }

    pub fn transcript(&self) -> &[Broadcast] {
        self.ledger.entries()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Display name for authored messages: the configured name, or the
    /// assigned player handle.
    fn user_name(&self) -> String {
        match (&self.display_name, self.client_id) {
            (Some(name), _) => name.clone(),
            (None, Some(cid)) => format!("Player #{cid}"),
            (None, None) => "Player #?".to_owned(),
        }
    }

    /// Parse and process one inbound text frame.
    pub fn handle_text(&mut self, text: &str) -> Outcome {
        match ServerFrame::parse(text) {
            Ok(frame) => self.handle_frame(frame),
            Err(e) => {
                tracing::warn!(err = %e, "dropping unparseable server frame");
                Outcome::default()
            }
        }
    }

    /// Process one classified inbound frame.
    pub fn handle_frame(&mut self, frame: ServerFrame) -> Outcome {
        let mut outcome = Outcome::default();
        match frame {
            ServerFrame::Assign(assign) => {
                if let Err(e) = self.cookie.save(assign.cid_option) {
                    tracing::warn!(err = %e, "failed to persist assigned identity");
                }
                self.client_id = Some(assign.cid_option);
                self.ledger.replay(assign.message_history);
                outcome.changes.push(TranscriptChange::Reset(self.ledger.entries().to_vec()));
                let notice = SystemNotice {
                    system_message: true,
                    rx_date: assign.rx_date,
                    srv_ack: true,
                    user: assign.user,
                    text: assign.text,
                    user_joined: false,
                    user_left: false,
                    cid: None,
                    scid: assign.scid,
                };
                self.ingest(Broadcast::System(notice), &mut outcome);
                tracing::info!(cid = assign.cid_option, "identity assigned");
            }
            _ if self.client_id.is_none() => {
                // No identity yet: request one and defer to the reply.
                push_frame(&mut outcome.outbound, &InitFrame { client_init: true });
            }
            ServerFrame::Welcome(welcome) => {
                let cid = self.client_id.unwrap_or_default();
                self.ledger.replay(welcome.message_history);
                outcome.changes.push(TranscriptChange::Reset(self.ledger.entries().to_vec()));
                if !self.announced {
                    push_frame(
                        &mut outcome.outbound,
                        &ResumeFrame { cid, have_cookie_cid: true },
                    );
                    self.announced = true;
                }
                let notice = SystemNotice {
                    system_message: true,
                    rx_date: welcome.rx_date,
                    srv_ack: true,
                    user: welcome.user,
                    text: format!("{}Player {cid}", welcome.text),
                    user_joined: false,
                    user_left: false,
                    cid: None,
                    scid: welcome.scid,
                };
                self.ingest(Broadcast::System(notice), &mut outcome);
            }
            ServerFrame::Notice(notice) => self.ingest(Broadcast::System(notice), &mut outcome),
            ServerFrame::Chat(chat) => self.ingest(Broadcast::Chat(chat), &mut outcome),
        }
        outcome
    }

    /// Author a message: optimistic append plus the serialized frame to
    /// transmit. Empty submissions are ignored.
    pub fn submit(&mut self, text: &str) -> Option<(String, Broadcast)> {
        if text.is_empty() {
            return None;
        }
        let message = self.ledger.submit(text, self.client_id, &self.user_name());
        let json = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(err = %e, "failed to serialize chat message");
                return None;
            }
        };
        Some((json, Broadcast::Chat(message)))
    }

    fn ingest(&mut self, incoming: Broadcast, outcome: &mut Outcome) {
        if self.ledger.reconcile(incoming.clone()) {
            outcome.changes.push(TranscriptChange::Append(incoming));
        }
    }
}

fn push_frame<T: serde::Serialize>(outbound: &mut Vec<String>, frame: &T) {
    match serde_json::to_string(frame) {
        Ok(json) => outbound.push(json),
        Err(e) => tracing::error!(err = %e, "failed to serialize outbound frame"),
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
