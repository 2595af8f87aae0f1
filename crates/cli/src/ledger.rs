// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optimistic message ledger.
//!
//! Locally-authored messages are appended immediately so the transcript feels
//! live, then reconciled against the server's authoritative echo: the echo
//! carries the sender id and the sender's own sequence number (`srvAckMid`),
//! which together locate the pending copy to delete. Every inbound broadcast
//! runs reconcile-then-append, so the sender's echo replaces its placeholder
//! exactly once and a duplicated echo changes nothing.

use banterd::wire::{epoch_ms, random_color, Broadcast, ChatMessage};

/// The rendered transcript plus the local sequence counter.
#[derive(Debug, Default)]
pub struct Ledger {
    entries: Vec<Broadcast>,
    next_mid: u64,
}

impl Ledger {
    pub fn entries(&self) -> &[Broadcast] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of locally-authored entries still awaiting their echo.
    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| is_pending(e)).count()
    }

    /// Author a message: append the pending copy and return it for
    /// transmission. The sequence number comes from a dedicated counter, so
    /// two quick sends before any echo cannot pair with the wrong ack.
    pub fn submit(&mut self, text: &str, cid: Option<u64>, user: &str) -> ChatMessage {
        let mid = self.next_mid;
        self.next_mid += 1;
        let message = ChatMessage {
            cid,
            color: Some(random_color().to_owned()),
            mid: Some(mid),
            rx_date: Some(epoch_ms()),
            srv_ack: false,
            srv_ack_mid: None,
            text: text.to_owned(),
            this_is_me: true,
            kind: Some(1),
            user: Some(user.to_owned()),
        };
        self.entries.push(Broadcast::Chat(message.clone()));
        message
    }

    /// Ingest one authoritative broadcast: delete the pending copy it
    /// acknowledges (if any), then append it — unless an identical ack is
    /// already present, in which case the duplicate is dropped.
    ///
    /// Returns whether the incoming entry was appended.
    pub fn reconcile(&mut self, incoming: Broadcast) -> bool {
        if let Broadcast::Chat(ref chat) = incoming {
            if let (Some(cid), Some(ack)) = (chat.cid, chat.srv_ack_mid) {
                self.entries.retain(|e| {
                    !matches!(e, Broadcast::Chat(p)
                        if !p.srv_ack && p.cid == Some(cid) && p.mid == Some(ack))
                });
                let already_acked = self.entries.iter().any(|e| {
                    matches!(e, Broadcast::Chat(p)
                        if p.srv_ack && p.cid == Some(cid) && p.srv_ack_mid == Some(ack))
                });
                if already_acked {
                    return false;
                }
            }
        }
        self.entries.push(incoming);
        true
    }

    /// Install a history snapshot (handshake replay). Acknowledged entries
    /// are replaced wholesale by the server's view; pending local entries are
    /// kept — they are never resent, but they stay rendered.
    pub fn replay(&mut self, history: Vec<Broadcast>) {
        let pending: Vec<Broadcast> =
            self.entries.drain(..).filter(|e| is_pending(e)).collect();
        self.entries = history;
        self.entries.extend(pending);
    }
}

fn is_pending(entry: &Broadcast) -> bool {
    matches!(entry, Broadcast::Chat(c) if !c.srv_ack)
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
