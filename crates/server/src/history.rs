// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only broadcast history, replayed to clients on handshake.
//!
//! Every broadcast event (chat echoes and join/leave notices) is retained for
//! the process lifetime. There is no eviction: unbounded growth is an
//! accepted limitation at this scope.

use crate::wire::Broadcast;

/// In-memory log of everything that has been broadcast.
#[derive(Debug, Default)]
pub struct HistoryLog {
    messages: Vec<Broadcast>,
}

impl HistoryLog {
    pub fn append(&mut self, message: Broadcast) {
        self.messages.push(message);
    }

    /// All retained messages, oldest first. Used verbatim as the
    /// `messageHistory` replay payload.
    pub fn snapshot(&self) -> Vec<Broadcast> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
