// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connected-user registry.
//!
//! Tracks every client whose handshake has completed. Entries are created by
//! the hub on registration and destroyed when the connection closes; the hub
//! task is the sole mutator, so no locking is involved. Each entry owns the
//! outbound channel for its connection for the entry's lifetime.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::RegistryError;

/// Outbound frame channel for one connection. Sends are fire-and-forget: a
/// backed-up or dead recipient drops frames instead of blocking the hub.
pub type Outbound = mpsc::UnboundedSender<String>;

/// One registered participant: stable identity plus the live session.
#[derive(Debug)]
pub struct ConnectedUser {
    pub cid: u64,
    pub scid: u64,
    pub name: String,
    pub joined_at_ms: u64,
    pub out: Outbound,
}

/// Presence snapshot entry, safe to hand to display layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub name: String,
    pub joined_at_ms: u64,
}

/// The set of currently-connected, handshake-completed users.
#[derive(Debug, Default)]
pub struct Registry {
    users: Vec<ConnectedUser>,
}

impl Registry {
    /// Register a user under `cid` for session `scid`.
    ///
    /// A duplicate session id is a caller bug and is rejected. A duplicate
    /// client id across different sessions (stale identity reused in two
    /// tabs) is tolerated with a warning; both sessions stay registered.
    pub fn register(
        &mut self,
        cid: u64,
        scid: u64,
        name: String,
        joined_at_ms: u64,
        out: Outbound,
    ) -> Result<(), RegistryError> {
        if self.users.iter().any(|u| u.scid == scid) {
            return Err(RegistryError::DuplicateSession);
        }
        if self.users.iter().any(|u| u.cid == cid) {
            tracing::warn!(cid, scid, "client id already registered under another session");
        }
        self.users.push(ConnectedUser { cid, scid, name, joined_at_ms, out });
        Ok(())
    }

    /// Remove the entry for `scid`. A missing session id is rejected; an
    /// unknown one is a log-only no-op.
    pub fn unregister(&mut self, scid: Option<u64>) -> Result<(), RegistryError> {
        let Some(scid) = scid else {
            return Err(RegistryError::InvalidSession);
        };
        let before = self.users.len();
        self.users.retain(|u| u.scid != scid);
        if self.users.len() == before {
            tracing::debug!(scid, "unregister: no such session");
        }
        Ok(())
    }

    /// Presence snapshot for display.
    pub fn list_public(&self) -> Vec<PublicUser> {
        self.users
            .iter()
            .map(|u| PublicUser { name: u.name.clone(), joined_at_ms: u.joined_at_ms })
            .collect()
    }

    pub fn find_by_session(&self, scid: u64) -> Option<&ConnectedUser> {
        self.users.iter().find(|u| u.scid == scid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectedUser> {
        self.users.iter()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
