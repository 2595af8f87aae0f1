// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable client identity: the one persisted value.
//!
//! The server-issued `cid` is stored as a small JSON file, read on every
//! connection attempt and overwritten whenever a fresh identity is assigned.
//! Writes are atomic (unique tmp + rename) so a crash mid-save never leaves a
//! torn file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CookieFile {
    cid: u64,
}

/// File-backed store for the persisted client identity.
#[derive(Debug, Clone)]
pub struct CookieStore {
    path: PathBuf,
}

impl CookieStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read the persisted identity. A missing or unreadable file means no
    /// identity; the client will request a fresh one.
    pub fn load(&self) -> Option<u64> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<CookieFile>(&contents) {
            Ok(cookie) => Some(cookie.cid),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), err = %e, "ignoring unreadable identity file");
                None
            }
        }
    }

    /// Persist a newly-assigned identity, replacing any previous one.
    pub fn save(&self, cid: u64) -> anyhow::Result<()> {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&CookieFile { cid })?;
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!(
            "{}.{}.{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
            seq,
        );
        let tmp_path = self.path.with_file_name(tmp_name);
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "cookie_tests.rs"]
mod tests;
