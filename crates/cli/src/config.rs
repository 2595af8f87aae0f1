// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

/// Configuration for the chat client.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "banter", version, about = "Broadcast chat client.")]
pub struct ClientConfig {
    /// WebSocket URL of the chat server.
    #[arg(env = "BANTER_URL", default_value = "ws://127.0.0.1:8080/ws")]
    pub url: String,

    /// Display name shown on authored messages (default: the assigned
    /// player handle).
    #[arg(long, env = "BANTER_NAME")]
    pub name: Option<String>,

    /// Path of the persisted identity file.
    #[arg(long, env = "BANTER_COOKIE_FILE")]
    pub cookie_file: Option<PathBuf>,

    /// Maximum reconnection attempts (0 = retry forever).
    #[arg(long, default_value_t = 0)]
    pub max_reconnects: u32,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "BANTER_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,
}

impl ClientConfig {
    /// Resolve the identity file path: the explicit flag, or
    /// `$HOME/.banter/cid.json`, or a relative fallback without a home.
    pub fn cookie_path(&self) -> PathBuf {
        if let Some(ref path) = self.cookie_file {
            return path.clone();
        }
        match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(".banter").join("cid.json"),
            None => PathBuf::from(".banter").join("cid.json"),
        }
    }
}
