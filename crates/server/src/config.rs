// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Configuration for the chat relay server.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "banterd", version, about = "Broadcast chat relay server.")]
pub struct ServerConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "BANTER_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080, env = "BANTER_PORT")]
    pub port: u16,

    /// Log format (json or text).
    #[arg(long, default_value = "text", env = "BANTER_LOG_FORMAT")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "BANTER_LOG_LEVEL")]
    pub log_level: String,
}
