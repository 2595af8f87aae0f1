// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive terminal chat client. Lines typed on stdin are sent as chat;
//! the transcript is printed to stdout. This is the thinnest possible
//! rendering layer over the session/ledger machinery in the library.

use std::io::BufRead;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::error;

use banter::config::ClientConfig;
use banter::session::TranscriptChange;
use banterd::wire::Broadcast;

#[tokio::main]
async fn main() {
    let config = ClientConfig::parse();
    init_tracing(&config);

    // Input: a blocking thread reads stdin lines for the connection pump.
    let (line_tx, line_rx) = mpsc::channel::<String>(64);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    // Rendering: print transcript changes as they arrive.
    let (render_tx, mut render_rx) = mpsc::unbounded_channel::<TranscriptChange>();
    tokio::spawn(async move {
        while let Some(change) = render_rx.recv().await {
            match change {
                TranscriptChange::Reset(entries) => {
                    for entry in &entries {
                        println!("{}", render_line(entry));
                    }
                }
                TranscriptChange::Append(entry) => println!("{}", render_line(&entry)),
            }
        }
    });

    if let Err(e) = banter::client::run(config, line_rx, render_tx).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

fn render_line(entry: &Broadcast) -> String {
    match entry {
        Broadcast::System(notice) => format!("* {} {}", notice.user, notice.text),
        Broadcast::Chat(chat) => {
            let user = chat.user.as_deref().unwrap_or("?");
            if chat.srv_ack {
                format!("{user}: {}", chat.text)
            } else {
                format!("{user}: {} (sending)", chat.text)
            }
        }
    }
}

fn init_tracing(config: &ClientConfig) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    // Logs go to stderr so the transcript on stdout stays clean.
    fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
