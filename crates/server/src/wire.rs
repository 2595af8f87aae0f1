// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire frame types for the chat protocol.
//!
//! Every WebSocket frame is one JSON object. Inbound client frames are
//! classified into an explicit [`ClientFrame`] variant at the parse boundary
//! (handshake markers are literal `true` booleans on the wire, so untagged
//! deserialization with a strict-`true` check recovers the variant). Anything
//! that is not a handshake frame is a chat message, whatever fields it has.

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Inbound client frame, classified by handshake markers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ClientFrame {
    Init(InitFrame),
    Resume(ResumeFrame),
    Chat(ChatMessage),
}

impl ClientFrame {
    /// Parse one inbound text frame. Errors on anything that is not a JSON
    /// object (a bare string or array has no chat fields to salvage).
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// `{"clientInit": true}` — a client with no previously-issued identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitFrame {
    #[serde(rename = "clientInit", deserialize_with = "literal_true")]
    pub client_init: bool,
}

/// `{"cid": N, "haveCookieCid": true}` — a client presenting a
/// previously-issued identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeFrame {
    pub cid: u64,
    #[serde(rename = "haveCookieCid", deserialize_with = "literal_true")]
    pub have_cookie_cid: bool,
}

// ---------------------------------------------------------------------------
// Chat messages and system notices (broadcast + history entries)
// ---------------------------------------------------------------------------

/// A chat message. Sent by clients as an optimistic pending entry
/// (`srvAck: false`, `mid` set) and echoed back by the server with the
/// acknowledgment stamps (`rxDate`, `srvAckMid`, `srvAck: true`, rewritten
/// `user`). All base fields are optional on inbound frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Sender-assigned sequence number, used only to pair the server echo
    /// with the sender's pending copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx_date: Option<u64>,
    #[serde(default)]
    pub srv_ack: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srv_ack_mid: Option<u64>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub this_is_me: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// A server-authored notice (join/leave). `cid` is absent when the
/// connection never completed a handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemNotice {
    pub system_message: bool,
    pub rx_date: u64,
    pub srv_ack: bool,
    pub user: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub user_joined: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub user_left: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<u64>,
    pub scid: u64,
}

/// One broadcast event: either a chat echo or a system notice. This is the
/// shape stored in the history log and replayed in `messageHistory`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Broadcast {
    System(SystemNotice),
    Chat(ChatMessage),
}

// ---------------------------------------------------------------------------
// Server -> Client (direct sends, never stored in history)
// ---------------------------------------------------------------------------

/// Identity assignment, sent to a freshly-initialized client alone. Carries
/// the issued `cidOption` and the full history snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityAssign {
    pub system_message: bool,
    pub rx_date: u64,
    pub cid_response: bool,
    pub cid_option: u64,
    pub server: String,
    pub text: String,
    pub scid: u64,
    pub user: String,
    pub srv_ack: bool,
    pub color: String,
    pub message_history: Vec<Broadcast>,
}

/// Welcome frame sent on connection establishment, before any inbound frame
/// is read. Carries the full history snapshot for replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeReplay {
    pub system_message: bool,
    pub rx_date: u64,
    pub text: String,
    pub user: String,
    pub srv_ack: bool,
    pub init_message: bool,
    pub scid: u64,
    pub message_history: Vec<Broadcast>,
}

/// Inbound server frame as seen by a client, classified by field presence.
/// Variant order matters: assign and welcome frames would also satisfy the
/// plain notice shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Assign(IdentityAssign),
    Welcome(WelcomeReplay),
    Notice(SystemNotice),
    Chat(ChatMessage),
}

impl ServerFrame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Text color palette, keyed by tag 1..=5.
pub const TEXT_COLORS: [&str; 5] = ["#FF0000", "#008000", "#0000FF", "#800080", "#800000"];

/// Pick a random palette color.
pub fn random_color() -> &'static str {
    use rand::Rng;
    let idx = rand::rng().random_range(0..TEXT_COLORS.len());
    TEXT_COLORS[idx]
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Accept only a literal JSON `true`. A `false` marker demotes the frame to
/// the next untagged variant, mirroring the strict `=== true` check on the
/// original wire.
fn literal_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    if bool::deserialize(deserializer)? {
        Ok(true)
    } else {
        Err(serde::de::Error::custom("expected literal true"))
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
