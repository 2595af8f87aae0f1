// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests that run the real relay in-process and drive it over
//! real WebSocket connections.

use serde_json::json;

use banter::cookie::CookieStore;
use banter::session::Session;
use banter_specs::{recv_json, send_json, send_text, ChatServer};

// -- Handshake ----------------------------------------------------------------

#[tokio::test]
async fn welcome_arrives_before_any_request() -> anyhow::Result<()> {
    let server = ChatServer::start().await?;
    let mut ws = server.connect().await?;

    let welcome = recv_json(&mut ws).await?;
    assert_eq!(welcome["initMessage"], true);
    assert_eq!(welcome["systemMessage"], true);
    assert_eq!(welcome["srvAck"], true);
    assert_eq!(welcome["messageHistory"], json!([]));
    Ok(())
}

#[tokio::test]
async fn fresh_client_receives_first_identity() -> anyhow::Result<()> {
    let server = ChatServer::start().await?;
    let mut ws = server.connect().await?;
    recv_json(&mut ws).await?; // welcome

    send_json(&mut ws, &json!({"clientInit": true})).await?;

    let assign = recv_json(&mut ws).await?;
    assert_eq!(assign["cidResponse"], true);
    assert_eq!(assign["cidOption"], 1);
    assert_eq!(assign["messageHistory"], json!([]));
    assert!(assign["text"].as_str().unwrap_or_default().contains("Player 1"));
    Ok(())
}

#[tokio::test]
async fn resume_keeps_identity_and_notifies_others() -> anyhow::Result<()> {
    let server = ChatServer::start().await?;

    let mut a = server.connect().await?;
    recv_json(&mut a).await?; // welcome
    send_json(&mut a, &json!({"clientInit": true})).await?;
    recv_json(&mut a).await?; // assign

    let mut b = server.connect().await?;
    recv_json(&mut b).await?; // welcome
    send_json(&mut b, &json!({"cid": 7, "haveCookieCid": true})).await?;

    // A sees B join under the presented identity.
    let joined = recv_json(&mut a).await?;
    assert_eq!(joined["userJoined"], true);
    assert_eq!(joined["cid"], 7);

    // B got no fresh assignment: its next frame is its own chat echo.
    send_json(
        &mut b,
        &json!({"cid": 7, "mid": 0, "srvAck": false, "text": "back", "thisIsMe": true, "type": 1}),
    )
    .await?;
    let echo = recv_json(&mut b).await?;
    assert_eq!(echo["text"], "back");
    assert_eq!(echo["cid"], 7);
    Ok(())
}

// -- Chat ---------------------------------------------------------------------

#[tokio::test]
async fn chat_echo_carries_ack_stamps_to_everyone() -> anyhow::Result<()> {
    let server = ChatServer::start().await?;

    let mut a = server.connect().await?;
    recv_json(&mut a).await?;
    send_json(&mut a, &json!({"clientInit": true})).await?;
    recv_json(&mut a).await?;

    let mut b = server.connect().await?;
    recv_json(&mut b).await?;
    send_json(&mut b, &json!({"clientInit": true})).await?;
    recv_json(&mut b).await?;
    recv_json(&mut a).await?; // B's join notice

    send_json(
        &mut a,
        &json!({"cid": 1, "color": "#FF0000", "mid": 3, "rxDate": 1, "srvAck": false,
                "text": "hi", "thisIsMe": true, "type": 1, "user": "Player #1"}),
    )
    .await?;

    for ws in [&mut a, &mut b] {
        let echo = recv_json(ws).await?;
        assert_eq!(echo["text"], "hi");
        assert_eq!(echo["srvAck"], true);
        assert_eq!(echo["srvAckMid"], 3);
        assert_eq!(echo["user"], "User #1");
        assert!(echo["rxDate"].is_number());
    }
    Ok(())
}

#[tokio::test]
async fn leave_notice_reaches_remaining_users() -> anyhow::Result<()> {
    let server = ChatServer::start().await?;

    let mut a = server.connect().await?;
    recv_json(&mut a).await?;
    send_json(&mut a, &json!({"clientInit": true})).await?;
    recv_json(&mut a).await?;

    let mut b = server.connect().await?;
    recv_json(&mut b).await?;
    send_json(&mut b, &json!({"cid": 7, "haveCookieCid": true})).await?;
    recv_json(&mut a).await?; // join notice

    drop(b);

    let left = recv_json(&mut a).await?;
    assert_eq!(left["userLeft"], true);
    assert_eq!(left["cid"], 7);
    assert_eq!(left["text"], "<Logged out>");
    Ok(())
}

// -- Replay -------------------------------------------------------------------

#[tokio::test]
async fn reconnect_replays_full_history_in_order() -> anyhow::Result<()> {
    let server = ChatServer::start().await?;

    let mut a = server.connect().await?;
    recv_json(&mut a).await?;
    send_json(&mut a, &json!({"clientInit": true})).await?;
    recv_json(&mut a).await?;

    // A witness stays connected to observe A's leave deterministically.
    let mut witness = server.connect().await?;
    recv_json(&mut witness).await?;
    send_json(&mut witness, &json!({"cid": 99, "haveCookieCid": true})).await?;
    recv_json(&mut a).await?; // witness join notice

    for (mid, text) in [(0, "one"), (1, "two")] {
        send_json(
            &mut a,
            &json!({"cid": 1, "mid": mid, "srvAck": false, "text": text, "thisIsMe": true, "type": 1}),
        )
        .await?;
        recv_json(&mut a).await?; // own echo
        recv_json(&mut witness).await?;
    }
    drop(a);

    // Once the witness sees the leave, the history is complete.
    let left = recv_json(&mut witness).await?;
    assert_eq!(left["userLeft"], true);

    let mut again = server.connect().await?;
    let welcome = recv_json(&mut again).await?;
    let history = welcome["messageHistory"]
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("messageHistory missing"))?;
    let texts: Vec<&str> =
        history.iter().filter_map(|m| m["text"].as_str()).collect();
    // A's join, the witness's join, both chats, then A's leave.
    assert_eq!(
        texts,
        vec!["<joined the chat>", "<joined the chat>", "one", "two", "<Logged out>"]
    );
    Ok(())
}

// -- HTTP surface -------------------------------------------------------------

#[tokio::test]
async fn health_and_presence_track_registrations() -> anyhow::Result<()> {
    let server = ChatServer::start().await?;

    let mut ws = server.connect().await?;
    recv_json(&mut ws).await?;
    send_json(&mut ws, &json!({"cid": 42, "haveCookieCid": true})).await?;

    // Wait for the registration to land before asserting presence.
    send_json(&mut ws, &json!({"cid": 42, "mid": 0, "srvAck": false, "text": "ping", "type": 1}))
        .await?;
    recv_json(&mut ws).await?;

    let health: serde_json::Value =
        reqwest::get(format!("{}/api/v1/health", server.base_url())).await?.json().await?;
    assert_eq!(health["status"], "running");
    assert_eq!(health["users"], 1);

    let users: serde_json::Value =
        reqwest::get(format!("{}/api/v1/users", server.base_url())).await?.json().await?;
    assert_eq!(users[0]["name"], "User #42");
    assert!(users[0]["joined_at_ms"].is_number());
    Ok(())
}

// -- Client library against the real server -----------------------------------

#[tokio::test]
async fn client_session_full_round_trip() -> anyhow::Result<()> {
    let server = ChatServer::start().await?;
    let dir = tempfile::tempdir()?;
    let mut session = Session::new(CookieStore::new(dir.path().join("cid.json")), None);

    let mut ws = server.connect().await?;
    session.begin_connection();

    // Drive the handshake: welcome triggers clientInit, the assignment
    // resolves the identity.
    while session.client_id().is_none() {
        let frame = recv_json(&mut ws).await?;
        let outcome = session.handle_text(&frame.to_string());
        for json in outcome.outbound {
            send_text(&mut ws, &json).await?;
        }
    }
    assert_eq!(session.client_id(), Some(1));
    let after_handshake = session.transcript().len();

    // Optimistic submit, then reconcile the echo: replace, not append.
    let (json, _pending) =
        session.submit("hi").ok_or_else(|| anyhow::anyhow!("submit produced nothing"))?;
    send_text(&mut ws, &json).await?;
    assert_eq!(session.ledger().pending_count(), 1);

    let echo = recv_json(&mut ws).await?;
    session.handle_text(&echo.to_string());

    assert_eq!(session.transcript().len(), after_handshake + 1);
    assert_eq!(session.ledger().pending_count(), 0);

    // The identity persisted for the next connection.
    assert_eq!(CookieStore::new(dir.path().join("cid.json")).load(), Some(1));
    Ok(())
}

#[tokio::test]
async fn client_reconnect_resumes_without_new_identity() -> anyhow::Result<()> {
    let server = ChatServer::start().await?;
    let dir = tempfile::tempdir()?;
    let cookie_path = dir.path().join("cid.json");
    CookieStore::new(cookie_path.clone()).save(7)?;
    let mut session = Session::new(CookieStore::new(cookie_path.clone()), None);

    let mut ws = server.connect().await?;
    session.begin_connection();

    let welcome = recv_json(&mut ws).await?;
    let outcome = session.handle_text(&welcome.to_string());
    assert_eq!(outcome.outbound.len(), 1);
    assert!(outcome.outbound[0].contains("haveCookieCid"));
    for json in outcome.outbound {
        send_text(&mut ws, &json).await?;
    }

    // The presented identity is kept as-is.
    assert_eq!(session.client_id(), Some(7));
    assert_eq!(CookieStore::new(cookie_path).load(), Some(7));
    Ok(())
}
