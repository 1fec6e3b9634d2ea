// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Live tests for the SSE transport: real server, real sockets.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use mcp_bridge::config::InterfaceType;
use serde_json::{json, Value};

use super::support::{local_handler, spawn_server, test_settings, SseReader};

const WAIT: Duration = Duration::from_secs(5);

struct Connection {
    reader: SseReader,
    endpoint: String,
}

async fn connect(client: &reqwest::Client, addr: SocketAddr) -> Connection {
    let response = client
        .get(format!("http://{}/sse", addr))
        .send()
        .await
        .expect("open SSE stream");
    assert_eq!(response.status(), 200);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut reader = SseReader::new(response);
    let handshake = reader.next_frame(WAIT).await.expect("handshake frame");
    assert_eq!(handshake.event.as_deref(), Some("handshake"));
    assert!(handshake.json()["version"].is_string());
    assert!(handshake.comments.iter().any(|c| c.contains("/messages?sessionId=")));

    let endpoint = reader.next_frame(WAIT).await.expect("endpoint frame");
    assert_eq!(endpoint.event.as_deref(), Some("endpoint"));
    let endpoint = endpoint.data.expect("endpoint path");
    assert!(endpoint.starts_with("/messages?sessionId="));

    Connection { reader, endpoint }
}

async fn post(client: &reqwest::Client, addr: SocketAddr, endpoint: &str, body: Value) -> reqwest::Response {
    client
        .post(format!("http://{}{}", addr, endpoint))
        .json(&body)
        .send()
        .await
        .expect("POST message")
}

async fn initialize(client: &reqwest::Client, addr: SocketAddr, conn: &mut Connection) {
    let resp = post(
        client,
        addr,
        &conn.endpoint,
        json!({
            "jsonrpc": "2.0", "id": 0, "method": "initialize",
            "params": {"protocolVersion": "2025-03-26", "capabilities": {}, "clientInfo": {"name": "t", "version": "1"}}
        }),
    )
    .await;
    assert_eq!(resp.status(), 202);
    let init = conn.reader.next_message(WAIT).await.expect("initialize reply");
    assert_eq!(init["id"], 0);
    assert_eq!(init["result"]["protocolVersion"], "2025-03-26");
    let changed = conn.reader.next_message(WAIT).await.expect("list_changed");
    assert_eq!(changed["method"], "notifications/tools/list_changed");
}

fn echoed_text(reply: &Value) -> String {
    let text = reply["result"]["content"][0]["text"].as_str().expect("text content");
    serde_json::from_str::<String>(text).expect("text is a JSON string")
}

#[actix_web::test]
async fn test_reply_travels_over_stream_not_post_body() {
    let (addr, _) = spawn_server(&test_settings(InterfaceType::Sse), local_handler());
    let client = reqwest::Client::new();
    let mut conn = connect(&client, addr).await;

    let resp = post(&client, addr, &conn.endpoint, json!({"jsonrpc": "2.0", "id": "p", "method": "ping"})).await;
    assert_eq!(resp.status(), 202);
    assert!(resp.text().await.unwrap().is_empty());

    let reply = conn.reader.next_message(WAIT).await.expect("ping reply");
    assert_eq!(reply, json!({"jsonrpc": "2.0", "id": "p", "result": {}}));
}

#[actix_web::test]
async fn test_message_frames_use_configured_event_name() {
    let mut settings = test_settings(InterfaceType::Sse);
    settings.sse.message_event = "message".to_string();
    let (addr, _) = spawn_server(&settings, local_handler());
    let client = reqwest::Client::new();
    let mut conn = connect(&client, addr).await;

    post(&client, addr, &conn.endpoint, json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})).await;
    let frame = conn.reader.next_frame(WAIT).await.expect("reply frame");
    assert_eq!(frame.event.as_deref(), Some("message"));
}

#[actix_web::test]
async fn test_tools_call_requires_initialize_per_session() {
    let (addr, _) = spawn_server(&test_settings(InterfaceType::Sse), local_handler());
    let client = reqwest::Client::new();
    let mut conn = connect(&client, addr).await;

    let call = json!({
        "jsonrpc": "2.0", "id": 1, "method": "tools/call",
        "params": {"name": "echo", "arguments": {"text": "early"}}
    });
    post(&client, addr, &conn.endpoint, call.clone()).await;
    let early = conn.reader.next_message(WAIT).await.unwrap();
    assert_eq!(early["error"]["code"], -32002);

    initialize(&client, addr, &mut conn).await;
    post(&client, addr, &conn.endpoint, call).await;
    let reply = conn.reader.next_message(WAIT).await.unwrap();
    assert_eq!(echoed_text(&reply), "early");
}

#[actix_web::test]
async fn test_sessions_are_isolated() {
    let (addr, _) = spawn_server(&test_settings(InterfaceType::Sse), local_handler());
    let client = reqwest::Client::new();
    let mut a = connect(&client, addr).await;
    let mut b = connect(&client, addr).await;
    assert_ne!(a.endpoint, b.endpoint);

    initialize(&client, addr, &mut a).await;
    initialize(&client, addr, &mut b).await;

    for (conn, text) in [(&a, "from-a"), (&b, "from-b")] {
        let resp = post(
            &client,
            addr,
            &conn.endpoint,
            json!({
                "jsonrpc": "2.0", "id": 42, "method": "tools/call",
                "params": {"name": "echo", "arguments": {"text": text}}
            }),
        )
        .await;
        assert_eq!(resp.status(), 202);
    }

    let reply_a = a.reader.next_message(WAIT).await.unwrap();
    let reply_b = b.reader.next_message(WAIT).await.unwrap();
    assert_eq!(echoed_text(&reply_a), "from-a");
    assert_eq!(echoed_text(&reply_b), "from-b");

    // Nothing else is waiting on either stream
    assert!(a.reader.next_message(Duration::from_millis(300)).await.is_none());
    assert!(b.reader.next_message(Duration::from_millis(300)).await.is_none());
}

#[actix_web::test]
async fn test_unknown_session_fails_fast() {
    let (addr, _) = spawn_server(&test_settings(InterfaceType::Sse), local_handler());
    let client = reqwest::Client::new();

    let started = Instant::now();
    let resp = post(
        &client,
        addr,
        "/messages?sessionId=never-existed",
        json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}),
    )
    .await;
    assert_eq!(resp.status(), 404);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[actix_web::test]
async fn test_idle_stream_sends_keepalive() {
    let mut settings = test_settings(InterfaceType::Sse);
    settings.sse.keepalive_secs = 1;
    let (addr, _) = spawn_server(&settings, local_handler());
    let client = reqwest::Client::new();
    let mut conn = connect(&client, addr).await;

    let frame = conn.reader.next_frame(Duration::from_secs(3)).await.expect("keepalive frame");
    assert_eq!(frame.comments, vec!["keepalive".to_string()]);
    assert!(frame.data.is_none());
}

#[actix_web::test]
async fn test_disconnect_closes_session_promptly() {
    // Default 30s keepalive: closure must not wait for it
    let (addr, sessions) = spawn_server(&test_settings(InterfaceType::Sse), local_handler());
    let sessions = sessions.expect("sse mode has a session table");
    let client = reqwest::Client::new();

    let conn = connect(&client, addr).await;
    assert_eq!(sessions.active_sessions(), 1);
    let endpoint = conn.endpoint.clone();
    drop(conn);
    drop(client);

    let started = Instant::now();
    while sessions.active_sessions() > 0 && started.elapsed() < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(sessions.active_sessions(), 0);
    // A write into the closed socket may still succeed once; the next fails
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "session lingered for {:?}",
        started.elapsed()
    );

    let resp = post(&reqwest::Client::new(), addr, &endpoint, json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_http_endpoint_is_mounted_alongside_sse() {
    let (addr, _) = spawn_server(&test_settings(InterfaceType::Sse), local_handler());
    let body: Value = reqwest::Client::new()
        .post(format!("http://{}/mcp", addr))
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["result"]["tools"][1]["name"], "server_time");
}
