// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Bridges relaying to a live HTTP server in the same process.

use std::sync::Arc;
use std::time::Duration;

use mcp_bridge::api::mcp_stdio::run_stdio_loop;
use mcp_bridge::bridge::{HttpUpstream, ProxyHandler, Upstream};
use mcp_bridge::config::InterfaceType;
use mcp_bridge::mcp::{McpHandler, McpPortState};
use serde_json::{json, Value};
use tokio::sync::Mutex as TokioMutex;

use super::support::{local_handler, spawn_server, test_settings};

fn proxy_to(url: String) -> ProxyHandler {
    let upstream: Arc<dyn Upstream> = Arc::new(HttpUpstream::new(url, Duration::from_secs(5)).unwrap());
    ProxyHandler::new(upstream)
}

fn fresh_state() -> Arc<TokioMutex<McpPortState>> {
    Arc::new(TokioMutex::new(McpPortState::new()))
}

#[actix_web::test]
async fn test_http_bridge_preserves_ids_and_results() {
    let (addr, _) = spawn_server(&test_settings(InterfaceType::Http), local_handler());
    let proxy = proxy_to(format!("http://{}/mcp", addr));

    let state = fresh_state();
    let init = proxy
        .handle_request(
            Arc::clone(&state),
            json!({"jsonrpc": "2.0", "id": "init-1", "method": "initialize", "params": {"protocolVersion": "2025-03-26"}}),
        )
        .await
        .unwrap();
    assert_eq!(init["id"], "init-1");
    assert!(state.lock().await.initialized);

    let reply = proxy
        .handle_request(
            Arc::clone(&state),
            json!({
                "jsonrpc": "2.0", "id": 77, "method": "tools/call",
                "params": {"name": "echo", "arguments": {"text": "across"}}
            }),
        )
        .await
        .unwrap();
    assert_eq!(reply["id"], 77);
    let text = reply["result"]["content"][0]["text"].as_str().unwrap();
    assert_eq!(serde_json::from_str::<String>(text).unwrap(), "across");
}

#[actix_web::test]
async fn test_http_bridge_passes_protocol_errors_through() {
    let (addr, _) = spawn_server(&test_settings(InterfaceType::Http), local_handler());
    let proxy = proxy_to(format!("http://{}/mcp", addr));
    let reply = proxy
        .handle_request(fresh_state(), json!({"jsonrpc": "2.0", "id": 9, "method": "frobnicate"}))
        .await
        .unwrap();
    assert_eq!(reply["id"], 9);
    assert_eq!(reply["error"]["code"], -32601);
}

#[actix_web::test]
async fn test_http_bridge_notification_gets_nothing() {
    let (addr, _) = spawn_server(&test_settings(InterfaceType::Http), local_handler());
    let proxy = proxy_to(format!("http://{}/mcp", addr));
    let reply = proxy
        .handle_request(fresh_state(), json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .await;
    assert!(reply.is_none());
}

#[actix_web::test]
async fn test_http_status_failure_becomes_jsonrpc_error() {
    let (addr, _) = spawn_server(&test_settings(InterfaceType::Http), local_handler());
    let proxy = proxy_to(format!("http://{}/not-mcp", addr));
    let reply = proxy
        .handle_request(fresh_state(), json!({"jsonrpc": "2.0", "id": 3, "method": "ping"}))
        .await
        .unwrap();
    assert_eq!(reply["id"], 3);
    assert_eq!(reply["error"]["code"], -32603);
}

#[tokio::test]
async fn test_connection_refused_becomes_jsonrpc_error() {
    // Bind then drop to get a port nobody listens on
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let proxy = proxy_to(format!("http://127.0.0.1:{}/mcp", port));
    let reply = tokio::time::timeout(
        Duration::from_secs(5),
        proxy.handle_request(fresh_state(), json!({"jsonrpc": "2.0", "id": "x", "method": "ping"})),
    )
    .await
    .expect("bridge must not hang")
    .unwrap();
    assert_eq!(reply["id"], "x");
    assert_eq!(reply["error"]["code"], -32603);
    assert!(reply.get("result").is_none());
}

#[actix_web::test]
async fn test_stdio_to_http_chain() {
    let (addr, _) = spawn_server(&test_settings(InterfaceType::Http), local_handler());
    let proxy: Arc<dyn McpHandler> = Arc::new(proxy_to(format!("http://{}/mcp", addr)));

    let input = [
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
    ]
    .iter()
    .map(|l| format!("{}\n", l))
    .collect::<String>()
        + "garbage\n";

    let mut output = Vec::new();
    run_stdio_loop(input.as_bytes(), &mut output, proxy, fresh_state())
        .await
        .unwrap();
    let out: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(out.len(), 3);
    assert_eq!(out[0]["id"], 1);
    assert_eq!(out[1]["result"]["tools"][0]["name"], "echo");
    assert_eq!(out[2]["error"]["code"], -32700);
}
