// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The stdio loop driven end to end against the built-in tools.

use std::sync::Arc;

use mcp_bridge::api::mcp_stdio::run_stdio_loop;
use mcp_bridge::mcp::McpPortState;
use serde_json::{json, Value};
use tokio::sync::Mutex as TokioMutex;

use super::support::local_handler;

async fn run_session(lines: &[Value]) -> Vec<Value> {
    let input: String = lines.iter().map(|l| format!("{}\n", l)).collect();
    let mut output = Vec::new();
    run_stdio_loop(
        input.as_bytes(),
        &mut output,
        local_handler(),
        Arc::new(TokioMutex::new(McpPortState::new())),
    )
    .await
    .expect("loop ends cleanly at EOF");
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn test_full_client_session() {
    let out = run_session(&[
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"protocolVersion": "2025-06-18"}}),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"name": "echo", "arguments": {"text": "hi"}}}),
    ])
    .await;

    // The notification produced nothing
    assert_eq!(out.len(), 3);
    assert_eq!(out[0]["result"]["protocolVersion"], "2025-06-18");
    assert_eq!(out[1]["result"]["tools"].as_array().unwrap().len(), 2);
    let text = out[2]["result"]["content"][0]["text"].as_str().unwrap();
    assert_eq!(serde_json::from_str::<String>(text).unwrap(), "hi");
}

#[tokio::test]
async fn test_tools_call_before_initialize() {
    let out = run_session(&[json!({
        "jsonrpc": "2.0", "id": 1, "method": "tools/call",
        "params": {"name": "echo", "arguments": {"text": "hi"}}
    })])
    .await;
    assert_eq!(out[0]["id"], 1);
    assert_eq!(out[0]["error"]["code"], -32002);
}

#[tokio::test]
async fn test_malformed_json_does_not_stop_the_loop() {
    let input = "{\"jsonrpc\": \"2.0\", \"id\": 1,\n{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n";
    let mut output = Vec::new();
    run_stdio_loop(
        input.as_bytes(),
        &mut output,
        local_handler(),
        Arc::new(TokioMutex::new(McpPortState::new())),
    )
    .await
    .unwrap();

    let out: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0]["error"]["code"], -32700);
    assert_eq!(out[0]["id"], Value::Null);
    assert_eq!(out[1]["id"], 2);
    assert_eq!(out[1]["result"], json!({}));
}
