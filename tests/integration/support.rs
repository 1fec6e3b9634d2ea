// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helpers shared by the live-server integration tests.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer};
use futures_util::{Stream, StreamExt};
use mcp_bridge::api::McpServerState;
use mcp_bridge::config::{InterfaceType, Settings};
use mcp_bridge::mcp::{McpHandler, ProtocolHandler, ServerInfo};
use mcp_bridge::session_manager::SessionManager;
use mcp_bridge::tools::builtin_registry;
use serde_json::Value;

pub fn local_handler() -> Arc<dyn McpHandler> {
    Arc::new(ProtocolHandler::new(
        Arc::new(builtin_registry().expect("builtin tools register")),
        ServerInfo::default(),
    ))
}

pub fn test_settings(interface: InterfaceType) -> Settings {
    let mut settings = Settings::default();
    settings.interface = interface;
    settings.http.host = "127.0.0.1".to_string();
    settings.http.port = 0;
    settings
}

/// Starts a server on an ephemeral port in the current actix system.
pub fn spawn_server(settings: &Settings, handler: Arc<dyn McpHandler>) -> (SocketAddr, Option<Arc<SessionManager>>) {
    let state = McpServerState::new(settings, handler);
    let sessions = state.sessions();
    let server = HttpServer::new(move || {
        let state = state.clone();
        App::new().configure(move |cfg| state.configure(cfg))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("bind test server");
    let addr = server.addrs()[0];
    actix_rt::spawn(server.run());
    (addr, sessions)
}

/// One parsed SSE frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub event: Option<String>,
    pub data: Option<String>,
    pub comments: Vec<String>,
}

impl Frame {
    pub fn json(&self) -> Value {
        serde_json::from_str(self.data.as_deref().expect("frame has data")).expect("frame data is JSON")
    }
}

// reqwest and actix-web share the `bytes` crate
type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<actix_web::web::Bytes>>>>;

/// Reads frames off a live `text/event-stream` response.
pub struct SseReader {
    stream: ByteStream,
    buffer: String,
}

impl SseReader {
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            stream: Box::pin(response.bytes_stream()),
            buffer: String::new(),
        }
    }

    /// Next frame, or `None` if the stream ends or nothing arrives in time.
    pub async fn next_frame(&mut self, wait: Duration) -> Option<Frame> {
        loop {
            if let Some(pos) = self.buffer.find("\n\n") {
                let raw: String = self.buffer.drain(..pos + 2).collect();
                return Some(parse_frame(&raw));
            }
            let chunk = tokio::time::timeout(wait, self.stream.next()).await.ok()??.ok()?;
            self.buffer.push_str(&String::from_utf8_lossy(chunk.as_ref()));
        }
    }

    /// Next frame carrying JSON data, skipping keepalives.
    pub async fn next_message(&mut self, wait: Duration) -> Option<Value> {
        loop {
            let frame = self.next_frame(wait).await?;
            if frame.data.is_some() {
                return Some(frame.json());
            }
        }
    }
}

fn parse_frame(raw: &str) -> Frame {
    let mut frame = Frame {
        event: None,
        data: None,
        comments: Vec::new(),
    };
    for line in raw.lines() {
        if let Some(comment) = line.strip_prefix(':') {
            frame.comments.push(comment.trim().to_string());
        } else if let Some(event) = line.strip_prefix("event: ") {
            frame.event = Some(event.to_string());
        } else if let Some(data) = line.strip_prefix("data: ") {
            frame.data = Some(data.to_string());
        }
    }
    frame
}
