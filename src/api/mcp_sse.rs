// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! SSE transport: `GET /sse` opens a session stream, `POST /messages`
//! feeds it.
//!
//! Replies never come back in the POST body. The POST handler runs the
//! request and enqueues the response on the session, and the stream opened
//! by `GET /sse` delivers it.

use std::sync::Arc;

use actix_web::web::Bytes;
use actix_web::{web, HttpResponse};
use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::mcp::types::LATEST_PROTOCOL_VERSION;
use crate::mcp::{JsonRpcNotification, JsonRpcResponse, McpHandler};
use crate::session_manager::{SessionEvent, SessionGuard, SessionManager};

pub const DEFAULT_MESSAGE_EVENT: &str = "mcp-json-rpc-2.0";

/// Shared state for the SSE routes.
#[derive(Clone)]
pub struct McpSseState {
    pub sessions: Arc<SessionManager>,
    pub handler: Arc<dyn McpHandler>,
    /// `event:` name on JSON-RPC frames.
    pub message_event: String,
}

impl McpSseState {
    pub fn new(sessions: Arc<SessionManager>, handler: Arc<dyn McpHandler>) -> Self {
        Self {
            sessions,
            handler,
            message_event: DEFAULT_MESSAGE_EVENT.to_string(),
        }
    }

    pub fn with_message_event(mut self, event: impl Into<String>) -> Self {
        self.message_event = event.into();
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(rename = "sessionId", alias = "session_id")]
    pub session_id: Option<String>,
}

/// Relative URL clients POST to for a session.
pub fn message_endpoint(session_id: &str) -> String {
    format!("/messages?sessionId={}", session_id)
}

fn event_frame(event: &str, data: &str) -> Bytes {
    Bytes::from(format!("event: {}\ndata: {}\n\n", event, data))
}

fn handshake_frame(endpoint: &str) -> Bytes {
    Bytes::from(format!(
        ": messages endpoint {}\nevent: handshake\ndata: {}\n\n",
        endpoint,
        json!({ "version": LATEST_PROTOCOL_VERSION })
    ))
}

fn keepalive_frame() -> Bytes {
    Bytes::from_static(b":keepalive\n\n")
}

// Smallest valid SSE frame; clients ignore it.
fn tick_frame() -> Bytes {
    Bytes::from_static(b":\n\n")
}

/// Opens a session and streams its events until the client goes away.
pub async fn sse_connect_handler(state: web::Data<McpSseState>) -> Result<HttpResponse, ApiError> {
    let session_id = state.sessions.create_session().id().to_string();
    let guard = SessionGuard::new(Arc::clone(&state.sessions), session_id.clone());
    let events = state.sessions.drain(&session_id).await?;

    let endpoint = message_endpoint(&session_id);
    info!("SSE client connected, session {}", session_id);

    let preamble = stream::iter(vec![
        handshake_frame(&endpoint),
        event_frame("endpoint", &endpoint),
    ]);

    let message_event = state.message_event.clone();
    let frames = events.map(move |event| match event {
        SessionEvent::Message(message) => event_frame(&message_event, &message.to_string()),
        SessionEvent::Keepalive => keepalive_frame(),
        SessionEvent::Tick => tick_frame(),
    });

    // The guard rides along with the body. actix drops the body once a
    // write to a disconnected client fails, which closes the session.
    let body = preamble.chain(frames).map(move |frame| {
        let _held = &guard;
        Ok::<_, actix_web::Error>(frame)
    });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .insert_header(("Mcp-Session-Id", session_id))
        .streaming(body))
}

/// Accepts a JSON-RPC message for a session and answers 202.
pub async fn sse_message_handler(
    query: web::Query<MessageQuery>,
    body: web::Bytes,
    state: web::Data<McpSseState>,
) -> Result<HttpResponse, ApiError> {
    let session_id = query.into_inner().session_id.ok_or(ApiError::MissingSessionId)?;
    let session = state.sessions.get_session(&session_id)?;
    debug!("SSE message for session {} ({} bytes)", session_id, body.len());

    let parsed = std::str::from_utf8(&body)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str::<Value>(text).map_err(|e| e.to_string()));

    let (response, is_initialize) = match parsed {
        Ok(request) => {
            let is_initialize = request.get("method").and_then(Value::as_str) == Some("initialize");
            let response = state.handler.handle_request(session.port_state(), request).await;
            (response, is_initialize)
        }
        Err(e) => {
            warn!("Malformed message for SSE session {}: {}", session_id, e);
            (Some(JsonRpcResponse::parse_error(e).to_value()), false)
        }
    };
    drop(session);

    if let Some(response) = response {
        let succeeded = response.get("result").is_some();
        state.sessions.enqueue(&session_id, response)?;
        if is_initialize && succeeded {
            let notification = serde_json::to_value(JsonRpcNotification::tools_list_changed())
                .map_err(|e| ApiError::InternalError(e.to_string()))?;
            state.sessions.enqueue(&session_id, notification)?;
        }
    }

    Ok(HttpResponse::Accepted().finish())
}

/// Configure the SSE routes. Expects `web::Data<McpSseState>` in app data.
pub fn configure_sse_routes(cfg: &mut web::ServiceConfig) {
    info!("Configuring MCP SSE transport routes");
    cfg.service(web::resource("/sse").route(web::get().to(sse_connect_handler)))
        .service(web::resource("/messages").route(web::post().to(sse_message_handler)));
}
