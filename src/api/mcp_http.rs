// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Plain HTTP transport on a single `/mcp` endpoint.
//!
//! POST carries one JSON-RPC message per request. JSON-RPC errors are
//! returned with status 200; notifications get an empty 202.
//!
//! GET answers with the result an `initialize` followed by `tools/list`
//! would produce. It is a compatibility shim for clients that send a
//! GET before speaking JSON-RPC, not part of the protocol.

use std::sync::Arc;

use actix_web::http::header::ACCEPT;
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, info, warn};
use tokio::sync::Mutex as TokioMutex;

use crate::mcp::{discovery_document, handle_raw_message, JsonRpcResponse, McpHandler, McpPortState};

/// Handles a JSON-RPC message posted to `/mcp`.
///
/// Each request runs against a fresh, already initialized port state: the
/// endpoint keeps nothing between requests.
pub async fn mcp_post_handler(
    req: HttpRequest,
    body: web::Bytes,
    handler: web::Data<dyn McpHandler>,
) -> HttpResponse {
    debug!("MCP POST request received ({} bytes)", body.len());

    let response = match std::str::from_utf8(&body) {
        Ok(text) => {
            let state = Arc::new(TokioMutex::new(McpPortState::stateless()));
            handle_raw_message(handler.get_ref(), state, text).await
        }
        Err(e) => {
            warn!("MCP POST body is not valid UTF-8: {}", e);
            Some(JsonRpcResponse::parse_error(e).to_value())
        }
    };

    let Some(response) = response else {
        return HttpResponse::Accepted().finish();
    };

    if wants_event_stream(&req) {
        let sse_data = format!("event: message\ndata: {}\n\n", response);
        HttpResponse::Ok()
            .content_type("text/event-stream")
            .insert_header(("Cache-Control", "no-cache"))
            .body(sse_data)
    } else {
        HttpResponse::Ok().json(response)
    }
}

/// Serves the discovery document on `GET /mcp`.
pub async fn mcp_get_handler(handler: web::Data<dyn McpHandler>) -> HttpResponse {
    info!("MCP GET discovery request");
    HttpResponse::Ok().json(discovery_document(handler.get_ref()).await)
}

/// Clients that list only `text/event-stream` get the reply as one SSE frame.
fn wants_event_stream(req: &HttpRequest) -> bool {
    req.headers()
        .get(ACCEPT)
        .and_then(|h| h.to_str().ok())
        .map(|accept| accept.contains("text/event-stream") && !accept.contains("application/json"))
        .unwrap_or(false)
}

/// Configure MCP HTTP routes. Expects `web::Data<dyn McpHandler>` in app data.
pub fn configure_mcp_routes(cfg: &mut web::ServiceConfig) {
    info!("Configuring MCP HTTP transport routes");
    cfg.service(
        web::resource("/mcp")
            .route(web::post().to(mcp_post_handler))
            .route(web::get().to(mcp_get_handler)),
    );
}
