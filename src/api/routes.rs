// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::net::SocketAddr;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::dev::Server;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use log::info;

use crate::api::mcp_http::configure_mcp_routes;
use crate::api::mcp_sse::{configure_sse_routes, McpSseState};
use crate::config::{InterfaceType, Settings};
use crate::mcp::McpHandler;
use crate::session_manager::SessionManager;

/// Everything the HTTP-based transports share across workers.
#[derive(Clone)]
pub struct McpServerState {
    handler: web::Data<dyn McpHandler>,
    sse: Option<web::Data<McpSseState>>,
}

impl McpServerState {
    /// `/mcp` is always mounted; the SSE routes only for `InterfaceType::Sse`.
    pub fn new(settings: &Settings, handler: Arc<dyn McpHandler>) -> Self {
        let sse = (settings.interface == InterfaceType::Sse).then(|| {
            let sessions = Arc::new(
                SessionManager::new(settings.keepalive_interval(), settings.sse.max_queue_depth)
                    .with_poll_interval(settings.poll_interval()),
            );
            web::Data::new(
                McpSseState::new(sessions, Arc::clone(&handler))
                    .with_message_event(settings.sse.message_event.clone()),
            )
        });
        Self {
            handler: web::Data::from(handler),
            sse,
        }
    }

    pub fn sessions(&self) -> Option<Arc<SessionManager>> {
        self.sse.as_ref().map(|sse| Arc::clone(&sse.sessions))
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.handler.clone());
        configure_mcp_routes(cfg);
        if let Some(sse) = &self.sse {
            cfg.app_data(sse.clone());
            configure_sse_routes(cfg);
        }
    }
}

/// Binds the HTTP server without running it. Returns the bound address so
/// callers binding port 0 can learn the real port.
pub fn start_server(settings: &Settings, handler: Arc<dyn McpHandler>) -> std::io::Result<(Server, SocketAddr)> {
    let state = McpServerState::new(settings, handler);
    let bind_address = (settings.http.host.as_str(), settings.http.port);

    let server = HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(Cors::permissive())
            .wrap(Logger::default())
            .configure(move |cfg| state.configure(cfg))
    })
    .bind(bind_address)?;

    let addr = server
        .addrs()
        .first()
        .copied()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "server bound no address"))?;
    info!("MCP {:?} transport listening on http://{}", settings.interface, addr);
    Ok((server.run(), addr))
}

pub async fn run_server(settings: &Settings, handler: Arc<dyn McpHandler>) -> std::io::Result<()> {
    let (server, _) = start_server(settings, handler)?;
    server.await
}
