// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command line surface and process assembly for the `mcp-bridge` binary.

use std::sync::Arc;

use clap::Parser;
use env_logger::{Env, Target};
use log::info;
use thiserror::Error;

use crate::bridge::{BridgeError, HttpUpstream, ProxyHandler, StdioUpstream, Upstream};
use crate::config::{InterfaceType, Settings};
use crate::mcp::{McpHandler, ProtocolHandler, RegistryError, ServerInfo};
use crate::tools::builtin_registry;

#[derive(Parser, Debug, Default)]
#[command(version, about = "Serves MCP tools over stdio, HTTP or SSE, or bridges to another MCP server", long_about = None)]
pub struct Cli {
    /// Transport to serve. Defaults to stdio.
    #[arg(long, value_enum)]
    pub mode: Option<InterfaceType>,

    /// Path to the configuration file.
    #[arg(short, long, env = "MCP_BRIDGE_CONFIG")]
    pub config: Option<String>,

    /// Address to bind for http and sse modes.
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind for http and sse modes.
    #[arg(long)]
    pub port: Option<u16>,

    /// Relay to an MCP server at this HTTP URL instead of serving built-in tools.
    #[arg(long, conflicts_with = "upstream_cmd")]
    pub upstream_url: Option<String>,

    /// Relay to an MCP server started as a child process speaking stdio.
    #[arg(long)]
    pub upstream_cmd: Option<String>,

    /// Argument passed to the upstream command. Repeatable.
    #[arg(long = "upstream-arg", allow_hyphen_values = true)]
    pub upstream_args: Vec<String>,
}

impl Cli {
    /// Loads settings from the chosen file and environment, then applies flags on top.
    pub fn load_settings(&self) -> Result<Settings, StartupError> {
        let mut settings = Settings::new(self.config.as_deref())?;
        self.apply(&mut settings);
        Ok(settings)
    }

    pub fn apply(&self, settings: &mut Settings) {
        if let Some(mode) = self.mode {
            settings.interface = mode;
        }
        if let Some(host) = &self.host {
            settings.http.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.http.port = port;
        }
        if let Some(url) = &self.upstream_url {
            settings.bridge.upstream_url = Some(url.clone());
            settings.bridge.upstream_command = None;
        }
        if let Some(cmd) = &self.upstream_cmd {
            settings.bridge.upstream_command = Some(cmd.clone());
            settings.bridge.upstream_url = None;
        }
        if !self.upstream_args.is_empty() {
            settings.bridge.upstream_args = self.upstream_args.clone();
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Tool registration failed: {0}")]
    Registry(#[from] RegistryError),
    #[error("Bridge setup failed: {0}")]
    Bridge(#[from] BridgeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Logs go to stderr in every mode so stdout stays a clean JSON-RPC channel.
pub fn init_logging(settings: &Settings) {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(settings.log.level.as_str()))
        .target(Target::Stderr)
        .try_init();
}

/// The handler every transport wraps: a proxy when an upstream is configured,
/// otherwise the built-in tools.
pub fn build_handler(settings: &Settings) -> Result<Arc<dyn McpHandler>, StartupError> {
    let timeout = settings.bridge_timeout();

    if let Some(url) = &settings.bridge.upstream_url {
        info!("Bridging to HTTP upstream {}", url);
        let upstream: Arc<dyn Upstream> = Arc::new(HttpUpstream::new(url.clone(), timeout)?);
        return Ok(Arc::new(ProxyHandler::new(upstream)));
    }

    if let Some(command) = &settings.bridge.upstream_command {
        let upstream = StdioUpstream::new(command.clone(), settings.bridge.upstream_args.clone(), timeout);
        info!("Bridging to stdio upstream '{}'", upstream.describe());
        return Ok(Arc::new(ProxyHandler::new(Arc::new(upstream))));
    }

    let registry = builtin_registry()?;
    info!("Serving {} built-in tools", registry.len());
    let server_info = ServerInfo {
        name: settings.server.name.clone(),
        version: settings.server.version.clone(),
    };
    Ok(Arc::new(
        ProtocolHandler::new(Arc::new(registry), server_info).with_call_timeout(settings.call_timeout()),
    ))
}
