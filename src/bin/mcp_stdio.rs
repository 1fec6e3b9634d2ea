// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/// MCP stdio proxy - forwards JSON-RPC from stdin to an MCP HTTP endpoint
///
/// Reads one JSON-RPC message per line, POSTs it to the backend and writes the
/// reply back as one line. Backend failures become JSON-RPC errors carrying
/// the request's id.
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::info;

use mcp_bridge::api::mcp_stdio::run_stdio_service;
use mcp_bridge::bridge::{HttpUpstream, ProxyHandler};
use mcp_bridge::cli::{init_logging, StartupError};
use mcp_bridge::config::Settings;

#[derive(Parser, Debug)]
#[command(version, about = "MCP stdio proxy - forwards JSON-RPC over stdin/stdout to HTTP backend", long_about = None)]
struct Cli {
    /// Backend MCP server URL.
    #[arg(long, env = "MCP_BACKEND_URL")]
    backend_url: String,

    /// Request timeout in seconds.
    #[arg(long, env = "MCP_TIMEOUT", default_value = "30")]
    timeout: u64,

    /// Path to the configuration file.
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let cli = Cli::parse();
    let settings = Settings::new(cli.config.as_deref())?;
    init_logging(&settings);

    info!("MCP stdio proxy starting, backend {} (timeout {}s)", cli.backend_url, cli.timeout);

    let upstream = HttpUpstream::new(cli.backend_url, Duration::from_secs(cli.timeout))?;
    let handler = Arc::new(ProxyHandler::new(Arc::new(upstream)));
    run_stdio_service(handler).await?;
    Ok(())
}
