// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::Parser;
use log::{error, info};

use mcp_bridge::api::mcp_stdio::run_stdio_service;
use mcp_bridge::api::run_server;
use mcp_bridge::cli::{build_handler, init_logging, Cli, StartupError};
use mcp_bridge::config::InterfaceType;

#[actix_web::main]
async fn main() -> Result<(), StartupError> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;
    init_logging(&settings);

    info!(
        "Starting {} v{} in {:?} mode",
        settings.server.name, settings.server.version, settings.interface
    );

    let handler = build_handler(&settings)?;

    let outcome = match settings.interface {
        InterfaceType::Stdio => run_stdio_service(handler).await,
        InterfaceType::Http | InterfaceType::Sse => run_server(&settings, handler).await,
    };

    if let Err(e) = &outcome {
        error!("Transport stopped with error: {}", e);
    }
    info!("Shutting down");
    outcome.map_err(StartupError::from)
}
