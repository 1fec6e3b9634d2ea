// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tools served when no upstream is configured.

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::mcp::{FnTool, NoArguments, RegistryError, SchemaRegistry, ToolDefinition, ToolError};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EchoArgs {
    /// Text returned unchanged.
    pub text: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ServerTime {
    /// RFC 3339 timestamp in UTC.
    pub utc: String,
    /// Seconds since the Unix epoch.
    pub unix: i64,
}

async fn echo(args: EchoArgs) -> Result<String, ToolError> {
    Ok(args.text)
}

async fn server_time(_: NoArguments) -> Result<ServerTime, ToolError> {
    let now = Utc::now();
    Ok(ServerTime {
        utc: now.to_rfc3339(),
        unix: now.timestamp(),
    })
}

pub fn register_builtin_tools(registry: &mut SchemaRegistry) -> Result<(), RegistryError> {
    registry.register_fn("echo", "Returns the given text unchanged", echo)?;
    registry.register(
        ToolDefinition::new::<NoArguments>(
            "server_time",
            "Returns the server's current time",
            FnTool::new(server_time),
        )?
        .with_output::<ServerTime>(),
    )
}

/// A registry holding only the built-in tools.
pub fn builtin_registry() -> Result<SchemaRegistry, RegistryError> {
    let mut registry = SchemaRegistry::new();
    register_builtin_tools(&mut registry)?;
    Ok(registry)
}
