// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Relaying MCP traffic to another MCP server.
//!
//! A [`ProxyHandler`] is an `McpHandler` like any other, so every transport
//! adapter can front an upstream without knowing it is one.

pub mod http;
pub mod proxy;
pub mod sse;
pub mod stdio;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

pub use http::HttpUpstream;
pub use proxy::ProxyHandler;
pub use stdio::StdioUpstream;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Failed to reach upstream: {0}")]
    Connect(String),
    #[error("Upstream did not reply within {0:?}")]
    Timeout(Duration),
    #[error("Upstream answered with HTTP status {0}")]
    Status(u16),
    #[error("Malformed upstream reply: {0}")]
    MalformedReply(String),
    #[error("Upstream I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to start upstream process '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// The far side of a bridge.
///
/// `forward` sends one JSON-RPC message unchanged and returns the upstream's
/// reply, or `None` when the upstream acknowledges without replying (as it
/// does for notifications).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn forward(&self, message: Value) -> Result<Option<Value>, BridgeError>;

    /// Human-readable target for logs.
    fn describe(&self) -> String;
}
