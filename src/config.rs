// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::env;
use std::time::Duration;

use config::{Environment, File};
use log::warn;
use serde::{Deserialize, Serialize};

/// Which transport adapter wraps the handler at startup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    Stdio,
    Http,
    Sse,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SseConfig {
    /// Seconds of idle stream before a `:keepalive` frame is written.
    pub keepalive_secs: u64,
    /// SSE `event:` name for JSON-RPC frames.
    pub message_event: String,
    /// Outbound events a session may hold before POSTs are refused. 0 = no cap.
    pub max_queue_depth: usize,
    /// Milliseconds between liveness writes on an idle stream, at most 1000.
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    pub call_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    /// Relay to an MCP server over HTTP POST.
    pub upstream_url: Option<String>,
    /// Relay to an MCP server spawned as a child speaking stdio.
    pub upstream_command: Option<String>,
    #[serde(default)]
    pub upstream_args: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub interface: InterfaceType,
    pub log: LogConfig,
    pub server: ServerConfig,
    pub http: HttpConfig,
    pub sse: SseConfig,
    pub tools: ToolsConfig,
    pub bridge: BridgeConfig,
}

impl Settings {
    pub fn new(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let defaults = Settings::default();
        let mut config_builder = config::Config::builder()
            .set_default("interface", "stdio")?
            .set_default("log.level", defaults.log.level)?
            .set_default("server.name", defaults.server.name)?
            .set_default("server.version", defaults.server.version)?
            .set_default("http.host", defaults.http.host)?
            .set_default("http.port", i64::from(defaults.http.port))?
            .set_default("sse.keepalive_secs", defaults.sse.keepalive_secs as i64)?
            .set_default("sse.message_event", defaults.sse.message_event)?
            .set_default("sse.max_queue_depth", defaults.sse.max_queue_depth as i64)?
            .set_default("sse.poll_interval_ms", defaults.sse.poll_interval_ms as i64)?
            .set_default("tools.call_timeout_secs", defaults.tools.call_timeout_secs as i64)?
            .set_default("bridge.timeout_secs", defaults.bridge.timeout_secs as i64)?;

        if let Some(path) = config_path {
            config_builder = config_builder.add_source(File::with_name(path));
        }

        // e.g. `MCP_BRIDGE_HTTP__PORT=9000` overrides `http.port`
        config_builder = config_builder.add_source(
            Environment::with_prefix("MCP_BRIDGE")
                .prefix_separator("_")
                .separator("__")
                .ignore_empty(true),
        );

        // Short names kept for compatibility with existing launch scripts
        let env_vars = [
            ("MCP_HOST", "http.host"),
            ("MCP_PORT", "http.port"),
            ("MCP_BACKEND_URL", "bridge.upstream_url"),
            ("MCP_TIMEOUT", "bridge.timeout_secs"),
        ];

        for (env_var, config_path) in &env_vars {
            if let Ok(value) = env::var(env_var) {
                if *env_var == "MCP_PORT" {
                    match value.parse::<u16>() {
                        Ok(port) => config_builder = config_builder.set_override(config_path, i64::from(port))?,
                        Err(_) => warn!("Invalid port value in {}: {}", env_var, value),
                    }
                } else if *env_var == "MCP_TIMEOUT" {
                    match value.parse::<u32>() {
                        Ok(secs) => config_builder = config_builder.set_override(config_path, i64::from(secs))?,
                        Err(_) => warn!("Invalid timeout value in {}: {}", env_var, value),
                    }
                } else {
                    config_builder = config_builder.set_override(config_path, value)?;
                }
            }
        }

        config_builder.build()?.try_deserialize()
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.tools.call_timeout_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.sse.keepalive_secs.max(1))
    }

    /// Idle write cadence that bounds disconnect detection to a second or less.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.sse.poll_interval_ms.clamp(10, 1000))
    }

    pub fn bridge_timeout(&self) -> Duration {
        Duration::from_secs(self.bridge.timeout_secs)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig { level: "info".to_string() }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9437,
        }
    }
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: 30,
            message_event: "mcp-json-rpc-2.0".to_string(),
            max_queue_depth: 0,
            poll_interval_ms: 1000,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self { call_timeout_secs: 30 }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            upstream_url: None,
            upstream_command: None,
            upstream_args: Vec::new(),
            timeout_secs: 30,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interface: InterfaceType::Stdio,
            log: LogConfig::default(),
            server: ServerConfig::default(),
            http: HttpConfig::default(),
            sse: SseConfig::default(),
            tools: ToolsConfig::default(),
            bridge: BridgeConfig::default(),
        }
    }
}
