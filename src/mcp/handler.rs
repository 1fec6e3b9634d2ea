// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

// src/mcp/handler.rs

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use log::{debug, info, warn};
use serde_json::{json, Value};
use tokio::sync::Mutex as TokioMutex;

use crate::mcp::error_codes::ErrorCode;
use crate::mcp::registry::{SchemaRegistry, ToolError};
use crate::mcp::types::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpPortState, ToolCallResult,
    LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS,
};
#[cfg(test)] // Only import mockall for tests
use mockall::automock;

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Defines the asynchronous interface for handling MCP (JSON-RPC 2.0) messages.
///
/// Transport adapters (stdio, HTTP, SSE) decode bytes into a JSON value and
/// hand it to an implementation of this trait together with the state of the
/// connection it arrived on. The local [`ProtocolHandler`] answers from a
/// tool registry; the bridge's `ProxyHandler` relays to another MCP server.
///
/// # Returns
///
/// `Some` with a serialized `JsonRpcResponse` for requests, `None` for
/// notifications. Implementations never fail: every error is folded into a
/// JSON-RPC error response.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait McpHandler: Send + Sync {
    async fn handle_request(&self, state: Arc<TokioMutex<McpPortState>>, json_req: Value) -> Option<Value>;
}

/// Decodes one raw message and runs it through `handler`.
///
/// Undecodable input yields a single `-32700` response with a null id.
pub async fn handle_raw_message(
    handler: &dyn McpHandler,
    state: Arc<TokioMutex<McpPortState>>,
    raw: &str,
) -> Option<Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => handler.handle_request(state, value).await,
        Err(e) => {
            warn!("Failed to parse JSON-RPC message: {}", e);
            Some(JsonRpcResponse::parse_error(e).to_value())
        }
    }
}

/// Builds the payload served on `GET /mcp`.
///
/// This is a compatibility shim for clients that send a GET before
/// talking JSON-RPC: it runs an `initialize` + `tools/list` pair against a
/// throwaway connection state and merges both results.
pub async fn discovery_document(handler: &dyn McpHandler) -> Value {
    let state = Arc::new(TokioMutex::new(McpPortState::new()));

    let init = handler
        .handle_request(
            state.clone(),
            json!({
                "jsonrpc": "2.0",
                "id": "discovery-initialize",
                "method": "initialize",
                "params": {
                    "protocolVersion": LATEST_PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": { "name": "http-discovery", "version": env!("CARGO_PKG_VERSION") }
                }
            }),
        )
        .await;
    let tools = handler
        .handle_request(
            state,
            json!({ "jsonrpc": "2.0", "id": "discovery-tools", "method": "tools/list" }),
        )
        .await;

    let (Some(init), Some(tools)) = (init, tools) else {
        return JsonRpcResponse::error(None, JsonRpcError::internal_error("discovery produced no response"))
            .to_value();
    };
    for resp in [&init, &tools] {
        if let Some(err) = resp.get("error") {
            return json!({ "jsonrpc": "2.0", "id": null, "error": err });
        }
    }

    let mut result = init.get("result").cloned().unwrap_or_else(|| json!({}));
    if let Value::Object(ref mut obj) = result {
        obj.insert(
            "tools".into(),
            tools["result"]["tools"].clone(),
        );
    }
    json!({ "jsonrpc": "2.0", "result": result })
}

/// Name and version reported in `serverInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// The request router for locally registered tools.
///
/// Holds no per-connection state of its own; everything connection-scoped
/// lives in the `McpPortState` passed with each message.
pub struct ProtocolHandler {
    registry: Arc<SchemaRegistry>,
    server_info: ServerInfo,
    call_timeout: Duration,
}

impl ProtocolHandler {
    pub fn new(registry: Arc<SchemaRegistry>, server_info: ServerInfo) -> Self {
        Self {
            registry,
            server_info,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Sets the deadline applied to tools that don't declare their own.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    async fn dispatch(
        &self,
        state: Arc<TokioMutex<McpPortState>>,
        request: JsonRpcRequest,
    ) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            self.handle_notification(state, &request).await;
            return None;
        }

        debug!("Dispatching '{}' id={:?}", request.method, request.id);
        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.handle_initialize(state, &request).await),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.handle_tools_list()),
            "tools/call" => self.handle_tools_call(state, &request).await,
            other => {
                warn!("MCP Method not found: {}", other);
                Err(JsonRpcError::method_not_found(other))
            }
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(error) => JsonRpcResponse::error(request.id, error),
        })
    }

    async fn handle_notification(&self, state: Arc<TokioMutex<McpPortState>>, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => {
                let mut state = state.lock().await;
                state.initialized = true;
                info!("Client confirmed initialization");
            }
            "notifications/cancelled" => {
                debug!("Ignoring cancellation notice; in-flight calls run to completion");
            }
            other => debug!("Ignoring notification '{}'", other),
        }
    }

    async fn handle_initialize(&self, state: Arc<TokioMutex<McpPortState>>, request: &JsonRpcRequest) -> Value {
        let requested = request.param("protocolVersion").and_then(Value::as_str);
        let version = match requested {
            Some(v) if SUPPORTED_PROTOCOL_VERSIONS.contains(&v) => v.to_string(),
            Some(v) => {
                warn!(
                    "Client requested unsupported protocol version {}, offering {}",
                    v, LATEST_PROTOCOL_VERSION
                );
                LATEST_PROTOCOL_VERSION.to_string()
            }
            None => LATEST_PROTOCOL_VERSION.to_string(),
        };

        {
            let mut state = state.lock().await;
            state.initialized = true;
            state.protocol_version = Some(version.clone());
            state.client_info = request.param("clientInfo").cloned();
        }
        info!("Initialized session with protocol version {}", version);

        json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": { "listChanged": true }
            },
            "serverInfo": {
                "name": self.server_info.name,
                "version": self.server_info.version
            }
        })
    }

    fn handle_tools_list(&self) -> Value {
        json!({ "tools": self.registry.descriptors() })
    }

    async fn handle_tools_call(
        &self,
        state: Arc<TokioMutex<McpPortState>>,
        request: &JsonRpcRequest,
    ) -> Result<Value, JsonRpcError> {
        if !state.lock().await.initialized {
            return Err(JsonRpcError::server_not_initialized());
        }

        let name = request
            .param("name")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonRpcError::invalid_params("tools/call requires a string 'name'"))?;

        let tool = self.registry.get(name).map_err(|_| {
            warn!("Unknown tool requested: {}", name);
            JsonRpcError::new(ErrorCode::MethodNotFound, format!("Unknown tool: {}", name))
        })?;

        let arguments = match request.param("arguments") {
            None | Some(Value::Null) => json!({}),
            Some(args) => args.clone(),
        };

        tool.validate(&arguments).map_err(|details| {
            warn!("Arguments for '{}' failed validation", name);
            JsonRpcError::invalid_params(format!("arguments for '{}' do not match its input schema", name))
                .with_data(details)
        })?;

        let deadline = tool.timeout().unwrap_or(self.call_timeout);
        let handler = tool.handler();
        let call = AssertUnwindSafe(handler.call(arguments)).catch_unwind();

        let value = match tokio::time::timeout(deadline, call).await {
            Err(_) => {
                warn!("Tool '{}' exceeded its {:?} deadline", name, deadline);
                return Err(JsonRpcError::internal_error(ToolError::Timeout(deadline)));
            }
            Ok(Err(panic)) => {
                let reason = panic_message(panic.as_ref());
                warn!("Tool '{}' panicked: {}", name, reason);
                return Err(JsonRpcError::internal_error(format!("tool '{}' panicked: {}", name, reason)));
            }
            Ok(Ok(Err(ToolError::InvalidArguments(msg)))) => {
                return Err(JsonRpcError::invalid_params(msg));
            }
            Ok(Ok(Err(e))) => {
                warn!("Tool '{}' failed: {}", name, e);
                return Err(JsonRpcError::internal_error(e));
            }
            Ok(Ok(Ok(value))) => value,
        };

        info!("Tool '{}' executed successfully", name);
        let structured = tool.output_schema().is_some() && value.is_object() && value.get("content").is_none();
        let mut result = ToolCallResult::from_value(value.clone());
        if structured {
            result.structured_content = Some(value);
        }
        serde_json::to_value(result).map_err(JsonRpcError::internal_error)
    }
}

#[async_trait]
impl McpHandler for ProtocolHandler {
    async fn handle_request(&self, state: Arc<TokioMutex<McpPortState>>, json_req: Value) -> Option<Value> {
        let request = match JsonRpcRequest::from_value(json_req) {
            Ok(request) => request,
            Err(response) => {
                warn!("Rejected malformed JSON-RPC envelope");
                return Some(response.to_value());
            }
        };
        self.dispatch(state, request).await.map(|resp| resp.to_value())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
