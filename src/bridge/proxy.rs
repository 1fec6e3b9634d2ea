// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::Mutex as TokioMutex;

use super::{BridgeError, Upstream};
use crate::mcp::types::JSONRPC_VERSION;
use crate::mcp::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpHandler, McpPortState};

/// Relays every message to an [`Upstream`] and maps its reply back.
///
/// The client's request id is restored on the reply whatever the upstream
/// sent. Any upstream failure becomes a `-32603` response for requests and
/// is logged and dropped for notifications.
pub struct ProxyHandler {
    upstream: Arc<dyn Upstream>,
}

impl ProxyHandler {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }

    fn restore_reply(reply: Value, id: Option<Value>) -> Result<Value, BridgeError> {
        let Value::Object(mut obj) = reply else {
            return Err(BridgeError::MalformedReply("reply is not a JSON object".into()));
        };
        let has_result = obj.contains_key("result");
        let has_error = obj.contains_key("error");
        if has_result == has_error {
            return Err(BridgeError::MalformedReply(
                "reply must carry exactly one of 'result' or 'error'".into(),
            ));
        }
        if has_error && !obj.get("error").map(Value::is_object).unwrap_or(false) {
            return Err(BridgeError::MalformedReply("'error' is not an object".into()));
        }
        obj.insert("jsonrpc".into(), Value::String(JSONRPC_VERSION.to_string()));
        obj.insert("id".into(), id.unwrap_or(Value::Null));
        Ok(Value::Object(obj))
    }

    async fn record_initialize(state: &Arc<TokioMutex<McpPortState>>, request: &JsonRpcRequest, reply: &Value) {
        if request.method != "initialize" {
            return;
        }
        if let Some(result) = reply.get("result") {
            let mut state = state.lock().await;
            state.initialized = true;
            state.protocol_version = result
                .get("protocolVersion")
                .and_then(Value::as_str)
                .map(str::to_string);
            state.client_info = request.param("clientInfo").cloned();
            info!("Upstream session initialized ({:?})", state.protocol_version);
        }
    }
}

#[async_trait]
impl McpHandler for ProxyHandler {
    async fn handle_request(&self, state: Arc<TokioMutex<McpPortState>>, json_req: Value) -> Option<Value> {
        let request = match JsonRpcRequest::from_value(json_req.clone()) {
            Ok(request) => request,
            Err(response) => return Some(response.to_value()),
        };

        debug!("Relaying '{}' to {}", request.method, self.upstream.describe());
        let outcome = self.upstream.forward(json_req).await;

        if request.is_notification() {
            match outcome {
                Ok(Some(reply)) => debug!("Dropping upstream reply to notification: {}", reply),
                Ok(None) => {}
                Err(e) => warn!("Upstream failed on notification '{}': {}", request.method, e),
            }
            return None;
        }

        let restored = match outcome {
            Ok(Some(reply)) => Self::restore_reply(reply, request.id.clone()),
            Ok(None) => Err(BridgeError::MalformedReply("upstream sent no reply to a request".into())),
            Err(e) => Err(e),
        };

        match restored {
            Ok(reply) => {
                Self::record_initialize(&state, &request, &reply).await;
                Some(reply)
            }
            Err(e) => {
                warn!("Relaying '{}' failed: {}", request.method, e);
                Some(JsonRpcResponse::error(request.id, JsonRpcError::internal_error(format!("Upstream error: {}", e))).to_value())
            }
        }
    }
}
