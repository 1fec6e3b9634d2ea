// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

// src/mcp/types.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::mcp::error_codes::ErrorCode;

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revisions this server speaks, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];
pub const LATEST_PROTOCOL_VERSION: &str = SUPPORTED_PROTOCOL_VERSIONS[0];

/// Per-connection state shared between a transport adapter and the handler.
///
/// Stdio keeps one for the lifetime of the process, SSE keeps one per
/// session. The HTTP adapter is stateless and builds a pre-initialized one
/// for every POST.
#[derive(Debug, Clone, Default)]
pub struct McpPortState {
    /// Set once `initialize` has been answered on this connection.
    pub initialized: bool,
    /// Protocol version agreed during `initialize`.
    pub protocol_version: Option<String>,
    /// `clientInfo` as sent by the client, kept for logging.
    pub client_info: Option<Value>,
    /// SSE session this state belongs to, if any.
    pub session_id: Option<String>,
}

impl McpPortState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    /// State for transports without a connection lifecycle (plain HTTP POST).
    pub fn stateless() -> Self {
        Self {
            initialized: true,
            ..Self::default()
        }
    }
}

/// Represents a JSON-RPC 2.0 request or notification.
///
/// `id` distinguishes the two: `None` means the member was absent and the
/// message is a notification. An explicit `null` id is kept as
/// `Some(Value::Null)` and still gets a response.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Validates the minimal envelope shape of a decoded message.
    ///
    /// On failure the returned response already carries the best id that
    /// could be recovered (or `null`).
    pub fn from_value(value: Value) -> Result<Self, JsonRpcResponse> {
        let Value::Object(mut obj) = value else {
            return Err(JsonRpcResponse::error(
                None,
                JsonRpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        let id = obj.remove("id");
        if let Some(ref raw) = id {
            if !(raw.is_string() || raw.is_number() || raw.is_null()) {
                return Err(JsonRpcResponse::error(
                    None,
                    JsonRpcError::invalid_request("id must be a string, number or null"),
                ));
            }
        }

        if let Some(version) = obj.get("jsonrpc") {
            if version.as_str() != Some(JSONRPC_VERSION) {
                return Err(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_request("jsonrpc must be \"2.0\""),
                ));
            }
        }

        let method = match obj.remove("method") {
            Some(Value::String(m)) => m,
            _ => {
                return Err(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_request("Missing or non-string method"),
                ))
            }
        };

        let params = match obj.remove("params") {
            None | Some(Value::Null) => None,
            Some(p @ (Value::Object(_) | Value::Array(_))) => Some(p),
            Some(_) => {
                return Err(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_request("params must be an object or array"),
                ))
            }
        };

        Ok(Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method,
            params,
        })
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Looks up a named member of object-shaped params.
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.as_ref().and_then(|p| p.get(key))
    }
}

/// Represents a JSON-RPC 2.0 response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(error),
        }
    }

    /// The `-32700` frame emitted when a message cannot be decoded at all.
    pub fn parse_error(detail: impl std::fmt::Display) -> Self {
        Self::error(None, JsonRpcError::parse_error(detail))
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("jsonrpc".into(), Value::String(self.jsonrpc.clone()));
        obj.insert("id".into(), self.id.clone());
        match (&self.result, &self.error) {
            (_, Some(err)) => {
                obj.insert("error".into(), err.to_value());
            }
            (Some(result), None) => {
                obj.insert("result".into(), result.clone());
            }
            (None, None) => {
                obj.insert("result".into(), Value::Null);
            }
        }
        Value::Object(obj)
    }
}

/// Represents a JSON-RPC 2.0 error object.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    /// Standard message for `code` followed by the specific detail.
    pub fn detailed(code: ErrorCode, detail: impl std::fmt::Display) -> Self {
        Self::new(code, format!("{}: {}", code.message(), detail))
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error(detail: impl std::fmt::Display) -> Self {
        Self::detailed(ErrorCode::ParseError, detail)
    }

    pub fn invalid_request(detail: impl std::fmt::Display) -> Self {
        Self::detailed(ErrorCode::InvalidRequest, detail)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::detailed(ErrorCode::MethodNotFound, method)
    }

    pub fn invalid_params(detail: impl std::fmt::Display) -> Self {
        Self::detailed(ErrorCode::InvalidParams, detail)
    }

    pub fn internal_error(detail: impl std::fmt::Display) -> Self {
        Self::detailed(ErrorCode::InternalError, detail)
    }

    pub fn server_not_initialized() -> Self {
        Self::detailed(ErrorCode::ServerNotInitialized, "send initialize first")
    }

    fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({ "code": self.code, "message": self.message })
        })
    }
}

/// A server-initiated JSON-RPC notification.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }

    pub fn tools_list_changed() -> Self {
        Self::new("notifications/tools/list_changed", None)
    }
}

/// One item of a tool result's `content` array.
///
/// Text and image items are typed. Any other `type` (`resource`, `audio`,
/// ...) is kept as the raw object so it reaches the client untouched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "Value", into = "Value")]
pub enum ContentItem {
    Text { text: String },
    Image { data: String, mime_type: String },
    Other(Map<String, Value>),
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        ContentItem::Text { text: text.into() }
    }
}

fn string_member(obj: &Map<String, Value>, key: &str) -> Result<String, String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("content item is missing string \"{}\"", key))
}

impl TryFrom<Value> for ContentItem {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(obj) = value else {
            return Err("content item must be an object".to_string());
        };
        match obj.get("type").and_then(Value::as_str) {
            Some("text") => Ok(ContentItem::Text {
                text: string_member(&obj, "text")?,
            }),
            Some("image") => Ok(ContentItem::Image {
                data: string_member(&obj, "data")?,
                mime_type: string_member(&obj, "mimeType")?,
            }),
            Some(_) => Ok(ContentItem::Other(obj)),
            None => Err("content item is missing \"type\"".to_string()),
        }
    }
}

impl From<ContentItem> for Value {
    fn from(item: ContentItem) -> Self {
        match item {
            ContentItem::Text { text } => serde_json::json!({ "type": "text", "text": text }),
            ContentItem::Image { data, mime_type } => {
                serde_json::json!({ "type": "image", "data": data, "mimeType": mime_type })
            }
            ContentItem::Other(obj) => Value::Object(obj),
        }
    }
}

/// The normalized shape every tool result is coerced into.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolCallResult {
    pub content: Vec<ContentItem>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

impl ToolCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
            is_error: false,
            structured_content: None,
        }
    }

    /// Coerces a handler's return value into a tool result.
    ///
    /// Values that already carry a valid `content` array pass through
    /// unchanged. Anything else becomes a single text item holding the
    /// value's JSON encoding, so a string result `"hi"` is sent as the
    /// text `"\"hi\""`.
    pub fn from_value(value: Value) -> Self {
        if let Some(content) = value.get("content") {
            if let Ok(items) = serde_json::from_value::<Vec<ContentItem>>(content.clone()) {
                return Self {
                    content: items,
                    is_error: value.get("isError").and_then(Value::as_bool).unwrap_or(false),
                    structured_content: value.get("structuredContent").cloned(),
                };
            }
        }
        let text = serde_json::to_string(&value).unwrap_or_else(|_| value.to_string());
        Self::text(text)
    }
}
