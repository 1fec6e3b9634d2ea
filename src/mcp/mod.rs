// src/mcp/mod.rs

pub mod error_codes;
pub mod handler;
pub mod registry;
pub mod types;

// Re-export key types/traits for easier use
pub use error_codes::ErrorCode;
pub use handler::{discovery_document, handle_raw_message, McpHandler, ProtocolHandler, ServerInfo};
pub use registry::{FnTool, NoArguments, RegistryError, SchemaRegistry, ToolDefinition, ToolError, ToolHandler};
pub use types::{
    ContentItem, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, McpPortState,
    ToolCallResult,
};
