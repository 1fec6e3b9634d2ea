//! Library core for mcp-bridge: MCP protocol handling, the stdio, HTTP and
//! SSE transports, and bridges to upstream MCP servers.

// --- Modules ---
pub mod api;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod error;
pub mod mcp;
pub mod session_manager;
pub mod tools;

// CONSOLIDATED PRELUDE
pub mod prelude {
    // Config
    pub use crate::config::{InterfaceType, Settings};

    // MCP / JSON-RPC
    pub use crate::mcp::handler::McpHandler;
    pub use crate::mcp::registry::{SchemaRegistry, ToolDefinition, ToolError, ToolHandler};
    pub use crate::mcp::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpPortState};
    pub use crate::mcp::{ProtocolHandler, ServerInfo};

    // Transports and bridges
    pub use crate::bridge::{BridgeError, ProxyHandler, Upstream};
    pub use crate::session_manager::{SessionError, SessionManager};

    // Common Libs
    pub use log::{debug, error, info, trace, warn};
    pub use std::sync::Arc;
    pub use thiserror::Error;
    pub use tokio::sync::Mutex as TokioMutex;
}
