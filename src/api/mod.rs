//! Transport adapters wrapping an `McpHandler`.

pub mod mcp_http;
pub mod mcp_sse;
pub mod mcp_stdio;
pub mod routes;

pub use routes::{run_server, start_server, McpServerState};
