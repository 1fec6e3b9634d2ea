// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Standard JSON-RPC 2.0 error codes
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,

    // MCP server errors (-32000 to -32099)
    ServerNotInitialized = -32002,
}

impl ErrorCode {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::InternalError => "Internal error",
            ErrorCode::ServerNotInitialized => "Server not initialized",
        }
    }
}

// Constants for common error codes
pub const PARSE_ERROR: i32 = ErrorCode::ParseError as i32;
pub const INVALID_REQUEST: i32 = ErrorCode::InvalidRequest as i32;
pub const METHOD_NOT_FOUND: i32 = ErrorCode::MethodNotFound as i32;
pub const INVALID_PARAMS: i32 = ErrorCode::InvalidParams as i32;
pub const INTERNAL_ERROR: i32 = ErrorCode::InternalError as i32;
pub const SERVER_NOT_INITIALIZED: i32 = ErrorCode::ServerNotInitialized as i32;
