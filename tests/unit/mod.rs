// Unit tests for mcp-bridge
// This module organizes all unit tests

pub mod session_manager;
