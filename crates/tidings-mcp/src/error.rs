//! Error types for MCP operations.

use crate::session::SessionState;
use thiserror::Error;
use tidings_types::SchemaError;

/// Channel, protocol and local precondition failures.
///
/// A tool reporting failure is not one of these: that arrives as a
/// `ToolCallResult` with `is_error` set.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Failed to spawn MCP server '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timed out after {timeout_ms}ms waiting for {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("MCP handshake timed out after {timeout_ms}ms")]
    HandshakeTimeout { timeout_ms: u64 },

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("JSON-RPC error (code {code}): {message}")]
    JsonRpc { code: i64, message: String },

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Cannot {operation} while the session is {state}")]
    IllegalState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Invalid arguments for tool '{tool}': {source}")]
    InvalidArguments { tool: String, source: SchemaError },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// Whether this failure was raised locally, before anything was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            McpError::UnknownTool { .. }
                | McpError::IllegalState { .. }
                | McpError::InvalidArguments { .. }
        )
    }
}
