//! Error hierarchy for Tidings.

use thiserror::Error;

/// Errors raised by a tool handler while executing.
///
/// These never cross the wire as faults: the registry converts them into
/// `is_error` results at the dispatch boundary.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid input for tool '{tool}': {message}")]
    InvalidInput { tool: String, message: String },

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("{what} is not configured")]
    NotConfigured { what: String },

    #[error("Upstream service error: {0}")]
    Api(#[from] ApiError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the HTTP collaborators (search and completion services).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Server error: {status} {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Request timeout")]
    Timeout,
}

/// Errors from the mail collaborator.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("attachment not found: {path}")]
    MissingAttachment { path: String },

    #[error("mail credentials are not configured (set SMTP_SERVER, EMAIL_USER and EMAIL_PASS)")]
    MissingCredentials,

    #[error("invalid address '{address}': {message}")]
    InvalidAddress { address: String, message: String },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from configuration loading and server startup wiring.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file parse error at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Missing required configuration: {key}")]
    MissingKey { key: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Tool '{name}' is registered more than once")]
    DuplicateTool { name: String },
}
