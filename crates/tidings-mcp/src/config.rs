//! How the client launches and talks to its server process.

use crate::error::McpError;
use crate::session::{Session, SessionOptions};
use crate::transport::{StdioTransport, TransportOptions};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

fn default_command() -> String {
    "tidings-server".to_string()
}

fn default_handshake_timeout() -> u64 {
    30000
}

fn default_shutdown_grace() -> u64 {
    5000
}

/// Launch settings for the server subprocess (`[server]` in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerLaunchConfig {
    /// Executable to spawn.
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment for the server process, on top of the inherited one.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Bound on each handshake round trip (default: 30000).
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_ms: u64,
    /// Bound on each later response. Unset waits indefinitely.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// How long close waits for the server to exit before killing it (default: 5000).
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,
}

impl Default for ServerLaunchConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
            env: HashMap::new(),
            handshake_timeout_ms: default_handshake_timeout(),
            request_timeout_ms: None,
            shutdown_grace_ms: default_shutdown_grace(),
        }
    }
}

impl ServerLaunchConfig {
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
            ..TransportOptions::default()
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            request_timeout: self.request_timeout_ms.map(Duration::from_millis),
            ..SessionOptions::default()
        }
    }

    /// Spawn the server and wrap it in an uninitialized session.
    pub fn spawn_session(&self) -> Result<Session, McpError> {
        let transport =
            StdioTransport::spawn(&self.command, &self.args, &self.env, self.transport_options())?;
        Ok(Session::new(Box::new(transport), self.session_options()))
    }
}
