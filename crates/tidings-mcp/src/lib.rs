//! MCP-style tool protocol for Tidings.
//!
//! Client and server exchange newline-delimited JSON-RPC 2.0 messages over a
//! child process's stdio. The client side is a [`Session`] layered on a
//! [`Transport`]; the server side is an [`McpServer`] dispatching into a
//! [`ToolRegistry`]. [`lifecycle::run`] ties session teardown to scope.

pub mod codec;
pub mod config;
pub mod error;
pub mod jsonrpc;
pub mod lifecycle;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ServerLaunchConfig;
pub use error::McpError;
pub use lifecycle::{LifecycleStack, Resource, run};
pub use protocol::{Implementation, PROTOCOL_VERSION};
pub use registry::ToolRegistry;
pub use server::McpServer;
pub use session::{Session, SessionOptions, SessionState, ToolCaller};
pub use transport::{StdioTransport, Transport, TransportOptions};
