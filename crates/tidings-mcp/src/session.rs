//! Client-side MCP session over a [`Transport`].
//!
//! Drives the handshake (`initialize` + `notifications/initialized`), caches
//! the server's tools from `tools/list`, and performs `tools/call`. Requests
//! carry a monotonically increasing id; responses are matched by id, not by
//! arrival order.

use crate::error::McpError;
use crate::jsonrpc::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId};
use crate::protocol::{
    CallToolParams, Implementation, InitializeParams, InitializeResult, ListToolsResult,
    PROTOCOL_VERSION, methods,
};
use crate::transport::Transport;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tidings_types::{Arguments, ToolCallResult, ToolDescriptor, validate_arguments};

/// Where a session is in its lifecycle. There is no way out of `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Handshaking,
    Ready,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Handshaking => "handshaking",
            SessionState::Ready => "ready",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Client identity and time bounds for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub client_info: Implementation,
    /// Bound on each handshake round trip (`initialize`, `tools/list`).
    pub handshake_timeout: Duration,
    /// Optional bound on each later response. Not part of the wire format.
    pub request_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            client_info: Implementation::new("tidings", env!("CARGO_PKG_VERSION")),
            handshake_timeout: Duration::from_secs(30),
            request_timeout: None,
        }
    }
}

/// A request written to the transport and still awaiting its response.
#[derive(Debug)]
struct PendingCall {
    method: String,
    sent_at: Instant,
}

/// One client session with one server, from handshake to close.
pub struct Session {
    transport: Box<dyn Transport>,
    options: SessionOptions,
    state: SessionState,
    next_id: u64,
    pending: HashMap<u64, PendingCall>,
    /// Responses that arrived while a different id was being awaited.
    arrived: HashMap<u64, JsonRpcResponse>,
    tools: Vec<ToolDescriptor>,
    server_info: Option<Implementation>,
}

impl Session {
    /// Wrap a transport. Nothing is sent until [`Session::initialize`].
    pub fn new(transport: Box<dyn Transport>, options: SessionOptions) -> Self {
        Self {
            transport,
            options,
            state: SessionState::Uninitialized,
            next_id: 1,
            pending: HashMap::new(),
            arrived: HashMap::new(),
            tools: Vec::new(),
            server_info: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Server identity reported during the handshake.
    pub fn server_info(&self) -> Option<&Implementation> {
        self.server_info.as_ref()
    }

    /// Perform the handshake and discover the server's tools.
    ///
    /// On any failure the session is closed before the error is returned.
    pub async fn initialize(&mut self) -> Result<(), McpError> {
        if self.state != SessionState::Uninitialized {
            return Err(McpError::IllegalState {
                operation: "initialize",
                state: self.state,
            });
        }
        self.state = SessionState::Handshaking;

        match self.handshake().await {
            Ok(()) => {
                self.state = SessionState::Ready;
                tracing::info!(
                    server = self.server_info.as_ref().map(|s| s.name.as_str()).unwrap_or(""),
                    tools = self.tools.len(),
                    "MCP session ready"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!("MCP handshake failed: {e}");
                if let Err(close_err) = self.close().await {
                    tracing::warn!("Failed to close session after handshake failure: {close_err}");
                }
                Err(e)
            }
        }
    }

    async fn handshake(&mut self) -> Result<(), McpError> {
        let limit = self.options.handshake_timeout;
        let timeout_ms = limit.as_millis() as u64;

        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: serde_json::json!({}),
            client_info: self.options.client_info.clone(),
        };
        let result = tokio::time::timeout(
            limit,
            self.request(methods::INITIALIZE, Some(serde_json::to_value(params)?)),
        )
        .await
        .map_err(|_| McpError::HandshakeTimeout { timeout_ms })??;

        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("malformed initialize response: {e}")))?;
        if init.protocol_version != PROTOCOL_VERSION {
            return Err(McpError::Protocol(format!(
                "server speaks protocol version {}, expected {PROTOCOL_VERSION}",
                init.protocol_version
            )));
        }
        if init.capabilities.tools.is_none() {
            tracing::debug!("server did not advertise the tools capability");
        }
        self.server_info = Some(init.server_info);

        self.notify(methods::INITIALIZED, None).await?;

        let listed = tokio::time::timeout(limit, self.request(methods::TOOLS_LIST, None))
            .await
            .map_err(|_| McpError::HandshakeTimeout { timeout_ms })??;
        let listed: ListToolsResult = serde_json::from_value(listed)
            .map_err(|e| McpError::Protocol(format!("Failed to parse tools/list response: {e}")))?;
        self.tools = listed.tools;
        Ok(())
    }

    /// The tools discovered during the handshake. No round trip.
    pub fn list_tools(&self) -> Result<&[ToolDescriptor], McpError> {
        self.ensure_ready("list tools")?;
        Ok(&self.tools)
    }

    /// Invoke a tool by name.
    ///
    /// Unknown names and schema mismatches fail locally without writing
    /// anything. A tool that reports failure yields `Ok` with `is_error` set.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Arguments,
    ) -> Result<ToolCallResult, McpError> {
        self.ensure_ready("call a tool")?;

        let descriptor = self
            .tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| McpError::UnknownTool {
                name: name.to_string(),
            })?;
        validate_arguments(&descriptor.input_schema, &arguments).map_err(|source| {
            McpError::InvalidArguments {
                tool: name.to_string(),
                source,
            }
        })?;

        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;
        let result = self.request(methods::TOOLS_CALL, Some(params)).await?;

        serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Failed to parse tools/call result: {e}")))
    }

    /// Write a request and return its id without waiting for the response.
    pub async fn send_request(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<u64, McpError> {
        if !matches!(
            self.state,
            SessionState::Handshaking | SessionState::Ready
        ) {
            return Err(McpError::IllegalState {
                operation: "send a request",
                state: self.state,
            });
        }

        let id = self.next_id;
        self.next_id += 1;
        let frame = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        self.pending.insert(
            id,
            PendingCall {
                method: method.to_string(),
                sent_at: Instant::now(),
            },
        );
        if let Err(e) = self.transport.send(&frame).await {
            self.pending.remove(&id);
            return Err(self.fail(e).await);
        }
        tracing::debug!(id, method, "sent request");
        Ok(id)
    }

    /// Wait for the response to request `id`.
    ///
    /// Responses to other pending requests that arrive first are kept until
    /// their own id is awaited.
    pub async fn wait_for(&mut self, id: u64) -> Result<JsonRpcResponse, McpError> {
        if self.state == SessionState::Closed {
            return Err(McpError::Protocol("session closed".to_string()));
        }
        if let Some(response) = self.arrived.remove(&id) {
            self.complete(id);
            return Ok(response);
        }
        if !self.pending.contains_key(&id) {
            return Err(McpError::Protocol(format!("no pending request with id {id}")));
        }

        loop {
            let frame = match self.receive_frame().await {
                Ok(frame) => frame,
                Err(e @ McpError::Timeout { .. }) => {
                    self.pending.remove(&id);
                    return Err(e);
                }
                Err(e) => return Err(self.fail(e).await),
            };

            let value: serde_json::Value = match serde_json::from_str(&frame) {
                Ok(value) => value,
                Err(e) => {
                    let err = McpError::Protocol(format!("malformed frame from server: {e}"));
                    return Err(self.fail(err).await);
                }
            };
            if value.get("method").is_some() {
                tracing::debug!("ignoring server-initiated message: {frame}");
                continue;
            }
            let response: JsonRpcResponse = match serde_json::from_value(value) {
                Ok(response) => response,
                Err(e) => {
                    let err = McpError::Protocol(format!("malformed response from server: {e}"));
                    return Err(self.fail(err).await);
                }
            };

            let rid = match &response.id {
                Some(RequestId::Number(rid)) => *rid,
                Some(other) => {
                    tracing::warn!(id = %other, "dropping response with a foreign id");
                    continue;
                }
                None => {
                    tracing::warn!(
                        "server reported an error without an id: {:?}",
                        response.error.as_ref().map(|e| e.message.as_str())
                    );
                    continue;
                }
            };

            match rid {
                rid if rid == id => {
                    self.complete(id);
                    return Ok(response);
                }
                rid if self.pending.contains_key(&rid) => {
                    tracing::debug!(id = rid, awaiting = id, "response arrived out of order");
                    self.arrived.insert(rid, response);
                }
                rid => {
                    tracing::warn!(id = rid, "dropping response for unknown request id");
                }
            }
        }
    }

    /// Close the session and its transport. Idempotent.
    ///
    /// Requests still pending fail with `Protocol("session closed")` when
    /// awaited.
    pub async fn close(&mut self) -> Result<(), McpError> {
        if !self.pending.is_empty() {
            tracing::debug!(count = self.pending.len(), "abandoning pending requests");
        }
        self.pending.clear();
        self.arrived.clear();
        self.state = SessionState::Closed;
        self.transport.close().await
    }

    async fn request(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, McpError> {
        let id = self.send_request(method, params).await?;
        let response = self.wait_for(id).await?;

        if let Some(err) = response.error {
            return Err(McpError::JsonRpc {
                code: err.code,
                message: err.message,
            });
        }
        response.result.ok_or_else(|| {
            McpError::Protocol(format!("{method} response has neither result nor error"))
        })
    }

    async fn notify(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        let frame = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        if let Err(e) = self.transport.send(&frame).await {
            return Err(self.fail(e).await);
        }
        Ok(())
    }

    async fn receive_frame(&mut self) -> Result<String, McpError> {
        let limit = match self.state {
            SessionState::Ready => self.options.request_timeout,
            _ => None,
        };
        match limit {
            Some(limit) => tokio::time::timeout(limit, self.transport.receive())
                .await
                .map_err(|_| McpError::Timeout {
                    operation: "a response".to_string(),
                    timeout_ms: limit.as_millis() as u64,
                })?,
            None => self.transport.receive().await,
        }
    }

    fn complete(&mut self, id: u64) {
        if let Some(call) = self.pending.remove(&id) {
            tracing::debug!(
                id,
                method = %call.method,
                elapsed_ms = call.sent_at.elapsed().as_millis() as u64,
                "response received"
            );
        }
    }

    /// A channel-level failure ends the session.
    async fn fail(&mut self, error: McpError) -> McpError {
        tracing::warn!("MCP session failed: {error}");
        if let Err(close_err) = self.close().await {
            tracing::warn!("Failed to close transport: {close_err}");
        }
        error
    }

    fn ensure_ready(&self, operation: &'static str) -> Result<(), McpError> {
        if self.state == SessionState::Ready {
            Ok(())
        } else {
            Err(McpError::IllegalState {
                operation,
                state: self.state,
            })
        }
    }
}

/// The slice of a session the orchestrator needs: discovered tools and calls.
pub trait ToolCaller: Send {
    fn tools(&self) -> Result<&[ToolDescriptor], McpError>;

    fn call_tool<'a>(
        &'a mut self,
        name: &'a str,
        arguments: Arguments,
    ) -> BoxFuture<'a, Result<ToolCallResult, McpError>>;
}

impl ToolCaller for Session {
    fn tools(&self) -> Result<&[ToolDescriptor], McpError> {
        self.list_tools()
    }

    fn call_tool<'a>(
        &'a mut self,
        name: &'a str,
        arguments: Arguments,
    ) -> BoxFuture<'a, Result<ToolCallResult, McpError>> {
        Box::pin(Session::call_tool(self, name, arguments))
    }
}
