//! Server side of the protocol: reads requests from a line stream, dispatches
//! them, writes responses.

use crate::codec::{Frame, FrameCodec};
use crate::error::McpError;
use crate::jsonrpc::{JsonRpcMessage, JsonRpcResponse, RequestId, codes};
use crate::protocol::{
    CallToolParams, Implementation, InitializeParams, InitializeResult, ListToolsResult,
    PROTOCOL_VERSION, ServerCapabilities, ToolsCapability, methods,
};
use crate::registry::ToolRegistry;
use crate::transport::MAX_FRAME_BYTES;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::FramedRead;

/// Serves one client over a pair of byte streams.
///
/// Requests are handled one at a time. Neither a bad frame nor a tool failure
/// ends the loop; only EOF or an I/O error on the streams does.
pub struct McpServer {
    info: Implementation,
    registry: Arc<ToolRegistry>,
    instructions: Option<String>,
}

impl McpServer {
    pub fn new(info: Implementation, registry: ToolRegistry) -> Self {
        Self {
            info,
            registry: Arc::new(registry),
            instructions: None,
        }
    }

    /// Usage hint returned in the `initialize` result.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Serve on the process's own stdin/stdout until stdin closes.
    pub async fn serve_stdio(&self) -> Result<(), McpError> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve until `reader` reaches EOF.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<(), McpError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        // Raw bytes, so invalid UTF-8 is reported by the JSON parser
        let mut frames = FramedRead::new(reader, FrameCodec::new(MAX_FRAME_BYTES));
        let mut initialized = false;
        tracing::info!(server = %self.info.name, tools = self.registry.len(), "serving on stdio");

        while let Some(next) = frames.next().await {
            let frame = match next? {
                Frame::Line(frame) => frame,
                Frame::Oversized => {
                    tracing::warn!("discarding oversized frame");
                    let reply =
                        JsonRpcResponse::failure(None, codes::INVALID_REQUEST, "Frame too large");
                    write_response(&mut writer, &reply).await?;
                    continue;
                }
            };
            if frame.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            if let Some(reply) = self.handle_frame(&frame, &mut initialized).await {
                write_response(&mut writer, &reply).await?;
            }
        }

        tracing::info!("client closed stdin, shutting down");
        Ok(())
    }

    async fn handle_frame(&self, frame: &[u8], initialized: &mut bool) -> Option<JsonRpcResponse> {
        let value: serde_json::Value = match serde_json::from_slice(frame) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("unparseable frame: {e}");
                return Some(JsonRpcResponse::failure(
                    None,
                    codes::PARSE_ERROR,
                    format!("Parse error: {e}"),
                ));
            }
        };

        let id_hint = value
            .get("id")
            .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());
        let message: JsonRpcMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("frame is not a request: {e}");
                return Some(JsonRpcResponse::failure(
                    id_hint,
                    codes::INVALID_REQUEST,
                    format!("Invalid request: {e}"),
                ));
            }
        };

        let Some(id) = message.id else {
            if message.method == methods::INITIALIZED {
                tracing::debug!("client finished initialization");
            } else {
                tracing::debug!(method = %message.method, "ignoring notification");
            }
            return None;
        };

        if message.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::failure(
                Some(id),
                codes::INVALID_REQUEST,
                format!("Unsupported jsonrpc version '{}'", message.jsonrpc),
            ));
        }

        let reply = match message.method.as_str() {
            methods::INITIALIZE => {
                *initialized = true;
                self.initialize(id, message.params)
            }
            methods::PING => JsonRpcResponse::success(id, serde_json::json!({})),
            methods::TOOLS_LIST | methods::TOOLS_CALL if !*initialized => JsonRpcResponse::failure(
                Some(id),
                codes::SERVER_NOT_INITIALIZED,
                "Server not initialized",
            ),
            methods::TOOLS_LIST => {
                let result = ListToolsResult {
                    tools: self.registry.list(),
                };
                to_success(id, &result)
            }
            methods::TOOLS_CALL => self.call_tool(id, message.params).await,
            other => JsonRpcResponse::failure(
                Some(id),
                codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            ),
        };
        Some(reply)
    }

    fn initialize(&self, id: RequestId, params: Option<serde_json::Value>) -> JsonRpcResponse {
        match params.map(serde_json::from_value::<InitializeParams>) {
            Some(Ok(params)) => {
                if params.protocol_version != PROTOCOL_VERSION {
                    tracing::warn!(
                        client_version = %params.protocol_version,
                        "client requested a different protocol version, offering {PROTOCOL_VERSION}"
                    );
                }
                tracing::info!(client = %params.client_info.name, "client connected");
            }
            Some(Err(e)) => tracing::warn!("malformed initialize params: {e}"),
            None => tracing::debug!("initialize without params"),
        }

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: self.info.clone(),
            instructions: self.instructions.clone(),
        };
        to_success(id, &result)
    }

    async fn call_tool(&self, id: RequestId, params: Option<serde_json::Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params.map(serde_json::from_value) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::failure(
                    Some(id),
                    codes::INVALID_PARAMS,
                    format!("Invalid tools/call params: {e}"),
                );
            }
            None => {
                return JsonRpcResponse::failure(
                    Some(id),
                    codes::INVALID_PARAMS,
                    "tools/call requires params",
                );
            }
        };

        tracing::debug!(tool = %params.name, "dispatching tool call");
        let result = self.registry.dispatch(&params.name, params.arguments).await;
        if result.is_error {
            tracing::info!(tool = %params.name, "tool reported failure");
        }
        to_success(id, &result)
    }
}

fn to_success<T: serde::Serialize>(id: RequestId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::failure(
            Some(id),
            codes::INTERNAL_ERROR,
            format!("Failed to encode result: {e}"),
        ),
    }
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> Result<(), McpError> {
    let mut frame = serde_json::to_string(response)?;
    frame.push('\n');
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
