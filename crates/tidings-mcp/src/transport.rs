//! Framed transports for MCP communication.
//!
//! A [`Transport`] carries one newline-delimited JSON message at a time.
//! [`StdioTransport`] binds it to a child process's stdin/stdout.

use crate::codec::{Frame, FrameCodec};
use crate::error::McpError;
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;

/// Largest frame accepted from the server, in bytes.
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// A bidirectional channel carrying whole message frames.
///
/// Implementations own their underlying resources exclusively. `close` must be
/// idempotent.
pub trait Transport: Send {
    /// Write one complete frame. The frame must not contain a newline.
    fn send<'a>(&'a mut self, frame: &'a str) -> BoxFuture<'a, Result<(), McpError>>;

    /// Wait for the next complete frame.
    fn receive(&mut self) -> BoxFuture<'_, Result<String, McpError>>;

    /// Release the channel. Calling it again is a no-op.
    fn close(&mut self) -> BoxFuture<'_, Result<(), McpError>>;

    /// Whether `close` has already run.
    fn is_closed(&self) -> bool;
}

/// Tuning knobs for [`StdioTransport`].
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Upper bound on a single `receive`. `None` waits indefinitely.
    pub receive_timeout: Option<Duration>,
    /// How long `close` waits for the child to exit after stdin is closed.
    pub shutdown_grace: Duration,
    pub max_frame_bytes: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            receive_timeout: None,
            shutdown_grace: Duration::from_secs(5),
            max_frame_bytes: MAX_FRAME_BYTES,
        }
    }
}

/// Stdio transport over a spawned server process.
///
/// A background task reads stdout line by line and forwards frames over a
/// channel, so `receive` can be abandoned by a timeout without losing data.
pub struct StdioTransport {
    command: String,
    stdin: Option<ChildStdin>,
    frames: mpsc::Receiver<Result<String, McpError>>,
    reader_handle: Option<JoinHandle<()>>,
    child: Option<Child>,
    options: TransportOptions,
}

impl StdioTransport {
    /// Spawn a child process with piped stdin/stdout and start the reader task.
    ///
    /// The child's stderr is inherited so its diagnostics reach the terminal.
    pub fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        options: TransportOptions,
    ) -> Result<Self, McpError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::Spawn {
            command: command.to_string(),
            source: e,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("child stdin was not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Transport("child stdout was not captured".into()))?;

        let (frame_tx, frames) = mpsc::channel(64);
        let reader_handle =
            tokio::spawn(forward_frames(stdout, options.max_frame_bytes, frame_tx));

        tracing::info!(command, pid = ?child.id(), "spawned MCP server");

        Ok(Self {
            command: command.to_string(),
            stdin: Some(stdin),
            frames,
            reader_handle: Some(reader_handle),
            child: Some(child),
            options,
        })
    }

    /// The command this transport was spawned from.
    pub fn command(&self) -> &str {
        &self.command
    }

    async fn write_frame(&mut self, frame: &str) -> Result<(), McpError> {
        if frame.contains('\n') {
            return Err(McpError::Protocol(
                "frame contains an embedded newline".to_string(),
            ));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| McpError::Transport("transport is closed".to_string()))?;

        let write = async {
            stdin.write_all(frame.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };
        write
            .await
            .map_err(|e| McpError::Transport(format!("failed to write to server stdin: {e}")))
    }

    async fn read_frame(&mut self) -> Result<String, McpError> {
        if self.child.is_none() {
            return Err(McpError::Transport("transport is closed".to_string()));
        }

        let next = match self.options.receive_timeout {
            Some(limit) => tokio::time::timeout(limit, self.frames.recv())
                .await
                .map_err(|_| McpError::Timeout {
                    operation: "a frame from the server".to_string(),
                    timeout_ms: limit.as_millis() as u64,
                })?,
            None => self.frames.recv().await,
        };

        match next {
            Some(frame) => frame,
            None => Err(McpError::Transport(
                "server closed its stdout (process exited?)".to_string(),
            )),
        }
    }

    /// Close stdin, wait for a graceful exit, then kill.
    async fn shutdown(&mut self) -> Result<(), McpError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        // EOF on stdin is the server's signal to exit
        drop(self.stdin.take());

        let result = match tokio::time::timeout(self.options.shutdown_grace, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(command = %self.command, %status, "MCP server exited");
                Ok(())
            }
            Ok(Err(e)) => Err(McpError::Io(e)),
            Err(_) => {
                tracing::warn!(
                    command = %self.command,
                    "MCP server did not exit within {}ms, killing",
                    self.options.shutdown_grace.as_millis()
                );
                child.kill().await.map_err(McpError::Io)
            }
        };

        if let Some(handle) = self.reader_handle.take() {
            handle.abort();
        }
        self.frames.close();
        result
    }
}

impl Transport for StdioTransport {
    fn send<'a>(&'a mut self, frame: &'a str) -> BoxFuture<'a, Result<(), McpError>> {
        Box::pin(self.write_frame(frame))
    }

    fn receive(&mut self) -> BoxFuture<'_, Result<String, McpError>> {
        Box::pin(self.read_frame())
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), McpError>> {
        Box::pin(self.shutdown())
    }

    fn is_closed(&self) -> bool {
        self.child.is_none()
    }
}

/// Read frames from `reader` until EOF or an I/O error, forwarding each.
///
/// Frames that are not valid UTF-8 or exceed `max_frame_bytes` are forwarded
/// as protocol errors; reading continues after them.
async fn forward_frames<R: AsyncRead + Unpin>(
    reader: R,
    max_frame_bytes: usize,
    tx: mpsc::Sender<Result<String, McpError>>,
) {
    let mut frames = FramedRead::new(reader, FrameCodec::new(max_frame_bytes));
    while let Some(next) = frames.next().await {
        let item = match next {
            Ok(Frame::Line(bytes)) => match String::from_utf8(bytes.to_vec()) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => Ok(line),
                Err(e) => Err(McpError::Protocol(format!(
                    "frame from server is not valid UTF-8: {e}"
                ))),
            },
            Ok(Frame::Oversized) => Err(McpError::Protocol(format!(
                "frame from server exceeds {max_frame_bytes} bytes"
            ))),
            Err(e) => {
                let _ = tx
                    .send(Err(McpError::Transport(format!(
                        "failed to read from server stdout: {e}"
                    ))))
                    .await;
                break;
            }
        };
        if tx.send(item).await.is_err() {
            break;
        }
    }
    tracing::debug!("MCP server stdout reached EOF");
}
