//! In-memory transport for session tests.

use crate::error::McpError;
use crate::protocol::PROTOCOL_VERSION;
use crate::transport::Transport;
use futures_util::future::BoxFuture;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Responder = Box<dyn FnMut(&Value) -> Vec<String> + Send>;

/// Shared view of what a [`MockTransport`] saw.
#[derive(Clone, Default)]
pub(crate) struct Recorder {
    written: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
}

impl Recorder {
    pub(crate) fn writes(&self) -> usize {
        self.written.lock().unwrap().len()
    }

    pub(crate) fn methods(&self) -> Vec<String> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .filter_map(|frame| serde_json::from_str::<Value>(frame).ok())
            .filter_map(|v| v["method"].as_str().map(String::from))
            .collect()
    }

    pub(crate) fn last_request(&self) -> Option<Value> {
        let written = self.written.lock().unwrap();
        written.last().and_then(|f| serde_json::from_str(f).ok())
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Transport whose peer is a closure: each written frame yields zero or more
/// reply frames, queued for `receive`.
pub(crate) struct MockTransport {
    responder: Responder,
    inbox: VecDeque<String>,
    recorder: Recorder,
    hang_when_idle: bool,
    closed: bool,
}

impl MockTransport {
    pub(crate) fn new<F>(responder: F) -> (Self, Recorder)
    where
        F: FnMut(&Value) -> Vec<String> + Send + 'static,
    {
        let recorder = Recorder::default();
        let transport = Self {
            responder: Box::new(responder),
            inbox: VecDeque::new(),
            recorder: recorder.clone(),
            hang_when_idle: false,
            closed: false,
        };
        (transport, recorder)
    }

    /// A peer that never answers.
    pub(crate) fn silent() -> (Self, Recorder) {
        let (transport, recorder) = Self::new(|_| Vec::new());
        (transport.hang_when_idle(), recorder)
    }

    /// Block on an empty inbox instead of reporting EOF.
    pub(crate) fn hang_when_idle(mut self) -> Self {
        self.hang_when_idle = true;
        self
    }
}

impl Transport for MockTransport {
    fn send<'a>(&'a mut self, frame: &'a str) -> BoxFuture<'a, Result<(), McpError>> {
        Box::pin(async move {
            if self.closed {
                return Err(McpError::Transport("transport is closed".into()));
            }
            self.recorder.written.lock().unwrap().push(frame.to_string());
            let request: Value = serde_json::from_str(frame)?;
            let replies = (self.responder)(&request);
            self.inbox.extend(replies);
            Ok(())
        })
    }

    fn receive(&mut self) -> BoxFuture<'_, Result<String, McpError>> {
        Box::pin(async move {
            if self.closed {
                return Err(McpError::Transport("transport is closed".into()));
            }
            match self.inbox.pop_front() {
                Some(frame) => Ok(frame),
                None if self.hang_when_idle => std::future::pending().await,
                None => Err(McpError::Transport("mock server hung up".into())),
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), McpError>> {
        Box::pin(async move {
            if !self.closed {
                self.closed = true;
                self.recorder.closes.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        })
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

pub(crate) fn response(id: u64, result: Value) -> String {
    json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string()
}

pub(crate) fn initialize_response(id: u64) -> String {
    response(
        id,
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "fake", "version": "0.0.1"}
        }),
    )
}

/// A well-behaved server offering `search_google_news` and
/// `analyze_sentiment`. `tools/call` answers "called {name}".
pub(crate) fn fake_server() -> impl FnMut(&Value) -> Vec<String> + Send + 'static {
    |request: &Value| {
        let Some(id) = request["id"].as_u64() else {
            return Vec::new();
        };
        match request["method"].as_str() {
            Some("initialize") => vec![initialize_response(id)],
            Some("tools/list") => vec![response(
                id,
                json!({"tools": [
                    {
                        "name": "search_google_news",
                        "description": "Search news",
                        "inputSchema": {
                            "type": "object",
                            "properties": {"keyword": {"type": "string"}},
                            "required": ["keyword"]
                        }
                    },
                    {
                        "name": "analyze_sentiment",
                        "description": "Analyze sentiment",
                        "inputSchema": {
                            "type": "object",
                            "properties": {
                                "text": {"type": "string"},
                                "filename": {"type": "string"}
                            },
                            "required": ["text"]
                        }
                    }
                ]}),
            )],
            Some("tools/call") => {
                let name = request["params"]["name"].as_str().unwrap_or_default();
                vec![response(
                    id,
                    json!({"content": [{"type": "text", "text": format!("called {name}")}]}),
                )]
            }
            _ => vec![
                json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32601, "message": "Method not found"}})
                    .to_string(),
            ],
        }
    }
}
