//! Scoped ownership of sessions and the resources behind them.
//!
//! Resources are pushed as they are acquired and released in reverse order,
//! each exactly once, however the scope ends.

use crate::error::McpError;
use crate::session::Session;
use crate::transport::{StdioTransport, Transport};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::panic::AssertUnwindSafe;

/// Something that must be released when its scope ends.
pub trait Resource: Send {
    fn name(&self) -> &str;

    fn close(&mut self) -> BoxFuture<'_, Result<(), McpError>>;
}

impl Resource for Session {
    fn name(&self) -> &str {
        "mcp session"
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), McpError>> {
        Box::pin(Session::close(self))
    }
}

impl Resource for StdioTransport {
    fn name(&self) -> &str {
        self.command()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), McpError>> {
        Transport::close(self)
    }
}

/// A LIFO stack of acquired resources.
#[derive(Default)]
pub struct LifecycleStack {
    resources: Vec<Box<dyn Resource>>,
}

impl LifecycleStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, resource: impl Resource + 'static) {
        self.resources.push(Box::new(resource));
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Release everything, most recent first. Failures are logged, not returned.
    pub async fn unwind(&mut self) {
        while let Some(mut resource) = self.resources.pop() {
            match resource.close().await {
                Ok(()) => tracing::debug!(resource = resource.name(), "released"),
                Err(e) => tracing::warn!(resource = resource.name(), "release failed: {e}"),
            }
        }
    }
}

impl Drop for LifecycleStack {
    fn drop(&mut self) {
        if !self.resources.is_empty() {
            tracing::warn!(
                count = self.resources.len(),
                "lifecycle stack dropped without unwinding"
            );
        }
    }
}

/// Open a session, run `body` against it, and tear everything down.
///
/// `factory` builds the session and may push supporting resources onto the
/// stack. The session is initialized before `body` runs. Teardown happens on
/// success, on error and when `body` panics; the panic is resumed afterwards.
pub async fn run<F, B, T>(factory: F, body: B) -> Result<T, McpError>
where
    F: AsyncFnOnce(&mut LifecycleStack) -> Result<Session, McpError>,
    B: AsyncFnOnce(&mut Session) -> T,
{
    let mut stack = LifecycleStack::new();

    let mut session = match factory(&mut stack).await {
        Ok(session) => session,
        Err(e) => {
            stack.unwind().await;
            return Err(e);
        }
    };

    if let Err(e) = session.initialize().await {
        stack.push(session);
        stack.unwind().await;
        return Err(e);
    }

    let outcome = AssertUnwindSafe(body(&mut session)).catch_unwind().await;

    stack.push(session);
    stack.unwind().await;

    match outcome {
        Ok(value) => Ok(value),
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
