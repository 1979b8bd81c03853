//! The tools served by `tidings-server`.

mod email;
mod news;
mod sentiment;

#[cfg(test)]
mod testing;

pub use email::EmailTool;
pub use news::{Headline, MAX_HEADLINES, NewsSearchTool};
pub use sentiment::{DEFAULT_REPORTS_DIR, SentimentTool};

use std::path::PathBuf;
use std::sync::Arc;
use tidings_mcp::ToolRegistry;
use tidings_types::{CompletionProvider, ConfigError, Mailer, SearchProvider};

/// External services the tools call into.
pub struct Collaborators {
    /// `None` when no search API key is configured.
    pub search: Option<Arc<dyn SearchProvider>>,
    pub completion: Arc<dyn CompletionProvider>,
    pub mailer: Arc<dyn Mailer>,
}

/// Registry with all three tools, in the order they are listed to clients.
pub fn builtin_registry(
    collaborators: Collaborators,
    reports_dir: impl Into<PathBuf>,
) -> Result<ToolRegistry, ConfigError> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(NewsSearchTool::new(collaborators.search)))?;
    registry.register(Arc::new(SentimentTool::new(
        collaborators.completion,
        reports_dir,
    )))?;
    registry.register(Arc::new(EmailTool::new(collaborators.mailer)))?;
    Ok(registry)
}
