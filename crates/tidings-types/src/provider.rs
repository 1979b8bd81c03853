//! Collaborator traits consumed by the tools: search, completion and mail.
//!
//! All three are dyn-compatible so tools hold them as `Arc<dyn ...>` and tests
//! can substitute in-memory fakes.

use crate::{ApiError, MailError};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

/// One ranked result from the search provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// Keyword search returning a bounded, ranked result list.
pub trait SearchProvider: Send + Sync {
    fn search<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SearchHit>, ApiError>> + Send + 'a>>;

    /// Provider name for logging (e.g., "serper").
    fn name(&self) -> &str;
}

/// Language-model completion: prompt in, text out.
pub trait CompletionProvider: Send + Sync {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, ApiError>> + Send + 'a>>;

    /// Provider name for logging (e.g., "gemini").
    fn name(&self) -> &str;
}

/// A message to deliver with one file attached.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: PathBuf,
}

/// What the mail transport reported for a delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryStatus {
    pub recipient: String,
    pub detail: String,
}

/// Mail transport. Fails if the attachment is missing or credentials are unset.
pub trait Mailer: Send + Sync {
    fn send<'a>(
        &'a self,
        mail: &'a OutgoingMail,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryStatus, MailError>> + Send + 'a>>;
}
