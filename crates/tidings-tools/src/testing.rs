//! In-memory collaborators for tool tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use tidings_types::{
    ApiError, CompletionProvider, DeliveryStatus, MailError, Mailer, OutgoingMail, SearchHit,
    SearchProvider,
};

/// Returns `hits` numbered results for any query, or fails with a timeout.
pub(crate) struct FakeSearch {
    hits: usize,
    fail: bool,
}

impl FakeSearch {
    pub(crate) fn with_hits(hits: usize) -> Self {
        Self { hits, fail: false }
    }

    pub(crate) fn failing() -> Self {
        Self { hits: 0, fail: true }
    }
}

impl SearchProvider for FakeSearch {
    fn search<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SearchHit>, ApiError>> + Send + 'a>> {
        Box::pin(async move {
            if self.fail {
                return Err(ApiError::Timeout);
            }
            Ok((1..=self.hits)
                .map(|n| SearchHit {
                    title: format!("{query} headline {n}"),
                    snippet: format!("snippet {n}"),
                    url: format!("https://news.example/{n}"),
                })
                .collect())
        })
    }

    fn name(&self) -> &str {
        "fake-search"
    }
}

/// Replies with a fixed text and records every prompt.
pub(crate) struct FakeCompletion {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeCompletion {
    pub(crate) fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl CompletionProvider for FakeCompletion {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, ApiError>> + Send + 'a>> {
        Box::pin(async move {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().ok_or_else(|| ApiError::Server {
                status: 503,
                message: "model overloaded".into(),
            })
        })
    }

    fn name(&self) -> &str {
        "fake-completion"
    }
}

/// Checks the attachment like a real mailer, then records instead of sending.
#[derive(Default)]
pub(crate) struct FakeMailer {
    no_credentials: bool,
    sent: Mutex<Vec<OutgoingMail>>,
}

impl FakeMailer {
    pub(crate) fn without_credentials() -> Self {
        Self {
            no_credentials: true,
            ..Self::default()
        }
    }

    pub(crate) fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

impl Mailer for FakeMailer {
    fn send<'a>(
        &'a self,
        mail: &'a OutgoingMail,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryStatus, MailError>> + Send + 'a>> {
        Box::pin(async move {
            if !mail.attachment.is_file() {
                return Err(MailError::MissingAttachment {
                    path: mail.attachment.display().to_string(),
                });
            }
            if self.no_credentials {
                return Err(MailError::MissingCredentials);
            }
            self.sent.lock().unwrap().push(mail.clone());
            Ok(DeliveryStatus {
                recipient: mail.to.clone(),
                detail: "250 OK".into(),
            })
        })
    }
}
