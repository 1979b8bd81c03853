//! Gemini `generateContent` completion client.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use tidings_types::{ApiError, CompletionProvider};

use crate::http::{build_client, key_headers, post_json};

/// Public Generative Language API endpoint.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model used when none is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);

/// Non-streaming text completion against one Gemini model.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> Result<String, ApiError> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(ApiError::Parse(format!("empty completion: {reason}")));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        Ok(text.trim().to_string())
    }
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            http: build_client(COMPLETION_TIMEOUT)?,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, ApiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let headers = key_headers("x-goog-api-key", &self.api_key)?;
        let body = serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}]
        });

        let response: GenerateResponse = post_json(&self.http, &url, headers, &body).await?;
        response.into_text()
    }
}

impl CompletionProvider for GeminiClient {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, ApiError>> + Send + 'a>> {
        Box::pin(self.generate(prompt))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
