//! search_google_news tool: keyword in, top headlines out as JSON.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tidings_types::{Arguments, SearchProvider, Tool, ToolCallResult, ToolDescriptor, ToolError};

/// Number of hits returned to the client.
pub const MAX_HEADLINES: usize = 5;

/// Searches recent news through a [`SearchProvider`].
///
/// Without a provider (no API key configured) every call is an error result.
pub struct NewsSearchTool {
    provider: Option<Arc<dyn SearchProvider>>,
}

#[derive(Deserialize)]
struct NewsInput {
    keyword: String,
}

/// One headline as published to the client.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Headline {
    pub title: String,
    pub desc: String,
    pub url: String,
}

impl NewsSearchTool {
    pub fn new(provider: Option<Arc<dyn SearchProvider>>) -> Self {
        Self { provider }
    }
}

impl Tool for NewsSearchTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "search_google_news".to_string(),
            description: "Search Google News for a keyword. Returns up to five headlines as a \
                          JSON array of {title, desc, url}."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["keyword"],
                "properties": {
                    "keyword": {
                        "type": "string",
                        "description": "Search keyword or phrase"
                    }
                }
            }),
        }
    }

    fn execute(
        &self,
        arguments: Arguments,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<ToolCallResult, ToolError>> + Send + '_>,
    > {
        Box::pin(async move {
            let input: NewsInput = serde_json::from_value(serde_json::Value::Object(arguments))
                .map_err(|e| ToolError::InvalidInput {
                    tool: "search_google_news".into(),
                    message: e.to_string(),
                })?;

            let provider = self.provider.as_ref().ok_or_else(|| ToolError::NotConfigured {
                what: "SERPER_API_KEY".into(),
            })?;

            let hits = provider.search(&input.keyword).await?;
            tracing::info!(
                keyword = %input.keyword,
                provider = provider.name(),
                hits = hits.len(),
                "news search"
            );

            let headlines: Vec<Headline> = hits
                .into_iter()
                .take(MAX_HEADLINES)
                .map(|hit| Headline {
                    title: hit.title,
                    desc: hit.snippet,
                    url: hit.url,
                })
                .collect();

            let json = serde_json::to_string(&headlines)
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            Ok(ToolCallResult::text(json))
        })
    }
}
