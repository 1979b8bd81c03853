//! Serper news search client.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use tidings_types::{ApiError, SearchHit, SearchProvider};

use crate::http::{build_client, key_headers, post_json};

/// Public Serper endpoint.
pub const SERPER_BASE_URL: &str = "https://google.serper.dev";

const SEARCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Google News search through serper.dev.
#[derive(Clone)]
pub struct SerperClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    news: Vec<NewsItem>,
}

#[derive(Debug, Deserialize)]
struct NewsItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

impl SerperClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ApiError> {
        Ok(Self {
            http: build_client(SEARCH_TIMEOUT)?,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn search_news(&self, query: &str) -> Result<Vec<SearchHit>, ApiError> {
        let url = format!("{}/news", self.base_url);
        let headers = key_headers("x-api-key", &self.api_key)?;
        let body = serde_json::json!({ "q": query });

        let response: NewsResponse = post_json(&self.http, &url, headers, &body).await?;
        tracing::debug!(query, hits = response.news.len(), "serper search complete");

        Ok(response
            .news
            .into_iter()
            .map(|item| SearchHit {
                title: item.title,
                snippet: item.snippet,
                url: item.link,
            })
            .collect())
    }
}

impl SearchProvider for SerperClient {
    fn search<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SearchHit>, ApiError>> + Send + 'a>> {
        Box::pin(self.search_news(query))
    }

    fn name(&self) -> &str {
        "serper"
    }
}
