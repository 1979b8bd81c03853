//! Client-side tool chaining: search the news, analyze it, report both.

use crate::history::HistoryStore;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;
use tidings_mcp::{McpError, ToolCaller};
use tidings_types::{Arguments, ToolCallResult};

/// Which tools fill the two pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub search_tool: String,
    pub analyze_tool: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            search_tool: "search_google_news".to_string(),
            analyze_tool: "analyze_sentiment".to_string(),
        }
    }
}

/// Why a request ended early. The message is shown to the user as the answer.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Capability missing: server does not provide the `{tool}` tool.")]
    CapabilityMissing { tool: String },

    #[error("Session unavailable: {0}")]
    Session(#[source] McpError),

    #[error("Tool `{tool}` failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("Call to `{tool}` failed: {source}")]
    Channel { tool: String, source: McpError },

    #[error("Tool `{tool}` returned malformed output: {message}")]
    MalformedOutput { tool: String, message: String },
}

/// The result of one request.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// History record, when one was written.
    pub transcript: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct Headline {
    #[serde(default)]
    title: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    url: String,
}

/// Turns a free-form request into a search call followed by an analysis call.
///
/// Failures are never retried; the first one becomes the answer.
pub struct Orchestrator {
    pipeline: PipelineConfig,
    history: Option<HistoryStore>,
}

impl Orchestrator {
    pub fn new(pipeline: PipelineConfig) -> Self {
        Self {
            pipeline,
            history: None,
        }
    }

    /// Record every answered request in `history`.
    pub fn with_history(mut self, history: HistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    /// Answer one request. Never fails: stage failures are the answer text.
    pub async fn answer(&self, caller: &mut dyn ToolCaller, query: &str) -> Answer {
        let text = match self.run_pipeline(caller, query).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(query, "pipeline stopped: {e}");
                e.to_string()
            }
        };

        let transcript = match &self.history {
            Some(history) => match history.record(query, &text).await {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!("Failed to write history record: {e}");
                    None
                }
            },
            None => None,
        };

        Answer { text, transcript }
    }

    async fn run_pipeline(
        &self,
        caller: &mut dyn ToolCaller,
        query: &str,
    ) -> Result<String, PipelineError> {
        let search = self.pipeline.search_tool.as_str();
        let analyze = self.pipeline.analyze_tool.as_str();

        {
            let tools = caller.tools().map_err(PipelineError::Session)?;
            for required in [search, analyze] {
                if !tools.iter().any(|t| t.name == required) {
                    return Err(PipelineError::CapabilityMissing {
                        tool: required.to_string(),
                    });
                }
            }
        }

        let mut args = Arguments::new();
        args.insert("keyword".into(), serde_json::Value::String(query.to_string()));
        let found = call_stage(caller, search, args).await?;
        let news_text = format_headlines(search, &found)?;

        let mut args = Arguments::new();
        args.insert("text".into(), serde_json::Value::String(news_text.clone()));
        let analyzed = call_stage(caller, analyze, args).await?;
        let report = analyzed
            .first_text()
            .ok_or_else(|| PipelineError::MalformedOutput {
                tool: analyze.to_string(),
                message: "no text content".to_string(),
            })?;

        Ok(format!("News:\n{news_text}\n\nSentiment report: {report}"))
    }
}

async fn call_stage(
    caller: &mut dyn ToolCaller,
    tool: &str,
    arguments: Arguments,
) -> Result<ToolCallResult, PipelineError> {
    tracing::debug!(tool, "calling stage");
    let result = caller
        .call_tool(tool, arguments)
        .await
        .map_err(|source| PipelineError::Channel {
            tool: tool.to_string(),
            source,
        })?;
    if result.is_error {
        return Err(PipelineError::ToolFailed {
            tool: tool.to_string(),
            message: result.joined_text(),
        });
    }
    Ok(result)
}

/// Render the search stage's JSON array as numbered entries.
fn format_headlines(tool: &str, result: &ToolCallResult) -> Result<String, PipelineError> {
    let malformed = |message: String| PipelineError::MalformedOutput {
        tool: tool.to_string(),
        message,
    };
    let raw = result
        .first_text()
        .ok_or_else(|| malformed("no text content".to_string()))?;
    let headlines: Vec<Headline> =
        serde_json::from_str(raw).map_err(|e| malformed(e.to_string()))?;

    Ok(headlines
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{}. {}\n{}\n{}", i + 1, h.title, h.desc, h.url))
        .collect::<Vec<_>>()
        .join("\n"))
}
