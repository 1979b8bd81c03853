//! analyze_sentiment tool: asks the completion service for the emotional
//! tendency of a text and writes a Markdown report.

use chrono::Local;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tidings_types::{
    Arguments, CompletionProvider, ContentBlock, ResourceRef, Tool, ToolCallResult,
    ToolDescriptor, ToolError,
};

/// Directory reports go to when none is configured.
pub const DEFAULT_REPORTS_DIR: &str = "./sentiment_reports";

pub struct SentimentTool {
    completion: Arc<dyn CompletionProvider>,
    reports_dir: PathBuf,
}

#[derive(Deserialize)]
struct SentimentInput {
    text: String,
    #[serde(default)]
    filename: Option<String>,
}

impl SentimentTool {
    pub fn new(completion: Arc<dyn CompletionProvider>, reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            completion,
            reports_dir: reports_dir.into(),
        }
    }

    /// Where a report named by `requested` would be written.
    ///
    /// Only the final path component of a requested name is kept, so reports
    /// never leave the reports directory.
    fn report_path(&self, requested: Option<&str>) -> PathBuf {
        let name = requested
            .and_then(|r| Path::new(r).file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(default_report_name);
        self.reports_dir.join(name)
    }
}

fn default_report_name() -> String {
    format!("sentiment_{}.md", Local::now().format("%Y%m%d_%H%M%S"))
}

fn build_prompt(text: &str) -> String {
    format!(
        "Analyze the emotional tendency of the following news content and explain the \
         reasons. Keep the answer clearly structured and concise:\n\n{text}"
    )
}

fn render_report(text: &str, analysis: &str) -> String {
    format!(
        "# Sentiment Analysis Report\n\
         **Analysis time:** {}\n\
         ---\n\
         ## Original Text\n\
         {text}\n\
         ---\n\
         ## Analysis Result\n\
         {analysis}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )
}

impl Tool for SentimentTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "analyze_sentiment".to_string(),
            description: "Analyze the sentiment of a text and save a Markdown report. \
                          Returns the absolute path of the report."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["text"],
                "properties": {
                    "text": {
                        "type": "string",
                        "description": "Text to analyze"
                    },
                    "filename": {
                        "type": "string",
                        "description": "Optional report file name"
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
            let input: SentimentInput =
                serde_json::from_value(serde_json::Value::Object(arguments)).map_err(|e| {
                    ToolError::InvalidInput {
                        tool: "analyze_sentiment".into(),
                        message: e.to_string(),
                    }
                })?;

            let analysis = self.completion.complete(&build_prompt(&input.text)).await?;
            let report = render_report(&input.text, analysis.trim());

            let requested = input.filename.as_deref().filter(|f| !f.trim().is_empty());
            let path = std::path::absolute(self.report_path(requested))?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, report).await?;
            tracing::info!(
                path = %path.display(),
                provider = self.completion.name(),
                "sentiment report written"
            );

            let path = path.display().to_string();
            Ok(ToolCallResult {
                content: vec![
                    ContentBlock::Text { text: path.clone() },
                    ContentBlock::Resource {
                        resource: ResourceRef {
                            uri: format!("file://{path}"),
                            mime_type: Some("text/markdown".into()),
                        },
                    },
                ],
                is_error: false,
            })
        })
    }
}
