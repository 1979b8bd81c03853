//! Tool trait and the data model shared by client and server.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Arguments of a tool call: a JSON object keyed by field name.
pub type Arguments = serde_json::Map<String, serde_json::Value>;

/// A tool published by the server: name, description and input schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: serde_json::Value,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// Outcome of one tool invocation.
///
/// `is_error` marks an application-level failure. It is ordinary protocol
/// traffic, distinct from a channel or protocol fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

/// A single piece of tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Resource { resource: ResourceRef },
}

/// A reference to out-of-band data, such as a file written by the tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub uri: String,
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ToolCallResult {
    /// Create a successful text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Create an application-level failure carrying diagnostic text.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: true,
        }
    }

    /// The first text block, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            ContentBlock::Resource { .. } => None,
        })
    }

    /// All blocks rendered as one string, resources as their URI.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.as_str(),
                ContentBlock::Resource { resource } => resource.uri.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Trait implemented by every server-side tool handler.
///
/// Handlers receive arguments that already passed schema validation. Returning
/// `Err` (or panicking) is reported to the client as an `is_error` result; it
/// never takes the server down.
pub trait Tool: Send + Sync {
    /// The descriptor published in `tools/list`. Its `name` is the registry key.
    fn descriptor(&self) -> ToolDescriptor;

    /// Execute the tool with validated arguments.
    fn execute(
        &self,
        arguments: Arguments,
    ) -> Pin<Box<dyn Future<Output = Result<ToolCallResult, crate::error::ToolError>> + Send + '_>>;
}
