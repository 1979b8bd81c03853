//! Tool registry for name-based dispatch on the server side.

use futures_util::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tidings_types::{Arguments, ConfigError, Tool, ToolCallResult, ToolDescriptor, validate_arguments};

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: Arc<dyn Tool>,
}

/// Tools offered by a server, listed in registration order.
///
/// Dispatch never fails: unknown names, schema mismatches, handler errors and
/// handler panics all become `is_error` results.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names must be unique.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ConfigError> {
        let descriptor = tool.descriptor();
        if self.index.contains_key(&descriptor.name) {
            return Err(ConfigError::DuplicateTool {
                name: descriptor.name,
            });
        }
        self.index.insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            descriptor,
            handler: tool,
        });
        Ok(())
    }

    /// Descriptors for `tools/list`.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate and run a tool, isolating its failures.
    pub async fn dispatch(&self, name: &str, arguments: Arguments) -> ToolCallResult {
        let Some(&slot) = self.index.get(name) else {
            return ToolCallResult::error(format!("Unknown tool: {name}"));
        };
        let tool = &self.tools[slot];

        if let Err(e) = validate_arguments(&tool.descriptor.input_schema, &arguments) {
            return ToolCallResult::error(format!("Invalid arguments for tool '{name}': {e}"));
        }

        let handler = Arc::clone(&tool.handler);
        let run = async move { handler.execute(arguments).await };
        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!(tool = name, "tool failed: {e}");
                ToolCallResult::error(e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(tool = name, "tool panicked: {message}");
                ToolCallResult::error(format!("Tool '{name}' panicked: {message}"))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::future::Future;
    use std::pin::Pin;
    use tidings_types::ToolError;

    enum Behavior {
        Echo,
        Fail,
        Panic,
    }

    struct TestTool {
        name: &'static str,
        behavior: Behavior,
    }

    impl Tool for TestTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: self.name.to_string(),
                description: "test tool".into(),
                input_schema: json!({
                    "type": "object",
                    "properties": {"text": {"type": "string"}},
                    "required": ["text"]
                }),
            }
        }

        fn execute(
            &self,
            arguments: Arguments,
        ) -> Pin<Box<dyn Future<Output = Result<ToolCallResult, ToolError>> + Send + '_>> {
            Box::pin(async move {
                let text = arguments["text"].as_str().unwrap_or_default().to_string();
                match self.behavior {
                    Behavior::Echo => Ok(ToolCallResult::text(text)),
                    Behavior::Fail => Err(ToolError::ExecutionFailed("upstream unavailable".into())),
                    Behavior::Panic => panic!("boom: {text}"),
                }
            })
        }
    }

    fn tool(name: &'static str, behavior: Behavior) -> Arc<dyn Tool> {
        Arc::new(TestTool { name, behavior })
    }

    fn args(text: &str) -> Arguments {
        json!({"text": text}).as_object().cloned().unwrap()
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(tool("echo", Behavior::Echo)).unwrap();
        let err = registry.register(tool("echo", Behavior::Fail)).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTool { ref name } if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn list_keeps_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(tool("zeta", Behavior::Echo)).unwrap();
        registry.register(tool("alpha", Behavior::Echo)).unwrap();
        registry.register(tool("mid", Behavior::Echo)).unwrap();

        let names: Vec<String> = registry.list().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert!(registry.has_tool("alpha"));
        assert!(!registry.has_tool("missing"));
    }

    #[tokio::test]
    async fn dispatch_success() {
        let mut registry = ToolRegistry::new();
        registry.register(tool("echo", Behavior::Echo)).unwrap();

        let result = registry.dispatch("echo", args("hello")).await;
        assert!(!result.is_error);
        assert_eq!(result.first_text(), Some("hello"));
    }

    #[tokio::test]
    async fn dispatch_unknown_tool() {
        let registry = ToolRegistry::new();
        let result = registry.dispatch("nope", Arguments::new()).await;
        assert!(result.is_error);
        assert_eq!(result.first_text(), Some("Unknown tool: nope"));
    }

    #[tokio::test]
    async fn dispatch_invalid_arguments() {
        let mut registry = ToolRegistry::new();
        registry.register(tool("echo", Behavior::Echo)).unwrap();

        let result = registry.dispatch("echo", Arguments::new()).await;
        assert!(result.is_error);
        assert!(result.first_text().unwrap().contains("missing required field 'text'"));
    }

    #[tokio::test]
    async fn handler_error_becomes_error_result() {
        let mut registry = ToolRegistry::new();
        registry.register(tool("flaky", Behavior::Fail)).unwrap();

        let result = registry.dispatch("flaky", args("x")).await;
        assert!(result.is_error);
        assert_eq!(
            result.first_text(),
            Some("Tool execution failed: upstream unavailable")
        );
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let mut registry = ToolRegistry::new();
        registry.register(tool("bomb", Behavior::Panic)).unwrap();
        registry.register(tool("echo", Behavior::Echo)).unwrap();

        let result = registry.dispatch("bomb", args("x")).await;
        assert!(result.is_error);
        assert_eq!(result.first_text(), Some("Tool 'bomb' panicked: boom: x"));

        // Registry still serves after a panic
        let result = registry.dispatch("echo", args("still here")).await;
        assert_eq!(result.first_text(), Some("still here"));
    }
}
