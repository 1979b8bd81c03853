//! send_email_with_attachment tool.

use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tidings_types::{Arguments, Mailer, OutgoingMail, Tool, ToolCallResult, ToolDescriptor, ToolError};

pub struct EmailTool {
    mailer: Arc<dyn Mailer>,
}

#[derive(Deserialize)]
struct EmailInput {
    to: String,
    subject: String,
    body: String,
    attachment_path: String,
}

impl EmailTool {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

impl Tool for EmailTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "send_email_with_attachment".to_string(),
            description: "Send an email with one file attached.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["to", "subject", "body", "attachment_path"],
                "properties": {
                    "to": {"type": "string", "description": "Recipient address"},
                    "subject": {"type": "string"},
                    "body": {"type": "string", "description": "Plain-text body"},
                    "attachment_path": {
                        "type": "string",
                        "description": "Path of the file to attach"
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
            let input: EmailInput = serde_json::from_value(serde_json::Value::Object(arguments))
                .map_err(|e| ToolError::InvalidInput {
                    tool: "send_email_with_attachment".into(),
                    message: e.to_string(),
                })?;

            let mail = OutgoingMail {
                to: input.to,
                subject: input.subject,
                body: input.body,
                attachment: PathBuf::from(input.attachment_path),
            };
            let status = self.mailer.send(&mail).await?;
            tracing::info!(to = %status.recipient, detail = %status.detail, "mail delivered");

            Ok(ToolCallResult::text(format!("email sent to {}", status.recipient)))
        })
    }
}
