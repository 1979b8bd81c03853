//! Shared types and error hierarchy for Tidings.

pub mod error;
pub mod provider;
pub mod schema;
pub mod tool;

pub use error::{ApiError, ConfigError, MailError, ToolError};
pub use provider::{CompletionProvider, DeliveryStatus, Mailer, OutgoingMail, SearchHit, SearchProvider};
pub use schema::{SchemaError, validate_arguments};
pub use tool::*;
