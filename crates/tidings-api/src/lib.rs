//! Collaborator adapters for the Tidings server: Serper news search, Gemini
//! completion and SMTP mail.

mod gemini;
mod http;
mod serper;
mod smtp;

pub use gemini::{DEFAULT_GEMINI_MODEL, GEMINI_BASE_URL, GeminiClient};
pub use serper::{SERPER_BASE_URL, SerperClient};
pub use smtp::{DEFAULT_SMTP_PORT, SmtpMailer, SmtpSettings};
