//! Tidings tool server. Speaks JSON-RPC on stdin/stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tidings_api::{GeminiClient, SerperClient, SmtpMailer};
use tidings_config::{ServerConfig, ServerOverrides};
use tidings_mcp::{Implementation, McpServer};
use tidings_tools::{Collaborators, builtin_registry};
use tidings_types::SearchProvider;

#[derive(Parser)]
#[command(name = "tidings-server", version, about = "News and sentiment tools over stdio")]
struct Cli {
    /// Directory sentiment reports are written to
    #[arg(long)]
    reports_dir: Option<PathBuf>,

    /// Enable verbose/debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout is reserved for protocol frames
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let config = ServerConfig::load(ServerOverrides {
        reports_dir: cli.reports_dir,
    })
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    let server = build_server(&config)?;
    tracing::info!(
        tools = server.registry().len(),
        reports = %config.reports_dir.display(),
        model = %config.gemini_model,
        config_dir = %config.config_dir.display(),
        "tidings-server ready"
    );

    server
        .serve_stdio()
        .await
        .context("Server loop failed")?;
    tracing::info!("client disconnected, shutting down");
    Ok(())
}

fn build_server(config: &ServerConfig) -> Result<McpServer> {
    let completion = GeminiClient::new(
        &config.gemini_api_key,
        &config.gemini_base_url,
        &config.gemini_model,
    )
    .context("Failed to create completion client")?;

    let search: Option<Arc<dyn SearchProvider>> = match &config.serper_api_key {
        Some(key) => Some(Arc::new(
            SerperClient::new(key, &config.serper_base_url)
                .context("Failed to create search client")?,
        )),
        None => {
            tracing::warn!("SERPER_API_KEY not set; news search calls will fail");
            None
        }
    };

    if !config.smtp.is_complete() {
        tracing::warn!("SMTP settings incomplete; email calls will fail");
    }

    let registry = builtin_registry(
        Collaborators {
            search,
            completion: Arc::new(completion),
            mailer: Arc::new(SmtpMailer::new(config.smtp.clone())),
        },
        &config.reports_dir,
    )
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    Ok(McpServer::new(
        Implementation::new("tidings-server", env!("CARGO_PKG_VERSION")),
        registry,
    )
    .with_instructions(
        "Search recent news with search_google_news, then pass the headlines to \
         analyze_sentiment for a saved report; send_email_with_attachment mails it.",
    ))
}
