//! Tidings CLI: ask for the news on a topic and get a sentiment report.

use anyhow::Result;
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use tidings_config::{ClientConfig, ClientOverrides};
use tidings_core::{HistoryStore, Orchestrator};
use tidings_mcp::{LifecycleStack, McpError, ServerLaunchConfig, Session, SessionState, lifecycle};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::Instrument;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "tidings", version, about = "News search and sentiment analysis over MCP")]
struct Cli {
    /// Server executable to launch (default: tidings-server next to this binary)
    #[arg(long)]
    server: Option<String>,

    /// Argument passed to the server; repeat for several
    #[arg(long = "server-arg", allow_hyphen_values = true)]
    server_args: Vec<String>,

    /// Answer a single query and exit (non-interactive)
    #[arg(short, long)]
    query: Option<String>,

    /// Directory for history records
    #[arg(long)]
    history_dir: Option<PathBuf>,

    /// Enable verbose/debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries answers only
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = ClientConfig::load(ClientOverrides {
        server_command: cli.server,
        server_args: cli.server_args,
        history_dir: cli.history_dir,
    })
    .map_err(|e| anyhow::anyhow!("{e}"))?;
    config.server.command = locate_server(&config.server.command);

    let session_id = Uuid::new_v4();
    let span = tracing::info_span!("session", id = %session_id);
    run_client(config, cli.query).instrument(span).await
}

async fn run_client(config: ClientConfig, query: Option<String>) -> Result<()> {
    let orchestrator = Orchestrator::new(config.pipeline.clone())
        .with_history(HistoryStore::new(&config.history_dir));
    let launch = config.server;
    tracing::debug!(config_dir = %config.config_dir.display(), "configuration loaded");

    if let Some(query) = query {
        return with_session(&launch, async |session: &mut Session| {
            print_banner(session);
            ask(&orchestrator, session, &query).await;
        })
        .await;
    }

    eprintln!("Type a topic to search the news. Type quit or press Ctrl+D to exit.\n");
    let mut input = BufReader::new(tokio::io::stdin());
    loop {
        let end = with_session(&launch, async |session: &mut Session| {
            print_banner(session);
            repl(&orchestrator, session, &mut input).await
        })
        .await?;
        match end {
            ReplEnd::Finished => return Ok(()),
            ReplEnd::SessionLost => {
                eprintln!("Lost the connection to the server; starting a new one.");
            }
        }
    }
}

/// Spawn and initialize a session, run `body`, then tear the session down.
async fn with_session<T>(
    launch: &ServerLaunchConfig,
    body: impl AsyncFnOnce(&mut Session) -> T,
) -> Result<T> {
    lifecycle::run(
        async |_stack: &mut LifecycleStack| launch.spawn_session(),
        body,
    )
    .await
    .map_err(|e| startup_error(launch, e))
}

#[derive(Debug, PartialEq, Eq)]
enum ReplEnd {
    /// The user quit or input ended.
    Finished,
    /// The session closed under us; a new one may serve the rest.
    SessionLost,
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Query(String),
    Skip,
    Quit,
}

/// Read one request line. Bytes that are not UTF-8 are replaced, not rejected.
async fn read_input<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Input> {
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(Input::Quit);
    }
    let line = String::from_utf8_lossy(&buf);
    let input = line.trim();
    Ok(if input.is_empty() {
        Input::Skip
    } else if input.eq_ignore_ascii_case("quit") {
        Input::Quit
    } else {
        Input::Query(input.to_string())
    })
}

async fn repl<R: AsyncBufRead + Unpin>(
    orchestrator: &Orchestrator,
    session: &mut Session,
    input: &mut R,
) -> ReplEnd {
    loop {
        eprint!("> ");
        let _ = io::stderr().flush();

        let query = match read_input(input).await {
            Ok(Input::Query(query)) => query,
            Ok(Input::Skip) => continue,
            Ok(Input::Quit) => {
                eprintln!();
                return ReplEnd::Finished;
            }
            Err(e) => {
                eprintln!("\nError: failed to read input: {e}");
                return ReplEnd::Finished;
            }
        };

        ask(orchestrator, session, &query).await;
        println!();

        if session.state() == SessionState::Closed {
            return ReplEnd::SessionLost;
        }
    }
}

/// Answer one query, printing the answer or the failure that ended it.
async fn ask(orchestrator: &Orchestrator, session: &mut Session, query: &str) {
    let answer = orchestrator.answer(session, query).await;
    println!("{}", answer.text);
    if let Some(path) = answer.transcript {
        tracing::info!(path = %path.display(), "history recorded");
    }
}

fn print_banner(session: &Session) {
    let server = session
        .server_info()
        .map(|info| format!("{} {}", info.name, info.version))
        .unwrap_or_else(|| "unknown server".to_string());
    let tools = session
        .list_tools()
        .map(|tools| {
            tools
                .iter()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();
    eprintln!("tidings v{} (server: {server})", env!("CARGO_PKG_VERSION"));
    eprintln!("Tools: {tools}");
}

fn startup_error(launch: &ServerLaunchConfig, e: McpError) -> anyhow::Error {
    match e {
        McpError::Spawn { .. } => {
            anyhow::anyhow!("{e}\nHint: pass --server <path> to choose the server executable")
        }
        McpError::HandshakeTimeout { .. } => {
            anyhow::anyhow!("{e} (server: {})", launch.command)
        }
        other => anyhow::Error::new(other).context("MCP session failed"),
    }
}

/// Prefer a bare server name's sibling next to the current executable.
fn locate_server(command: &str) -> String {
    if command.contains(std::path::MAIN_SEPARATOR) || command.contains('/') {
        return command.to_string();
    }
    let sibling = std::env::current_exe().ok().and_then(|exe| {
        let candidate = exe
            .parent()?
            .join(format!("{command}{}", std::env::consts::EXE_SUFFIX));
        candidate.is_file().then_some(candidate)
    });
    match sibling {
        Some(path) => path.display().to_string(),
        None => command.to_string(),
    }
}
