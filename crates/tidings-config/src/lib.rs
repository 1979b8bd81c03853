//! Layered TOML configuration for Tidings.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > config file > defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tidings_api::{DEFAULT_GEMINI_MODEL, GEMINI_BASE_URL, SERPER_BASE_URL, SmtpSettings};
use tidings_core::{DEFAULT_HISTORY_DIR, PipelineConfig};
use tidings_mcp::ServerLaunchConfig;
use tidings_tools::DEFAULT_REPORTS_DIR;
use tidings_types::ConfigError;

/// Settings that can be read from `config.toml`.
///
/// The client reads `[server]`, `[pipeline]` and `[history]`; the server
/// reads `[gemini]`, `[serper]`, `[smtp]` and `[reports]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub server: ServerLaunchConfig,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub history: DirSettings,
    #[serde(default)]
    pub gemini: GeminiSettings,
    #[serde(default)]
    pub serper: SerperSettings,
    #[serde(default)]
    pub smtp: SmtpFileSettings,
    #[serde(default)]
    pub reports: DirSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub search_tool: Option<String>,
    pub analyze_tool: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirSettings {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerperSettings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmtpFileSettings {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
}

/// Resolved configuration for the `tidings` client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: ServerLaunchConfig,
    pub pipeline: PipelineConfig,
    pub history_dir: PathBuf,
    pub config_dir: PathBuf,
}

/// Client CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct ClientOverrides {
    pub server_command: Option<String>,
    /// Replaces the configured arguments when non-empty.
    pub server_args: Vec<String>,
    pub history_dir: Option<PathBuf>,
}

/// Resolved configuration for `tidings-server`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    /// Unset leaves the search tool registered but failing every call.
    pub serper_api_key: Option<String>,
    pub serper_base_url: String,
    pub smtp: SmtpSettings,
    pub reports_dir: PathBuf,
    pub config_dir: PathBuf,
}

/// Server CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct ServerOverrides {
    pub reports_dir: Option<PathBuf>,
}

impl ClientConfig {
    /// Load configuration from the process environment and `config.toml`.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables (`TIDINGS_SERVER`, `TIDINGS_HISTORY_DIR`)
    /// 3. Config file (~/.tidings/config.toml)
    /// 4. Defaults
    pub fn load(overrides: ClientOverrides) -> Result<Self, ConfigError> {
        let env = |key: &str| std::env::var(key).ok();
        Self::resolve(overrides, config_dir_from(&env), &env)
    }

    /// Resolve against an explicit config directory and environment lookup.
    pub fn resolve(
        overrides: ClientOverrides,
        config_dir: PathBuf,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let settings = load_settings_file(&config_dir.join("config.toml"))?;

        let mut server = settings.server;
        if let Some(command) = overrides.server_command.or_else(|| env("TIDINGS_SERVER")) {
            server.command = command;
        }
        if !overrides.server_args.is_empty() {
            server.args = overrides.server_args;
        }

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            search_tool: settings.pipeline.search_tool.unwrap_or(defaults.search_tool),
            analyze_tool: settings
                .pipeline
                .analyze_tool
                .unwrap_or(defaults.analyze_tool),
        };

        let history_dir = overrides
            .history_dir
            .or_else(|| env("TIDINGS_HISTORY_DIR").map(PathBuf::from))
            .or(settings.history.dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_DIR));

        Ok(ClientConfig {
            server,
            pipeline,
            history_dir,
            config_dir,
        })
    }
}

impl ServerConfig {
    /// Load configuration from the process environment and `config.toml`.
    ///
    /// Fails when no Gemini API key is available from any source.
    pub fn load(overrides: ServerOverrides) -> Result<Self, ConfigError> {
        let env = |key: &str| std::env::var(key).ok();
        Self::resolve(overrides, config_dir_from(&env), &env)
    }

    /// Resolve against an explicit config directory and environment lookup.
    pub fn resolve(
        overrides: ServerOverrides,
        config_dir: PathBuf,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let settings = load_settings_file(&config_dir.join("config.toml"))?;

        let gemini_api_key = non_empty(env("GEMINI_API_KEY"))
            .or(settings.gemini.api_key)
            .ok_or_else(|| ConfigError::MissingKey {
                key: "GEMINI_API_KEY (set it in the environment or [gemini] api_key)".into(),
            })?;

        let gemini_model = non_empty(env("GEMINI_MODEL"))
            .or(settings.gemini.model)
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        let gemini_base_url = settings
            .gemini
            .base_url
            .unwrap_or_else(|| GEMINI_BASE_URL.to_string());

        let serper_api_key = non_empty(env("SERPER_API_KEY")).or(settings.serper.api_key);
        let serper_base_url = settings
            .serper
            .base_url
            .unwrap_or_else(|| SERPER_BASE_URL.to_string());

        let port = match non_empty(env("SMTP_PORT")) {
            Some(raw) => Some(raw.trim().parse::<u16>().map_err(|e| {
                ConfigError::InvalidValue {
                    key: "SMTP_PORT".into(),
                    message: format!("{raw:?}: {e}"),
                }
            })?),
            None => settings.smtp.port,
        };

        let smtp = SmtpSettings {
            server: non_empty(env("SMTP_SERVER")).or(settings.smtp.server),
            port,
            username: non_empty(env("EMAIL_USER")).or(settings.smtp.username),
            // Passwords come from the environment only
            password: non_empty(env("EMAIL_PASS")),
        };

        let reports_dir = overrides
            .reports_dir
            .or(settings.reports.dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORTS_DIR));

        Ok(ServerConfig {
            gemini_api_key,
            gemini_model,
            gemini_base_url,
            serper_api_key,
            serper_base_url,
            smtp,
            reports_dir,
            config_dir,
        })
    }
}

/// The Tidings config directory: `$TIDINGS_CONFIG_DIR` or `~/.tidings/`.
fn config_dir_from(env: &dyn Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = env("TIDINGS_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tidings")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Load and parse a TOML settings file. A missing file yields defaults.
fn load_settings_file(path: &Path) -> Result<SettingsFile, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        }),
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
            }
            Ok(SettingsFile::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn dir_with_config(toml_str: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), toml_str).unwrap();
        dir
    }

    #[test]
    fn test_default_settings() {
        let settings = SettingsFile::default();
        assert_eq!(settings.server.command, "tidings-server");
        assert!(settings.pipeline.search_tool.is_none());
        assert!(settings.history.dir.is_none());
    }

    #[test]
    fn test_client_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let config = ClientConfig::resolve(
            ClientOverrides::default(),
            dir.path().to_path_buf(),
            &env_of(&[]),
        )
        .unwrap();
        assert_eq!(config.server.command, "tidings-server");
        assert_eq!(config.server.handshake_timeout_ms, 30000);
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.history_dir, PathBuf::from("./llm_outputs"));
        assert_eq!(config.config_dir, dir.path());
    }

    #[test]
    fn test_client_file_then_env_then_cli() {
        let dir = dir_with_config(
            r#"
[server]
command = "/opt/tidings/server"
args = ["--verbose"]
request_timeout_ms = 60000

[pipeline]
search_tool = "find_news"

[history]
dir = "/var/tidings/history"
"#,
        );

        let from_file = ClientConfig::resolve(
            ClientOverrides::default(),
            dir.path().to_path_buf(),
            &env_of(&[]),
        )
        .unwrap();
        assert_eq!(from_file.server.command, "/opt/tidings/server");
        assert_eq!(from_file.server.args, vec!["--verbose"]);
        assert_eq!(from_file.server.request_timeout_ms, Some(60000));
        assert_eq!(from_file.pipeline.search_tool, "find_news");
        assert_eq!(from_file.pipeline.analyze_tool, "analyze_sentiment");
        assert_eq!(from_file.history_dir, PathBuf::from("/var/tidings/history"));

        let env = env_of(&[
            ("TIDINGS_SERVER", "/usr/bin/other"),
            ("TIDINGS_HISTORY_DIR", "/tmp/h"),
        ]);
        let from_env =
            ClientConfig::resolve(ClientOverrides::default(), dir.path().to_path_buf(), &env)
                .unwrap();
        assert_eq!(from_env.server.command, "/usr/bin/other");
        assert_eq!(from_env.history_dir, PathBuf::from("/tmp/h"));

        let overrides = ClientOverrides {
            server_command: Some("./target/debug/tidings-server".into()),
            server_args: vec!["--reports-dir".into(), "out".into()],
            history_dir: Some(PathBuf::from("mine")),
        };
        let from_cli = ClientConfig::resolve(overrides, dir.path().to_path_buf(), &env).unwrap();
        assert_eq!(from_cli.server.command, "./target/debug/tidings-server");
        assert_eq!(from_cli.server.args, vec!["--reports-dir", "out"]);
        assert_eq!(from_cli.history_dir, PathBuf::from("mine"));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let dir = dir_with_config("[server\ncommand = 1");
        let err = ClientConfig::resolve(
            ClientOverrides::default(),
            dir.path().to_path_buf(),
            &env_of(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_server_requires_gemini_key() {
        let dir = TempDir::new().unwrap();
        let err = ServerConfig::resolve(
            ServerOverrides::default(),
            dir.path().to_path_buf(),
            &env_of(&[("SERPER_API_KEY", "s")]),
        )
        .unwrap_err();
        match err {
            ConfigError::MissingKey { key } => assert!(key.starts_with("GEMINI_API_KEY")),
            other => panic!("Expected MissingKey, got {other:?}"),
        }
    }

    #[test]
    fn test_server_blank_key_counts_as_missing() {
        let dir = TempDir::new().unwrap();
        let result = ServerConfig::resolve(
            ServerOverrides::default(),
            dir.path().to_path_buf(),
            &env_of(&[("GEMINI_API_KEY", "  ")]),
        );
        assert!(matches!(result, Err(ConfigError::MissingKey { .. })));
    }

    #[test]
    fn test_server_from_env() {
        let dir = TempDir::new().unwrap();
        let env = env_of(&[
            ("GEMINI_API_KEY", "g-key"),
            ("SERPER_API_KEY", "s-key"),
            ("SMTP_SERVER", "smtp.example.com"),
            ("SMTP_PORT", "587"),
            ("EMAIL_USER", "me@example.com"),
            ("EMAIL_PASS", "pw"),
        ]);
        let config =
            ServerConfig::resolve(ServerOverrides::default(), dir.path().to_path_buf(), &env)
                .unwrap();

        assert_eq!(config.gemini_api_key, "g-key");
        assert_eq!(config.gemini_model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.gemini_base_url, GEMINI_BASE_URL);
        assert_eq!(config.serper_api_key.as_deref(), Some("s-key"));
        assert_eq!(config.smtp.server.as_deref(), Some("smtp.example.com"));
        assert_eq!(config.smtp.port, Some(587));
        assert!(config.smtp.is_complete());
        assert_eq!(config.reports_dir, PathBuf::from(DEFAULT_REPORTS_DIR));
        assert_eq!(config.config_dir, dir.path());
    }

    #[test]
    fn test_server_optional_collaborators_may_be_absent() {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig::resolve(
            ServerOverrides::default(),
            dir.path().to_path_buf(),
            &env_of(&[("GEMINI_API_KEY", "g")]),
        )
        .unwrap();
        assert!(config.serper_api_key.is_none());
        assert!(!config.smtp.is_complete());
        assert!(config.smtp.port.is_none());
    }

    #[test]
    fn test_server_invalid_port() {
        let dir = TempDir::new().unwrap();
        let err = ServerConfig::resolve(
            ServerOverrides::default(),
            dir.path().to_path_buf(),
            &env_of(&[("GEMINI_API_KEY", "g"), ("SMTP_PORT", "smtps")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "SMTP_PORT"));
    }

    #[test]
    fn test_server_file_and_override() {
        let dir = dir_with_config(
            r#"
[gemini]
api_key = "from-file"
model = "gemini-1.5-pro"

[smtp]
server = "mail.example.com"
port = 2465

[reports]
dir = "/srv/reports"
"#,
        );
        let config = ServerConfig::resolve(
            ServerOverrides::default(),
            dir.path().to_path_buf(),
            &env_of(&[]),
        )
        .unwrap();
        assert_eq!(config.gemini_api_key, "from-file");
        assert_eq!(config.gemini_model, "gemini-1.5-pro");
        assert_eq!(config.smtp.port, Some(2465));
        assert_eq!(config.reports_dir, PathBuf::from("/srv/reports"));

        let overridden = ServerConfig::resolve(
            ServerOverrides {
                reports_dir: Some(PathBuf::from("here")),
            },
            dir.path().to_path_buf(),
            &env_of(&[("GEMINI_MODEL", "gemini-2.0-flash")]),
        )
        .unwrap();
        assert_eq!(overridden.gemini_model, "gemini-2.0-flash");
        assert_eq!(overridden.reports_dir, PathBuf::from("here"));
    }

    #[test]
    fn test_config_dir_env_override() {
        let dir = config_dir_from(&env_of(&[("TIDINGS_CONFIG_DIR", "/etc/tidings")]));
        assert_eq!(dir, PathBuf::from("/etc/tidings"));
    }
}
