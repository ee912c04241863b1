//! Configuration module for trivia-server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Command-line arguments for the trivia server
#[derive(Parser, Debug)]
#[command(name = "trivia-server")]
#[command(author = "trivia-server authors")]
#[command(version = "0.1.0")]
#[command(about = "A trivia game server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0:8826)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Listen backlog (defaults to the platform maximum)
    #[arg(long)]
    pub backlog: Option<i32>,

    /// Maximum number of concurrent client sessions
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Seconds to wait for a frame before dropping the client (0 = forever)
    #[arg(long)]
    pub read_timeout: Option<u64>,

    /// Seconds to wait for a reply write to complete (0 = forever)
    #[arg(long)]
    pub write_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Listen backlog
    pub backlog: Option<i32>,
    /// Maximum number of concurrent sessions
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Read deadline in seconds
    #[serde(default)]
    pub read_timeout: u64,
    /// Write deadline in seconds
    #[serde(default)]
    pub write_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            backlog: None,
            max_connections: default_max_connections(),
            read_timeout: 0,
            write_timeout: 0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8826".to_string()
}

fn default_max_connections() -> usize {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub backlog: i32,
    pub max_connections: usize,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            backlog: libc::SOMAXCONN,
            max_connections: default_max_connections(),
            read_timeout: None,
            write_timeout: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::merge(cli, toml_config))
    }

    /// Merge CLI args with TOML config (CLI takes precedence)
    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            backlog: cli
                .backlog
                .or(toml_config.server.backlog)
                .unwrap_or(libc::SOMAXCONN),
            max_connections: cli
                .max_connections
                .unwrap_or(toml_config.server.max_connections),
            read_timeout: seconds(
                cli.read_timeout
                    .unwrap_or(toml_config.server.read_timeout),
            ),
            write_timeout: seconds(
                cli.write_timeout
                    .unwrap_or(toml_config.server.write_timeout),
            ),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        }
    }
}

/// Zero means "no deadline".
fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
}
