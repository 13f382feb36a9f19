//! Configuration module for wordclient.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::reader::DEFAULT_READ_CHUNK;

/// Command-line arguments for the word client
#[derive(Parser, Debug)]
#[command(name = "wordclient")]
#[command(version = "0.1.0")]
#[command(about = "Read length-prefixed words from a TCP server", long_about = None)]
pub struct CliArgs {
    /// Server host name or address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Connect timeout in seconds (0 = wait indefinitely)
    #[arg(long)]
    pub connect_timeout: Option<u64>,

    /// Read timeout in seconds (0 = block indefinitely)
    #[arg(long)]
    pub read_timeout: Option<u64>,

    /// Set TCP_NODELAY on the connection (true/false)
    #[arg(long)]
    pub nodelay: Option<bool>,

    /// Bytes requested from the socket per read
    #[arg(long)]
    pub read_chunk: Option<usize>,

    /// What to do when the server hangs up mid-word
    #[arg(long, value_enum)]
    pub on_truncated: Option<TruncationPolicy>,

    /// What to do with words that are not valid UTF-8
    #[arg(long, value_enum)]
    pub on_invalid_utf8: Option<InvalidUtf8Policy>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Handling of a connection that closes with a partial frame buffered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TruncationPolicy {
    /// Report the lost bytes as an error.
    #[default]
    Error,
    /// Drop the partial frame and end the stream normally.
    Discard,
}

/// Handling of a frame whose payload is not valid UTF-8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InvalidUtf8Policy {
    /// Stop reading and report the error.
    #[default]
    Abort,
    /// Log a warning and continue with the next word.
    Skip,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub framing: FramingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection-related configuration
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    /// Connect timeout in seconds
    pub connect_timeout: Option<u64>,
    /// Read timeout in seconds
    pub read_timeout: Option<u64>,
    /// TCP_NODELAY on the client socket
    #[serde(default = "default_nodelay")]
    pub nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            read_timeout: None,
            nodelay: default_nodelay(),
        }
    }
}

/// Framing-related configuration
#[derive(Debug, Deserialize)]
pub struct FramingConfig {
    /// Bytes requested per read
    #[serde(default = "default_read_chunk")]
    pub read_chunk: usize,
    #[serde(default)]
    pub on_truncated: TruncationPolicy,
    #[serde(default)]
    pub on_invalid_utf8: InvalidUtf8Policy,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            read_chunk: default_read_chunk(),
            on_truncated: TruncationPolicy::default(),
            on_invalid_utf8: InvalidUtf8Policy::default(),
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

fn default_nodelay() -> bool {
    true
}

fn default_read_chunk() -> usize {
    DEFAULT_READ_CHUNK
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub nodelay: bool,
    pub read_chunk: usize,
    pub on_truncated: TruncationPolicy,
    pub on_invalid_utf8: InvalidUtf8Policy,
    pub log_level: String,
}

impl Config {
    /// Resolve parsed CLI args against the optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|source| ConfigError::FileRead {
                    path: config_path.clone(),
                    source,
                })?;
            toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
                path: config_path.clone(),
                source,
            })?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let read_chunk = cli.read_chunk.unwrap_or(toml_config.framing.read_chunk);
        if read_chunk == 0 {
            return Err(ConfigError::Invalid("read_chunk must be at least 1".into()));
        }

        Ok(Config {
            host: cli.host,
            port: cli.port,
            connect_timeout: seconds(cli.connect_timeout.or(toml_config.client.connect_timeout)),
            read_timeout: seconds(cli.read_timeout.or(toml_config.client.read_timeout)),
            nodelay: cli.nodelay.unwrap_or(toml_config.client.nodelay),
            read_chunk,
            on_truncated: cli
                .on_truncated
                .unwrap_or(toml_config.framing.on_truncated),
            on_invalid_utf8: cli
                .on_invalid_utf8
                .unwrap_or(toml_config.framing.on_invalid_utf8),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        })
    }

    /// `host:port` as given on the command line.
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Zero means "no timeout".
fn seconds(value: Option<u64>) -> Option<Duration> {
    value.filter(|&s| s > 0).map(Duration::from_secs)
}
