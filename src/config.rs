//! Configuration module for hvbench.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::bench::{con_rtt, msg_rtt};
use crate::buffer::DEFAULT_MAX_MESSAGE_SIZE;
use crate::protocol::ARGUMENT_MASK;
use crate::transport::tcp::{DEFAULT_CONTROL_PORT, DEFAULT_DATA_PORT};
use clap::{ArgGroup, Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Command-line arguments for the benchmark
#[derive(Parser, Debug)]
#[command(name = "hvbench")]
#[command(version = "0.1.0")]
#[command(about = "Stream socket round trip latency benchmark", long_about = None)]
#[command(group(ArgGroup::new("role").required(true).args(["server", "client"])))]
pub struct CliArgs {
    /// Run as the echo server
    #[arg(short, long)]
    pub server: bool,

    /// Run as the client against TARGET (host name, address or vsock CID)
    #[arg(short, long, value_name = "TARGET")]
    pub client: Option<String>,

    /// Path to TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Socket family to benchmark
    #[arg(long, value_enum)]
    pub transport: Option<TransportKind>,

    /// Local address to bind in server mode (tcp)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Port of the control service (tcp)
    #[arg(long)]
    pub control_port: Option<u16>,

    /// Port of the data service (tcp)
    #[arg(long)]
    pub data_port: Option<u16>,

    /// Read/write deadline in milliseconds (default: block forever)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Benchmark to run in client mode
    #[arg(short, long, value_enum)]
    pub benchmark: Option<Benchmark>,

    /// Iterations per message size
    #[arg(short = 'n', long)]
    pub iterations: Option<usize>,

    /// Connection cycles for the connection benchmark
    #[arg(long)]
    pub con_iterations: Option<usize>,

    /// Comma separated message sizes in bytes
    #[arg(long, value_delimiter = ',')]
    pub sizes: Option<Vec<usize>>,

    /// Write raw samples as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Socket family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Tcp,
    Vsock,
}

/// Benchmark selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Benchmark {
    /// Message round trip time over the size sweep
    #[default]
    MsgRtt,
    /// Connection setup/teardown round trip time
    ConRtt,
    /// Message sweep followed by the connection benchmark
    All,
}

/// Role of this process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Server,
    Client { target: String },
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Transport-related configuration
#[derive(Debug, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,
    /// Address to bind in server mode
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_control_port")]
    pub control_port: u16,
    #[serde(default = "default_data_port")]
    pub data_port: u16,
    /// Read/write deadline in milliseconds
    pub timeout_ms: Option<u64>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            listen: default_listen(),
            control_port: default_control_port(),
            data_port: default_data_port(),
            timeout_ms: None,
        }
    }
}

/// Benchmark-related configuration
#[derive(Debug, Deserialize)]
pub struct BenchmarkConfig {
    #[serde(default)]
    pub kind: Benchmark,
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default = "default_con_iterations")]
    pub con_iterations: usize,
    #[serde(default = "default_sizes")]
    pub sizes: Vec<usize>,
    /// Transfer buffer size; the largest message either side accepts
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    pub output: Option<PathBuf>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            kind: Benchmark::default(),
            iterations: default_iterations(),
            con_iterations: default_con_iterations(),
            sizes: default_sizes(),
            max_message_size: default_max_message_size(),
            output: None,
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
    "0.0.0.0".to_string()
}

fn default_control_port() -> u16 {
    DEFAULT_CONTROL_PORT
}

fn default_data_port() -> u16 {
    DEFAULT_DATA_PORT
}

fn default_iterations() -> usize {
    msg_rtt::DEFAULT_ITERATIONS
}

fn default_con_iterations() -> usize {
    con_rtt::DEFAULT_ITERATIONS
}

fn default_sizes() -> Vec<usize> {
    msg_rtt::DEFAULT_SIZES.to_vec()
}

fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub role: Role,
    pub transport: TransportKind,
    pub listen: String,
    pub control_port: u16,
    pub data_port: u16,
    pub timeout: Option<Duration>,
    pub benchmark: Benchmark,
    pub iterations: usize,
    pub con_iterations: usize,
    pub sizes: Vec<usize>,
    pub max_message_size: usize,
    pub output: Option<PathBuf>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    /// Merge parsed CLI args with the TOML file they name, if any.
    /// CLI arguments take precedence over TOML file values.
    pub fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let role = match (cli.server, cli.client) {
            (true, None) => Role::Server,
            (false, Some(target)) => Role::Client { target },
            _ => return Err(ConfigError::Role),
        };

        let config = Config {
            role,
            transport: cli.transport.unwrap_or(toml_config.transport.kind),
            listen: cli.listen.unwrap_or(toml_config.transport.listen),
            control_port: cli
                .control_port
                .unwrap_or(toml_config.transport.control_port),
            data_port: cli.data_port.unwrap_or(toml_config.transport.data_port),
            timeout: cli
                .timeout_ms
                .or(toml_config.transport.timeout_ms)
                .map(Duration::from_millis),
            benchmark: cli.benchmark.unwrap_or(toml_config.benchmark.kind),
            iterations: cli.iterations.unwrap_or(toml_config.benchmark.iterations),
            con_iterations: cli
                .con_iterations
                .unwrap_or(toml_config.benchmark.con_iterations),
            sizes: cli.sizes.unwrap_or(toml_config.benchmark.sizes),
            max_message_size: toml_config.benchmark.max_message_size,
            output: cli.output.or(toml_config.benchmark.output),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let max_argument = ARGUMENT_MASK as usize;
        if self.max_message_size == 0 {
            return Err(ConfigError::MaxMessageSize(self.max_message_size));
        }
        if self.sizes.is_empty() {
            return Err(ConfigError::NoSizes);
        }
        let max = self.max_message_size.min(max_argument);
        if let Some(&size) = self.sizes.iter().find(|&&s| s == 0 || s > max) {
            return Err(ConfigError::MessageSize { size, max });
        }
        if self.iterations == 0 {
            return Err(ConfigError::Iterations("iterations"));
        }
        if self.con_iterations == 0 || self.con_iterations > max_argument {
            return Err(ConfigError::Iterations("con_iterations"));
        }
        if let (TransportKind::Vsock, Role::Client { target }) = (self.transport, &self.role) {
            target
                .parse::<u32>()
                .map_err(|_| ConfigError::Target(target.clone()))?;
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),

    #[error("Exactly one of --server or --client must be given")]
    Role,

    #[error("No message sizes configured")]
    NoSizes,

    #[error("Message size {size} outside 1..={max}")]
    MessageSize { size: usize, max: usize },

    #[error("Invalid max_message_size {0}")]
    MaxMessageSize(usize),

    #[error("{0} must be between 1 and 2^28-1")]
    Iterations(&'static str),

    #[error("vsock target '{0}' is not a numeric context id")]
    Target(String),
}
