use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration errors, all fatal at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config file '{path}': {source}")]
  Read {
    path: String,
    source: std::io::Error,
  },

  #[error("failed to parse config file '{path}': {source}")]
  Parse {
    path: String,
    source: toml::de::Error,
  },

  #[error("failed to open log file '{path}': {source}")]
  LogFile {
    path: String,
    source: std::io::Error,
  },
}

/// Log configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LogConfig {
  /// Log file path, if not set, logs will be printed to stdout
  pub file: Option<String>,
  /// Log level, default is "info"
  #[serde(default = "default_log_level")]
  pub level: String,
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      file: None,
      level: default_log_level(),
    }
  }
}

/// kvstore-server configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
  /// gRPC listening address
  #[serde(default = "default_listen_addr")]
  pub listen_addr: String,

  /// Log configuration
  #[serde(default)]
  pub log: LogConfig,
}

fn default_listen_addr() -> String {
  format!("0.0.0.0:{}", crate::server::DEFAULT_PORT)
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      listen_addr: default_listen_addr(),
      log: LogConfig::default(),
    }
  }
}

/// kvstore-gateway configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GatewayConfig {
  /// HTTP listening address
  #[serde(default = "default_http_addr")]
  pub http_addr: String,

  /// Address of the kvstore-server backend
  #[serde(default = "default_grpc_addr")]
  pub grpc_addr: String,

  /// Path of the OpenAPI contract used for request validation
  #[serde(default = "default_spec_path")]
  pub spec_path: PathBuf,

  /// Log configuration
  #[serde(default)]
  pub log: LogConfig,
}

fn default_http_addr() -> String {
  "0.0.0.0:8080".to_string()
}

fn default_grpc_addr() -> String {
  format!("localhost:{}", crate::server::DEFAULT_PORT)
}

fn default_spec_path() -> PathBuf {
  PathBuf::from("contracts/openapi.yaml")
}

impl Default for GatewayConfig {
  fn default() -> Self {
    Self {
      http_addr: default_http_addr(),
      grpc_addr: default_grpc_addr(),
      spec_path: default_spec_path(),
      log: LogConfig::default(),
    }
  }
}

fn load_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
  let display = path.display().to_string();
  let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Read {
    path: display.clone(),
    source,
  })?;

  toml::from_str(&config_str).map_err(|source| ConfigError::Parse {
    path: display,
    source,
  })
}

impl ServerConfig {
  /// Load configuration from TOML file
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    load_toml(path.as_ref())
  }
}

impl GatewayConfig {
  /// Load configuration from TOML file
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    load_toml(path.as_ref())
  }
}

/// Command line for kvstore-server
#[derive(Debug, Parser)]
#[command(name = "kvstore-server", about = "In-memory key-value store over gRPC")]
pub struct ServerArgs {
  /// Optional TOML configuration file
  #[arg(long)]
  pub config: Option<PathBuf>,

  /// The server port
  #[arg(long)]
  pub port: Option<u16>,

  /// Log level override
  #[arg(long)]
  pub log_level: Option<String>,
}

impl ServerArgs {
  /// Build the effective configuration: file (or defaults), then flags
  pub fn resolve(self) -> Result<ServerConfig, ConfigError> {
    let mut config = match &self.config {
      Some(path) => ServerConfig::from_file(path)?,
      None => ServerConfig::default(),
    };
    if let Some(port) = self.port {
      config.listen_addr = format!("0.0.0.0:{}", port);
    }
    if let Some(level) = self.log_level {
      config.log.level = level;
    }
    Ok(config)
  }
}

/// Command line for kvstore-gateway
#[derive(Debug, Parser)]
#[command(name = "kvstore-gateway", about = "JSON/HTTP gateway for kvstore-server")]
pub struct GatewayArgs {
  /// Optional TOML configuration file
  #[arg(long)]
  pub config: Option<PathBuf>,

  /// HTTP server port
  #[arg(long)]
  pub port: Option<u16>,

  /// gRPC server address
  #[arg(long, env = "GRPC_SERVER_ENDPOINT")]
  pub grpc_addr: Option<String>,

  /// OpenAPI spec path
  #[arg(long)]
  pub spec: Option<PathBuf>,

  /// Log level override
  #[arg(long)]
  pub log_level: Option<String>,
}

impl GatewayArgs {
  /// Build the effective configuration: file (or defaults), then flags
  pub fn resolve(self) -> Result<GatewayConfig, ConfigError> {
    let mut config = match &self.config {
      Some(path) => GatewayConfig::from_file(path)?,
      None => GatewayConfig::default(),
    };
    if let Some(port) = self.port {
      config.http_addr = format!("0.0.0.0:{}", port);
    }
    if let Some(addr) = self.grpc_addr {
      config.grpc_addr = addr;
    }
    if let Some(spec) = self.spec {
      config.spec_path = spec;
    }
    if let Some(level) = self.log_level {
      config.log.level = level;
    }
    Ok(config)
  }
}
