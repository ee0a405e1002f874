//! Tracing subscriber setup

use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, LogConfig};

/// Build the filter: `RUST_LOG` wins, otherwise the configured level
fn env_filter(level: &str) -> EnvFilter {
  EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber described by `config`
pub fn init_logging(config: &LogConfig) -> Result<(), ConfigError> {
  let builder = tracing_subscriber::fmt()
    .with_env_filter(env_filter(&config.level))
    .with_target(true)
    .with_thread_ids(true);

  match &config.file {
    Some(path) => {
      let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ConfigError::LogFile {
          path: path.clone(),
          source,
        })?;
      builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    }
    None => builder.init(),
  }

  Ok(())
}
