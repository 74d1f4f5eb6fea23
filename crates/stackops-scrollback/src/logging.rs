//! Tracing subscriber setup.
//!
//! Logs go to a file: the viewer owns the terminal while it runs.

use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("install tracing subscriber: {0}")]
    Install(String),
}

/// `RUST_LOG` wins over the configured level when set.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn open_log_file(config: &LoggingConfig) -> Result<File, LoggingError> {
    if let Some(parent) = config.file.parent() {
        fs::create_dir_all(parent).map_err(|source| LoggingError::Open {
            path: config.file.clone(),
            source,
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)
        .map_err(|source| LoggingError::Open {
            path: config.file.clone(),
            source,
        })
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let file = open_log_file(config)?;
    let filter = build_filter(&config.level);
    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file));

    let installed = if config.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
    };
    installed.map_err(|err| LoggingError::Install(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_log_file_creates_parent_directories() {
        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(err) => panic!("tempdir: {err}"),
        };
        let config = LoggingConfig {
            level: "debug".to_owned(),
            format: "console".to_owned(),
            file: dir.path().join("nested").join("viewer.log"),
        };
        if let Err(err) = open_log_file(&config) {
            panic!("open: {err}");
        }
        assert!(config.file.exists());
    }
}
