//! Logging Setup
//!
//! Installs the global `tracing` subscriber: stdout plus an appended
//! `syncwatch.log` in the configured log directory.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// File name written inside the log directory
pub const LOG_FILE_NAME: &str = "syncwatch.log";

/// Logging setup errors
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to open log file {path:?}: {error}")]
    File { path: PathBuf, error: String },

    #[error("Failed to install subscriber: {0}")]
    Init(String),
}

/// Filter used when `RUST_LOG` is not set
pub fn default_directives(level: &str) -> String {
    format!("syncwatch={},tower_http=info", level)
}

/// Open (creating if needed) the log file under `config.log_dir`
pub fn open_log_file(config: &LoggingConfig) -> Result<Option<(PathBuf, File)>, LoggingError> {
    let Some(dir) = &config.log_dir else {
        return Ok(None);
    };
    let path = dir.join(LOG_FILE_NAME);

    std::fs::create_dir_all(dir).map_err(|e| LoggingError::File {
        path: path.clone(),
        error: e.to_string(),
    })?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| LoggingError::File {
            path: path.clone(),
            error: e.to_string(),
        })?;

    Ok(Some((path, file)))
}

/// Install the global subscriber.
///
/// An unusable log file is reported and logging continues on stdout only.
pub fn init(config: &LoggingConfig) -> Result<Option<PathBuf>, LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.level)));
    let json = config.format.eq_ignore_ascii_case("json");

    let (log_path, log_file, file_error) = match open_log_file(config) {
        Ok(Some((path, file))) => (Some(path), Some(file), None),
        Ok(None) => (None, None, None),
        Err(e) => (None, None, Some(e)),
    };

    let stdout_layer = if json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    let file_layer = log_file.map(|file| {
        let writer = Mutex::new(file);
        if json {
            fmt::layer().json().with_writer(writer).boxed()
        } else {
            fmt::layer().with_ansi(false).with_writer(writer).boxed()
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    if let Some(e) = file_error {
        tracing::warn!(error = %e, "logging to stdout only");
    }

    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(default_directives("debug"), "syncwatch=debug,tower_http=info");
    }

    #[test]
    fn test_open_log_file_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            log_dir: Some(dir.path().join("nested")),
            ..Default::default()
        };

        let (path, _file) = open_log_file(&config).unwrap().unwrap();
        assert_eq!(path, dir.path().join("nested").join(LOG_FILE_NAME));
        assert!(path.exists());
    }

    #[test]
    fn test_no_log_dir() {
        let config = LoggingConfig {
            log_dir: None,
            ..Default::default()
        };
        assert!(open_log_file(&config).unwrap().is_none());
    }
}
