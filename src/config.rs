//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sync::{RegistryConfig, MAX_CHANNEL_CAPACITY};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub content: ContentConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where a loaded configuration came from
#[derive(Debug, Default)]
pub struct ConfigOrigin {
    /// File the configuration was read from; `None` means defaults plus
    /// environment
    pub path: Option<PathBuf>,
    /// Config files that exist but could not be loaded
    pub skipped: Vec<ConfigError>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Media and page template locations
#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("./content")
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("./templates")
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
            template_dir: default_template_dir(),
        }
    }
}

impl ContentConfig {
    /// Path of the page template
    pub fn index_template(&self) -> PathBuf {
        self.template_dir.join("index.html")
    }
}

/// Connection registry and stream pump settings
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Messages buffered per viewer before new ones are dropped
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Writes slower than this count as a dead viewer (0 disables)
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,
}

fn default_channel_capacity() -> usize {
    64
}

fn default_write_timeout() -> u64 {
    10_000 // 10 seconds
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            write_timeout_ms: default_write_timeout(),
        }
    }
}

impl SyncConfig {
    /// Registry settings, with the capacity clamped to `1..=MAX_CHANNEL_CAPACITY`
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            channel_capacity: self.channel_capacity.clamp(1, MAX_CHANNEL_CAPACITY),
        }
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout_ms > 0).then(|| Duration::from_millis(self.write_timeout_ms))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory holding `syncwatch.log`; unset logs to stdout only
    #[serde(default = "default_log_dir")]
    pub log_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_log_dir() -> Option<PathBuf> {
    Some(PathBuf::from("./logs"))
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: default_log_dir(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment.
    ///
    /// Runs before logging is installed, so what happened is returned in the
    /// [`ConfigOrigin`] for the caller to report.
    pub fn load_default() -> (Self, ConfigOrigin) {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("syncwatch").join("config.toml")),
            Some(PathBuf::from("/etc/syncwatch/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        Self::load_first(config_paths.into_iter().flatten())
    }

    /// Load the first readable file among `paths`, falling back to the
    /// environment. Existing files that fail to load are collected as skipped.
    pub fn load_first(paths: impl IntoIterator<Item = PathBuf>) -> (Self, ConfigOrigin) {
        let mut origin = ConfigOrigin::default();

        for path in paths {
            if !path.exists() {
                continue;
            }
            match Self::load_with_env(&path) {
                Ok(config) => {
                    origin.path = Some(path);
                    return (config, origin);
                }
                Err(e) => origin.skipped.push(e),
            }
        }

        (Self::from_env(), origin)
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Server overrides
        if let Some(host) = var("SYNCWATCH_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        // Content overrides
        if let Some(dir) = var("CONTENT_DIR") {
            self.content.content_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("TEMPLATE_DIR") {
            self.content.template_dir = PathBuf::from(dir);
        }

        // Sync overrides
        if let Some(capacity) = var("SYNCWATCH_CHANNEL_CAPACITY").and_then(|c| c.parse().ok()) {
            self.sync.channel_capacity = capacity;
        }

        // Logging overrides
        if let Some(dir) = var("LOG_DIR") {
            self.logging.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(level) = var("SYNCWATCH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("SYNCWATCH_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Syncwatch Configuration
#
# Environment variables override these settings:
# - PORT
# - CONTENT_DIR
# - TEMPLATE_DIR
# - LOG_DIR
# - SYNCWATCH_HOST
# - SYNCWATCH_CHANNEL_CAPACITY
# - SYNCWATCH_LOG_LEVEL
# - SYNCWATCH_LOG_FORMAT

[server]
# Server host
host = "0.0.0.0"

# Server port
port = 3000

[content]
# Media files served under /content/
content_dir = "./content"

# Directory holding index.html
template_dir = "./templates"

[sync]
# Messages buffered per viewer; newer messages are dropped when full
channel_capacity = 64

# A viewer whose write stalls longer than this is disconnected (0 disables)
write_timeout_ms = 10000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Log file directory (syncwatch.log is appended)
log_dir = "./logs"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.addr(), "0.0.0.0:3000");
        assert_eq!(config.content.index_template(), PathBuf::from("./templates/index.html"));
        assert_eq!(config.sync.channel_capacity, 64);
        assert_eq!(config.sync.write_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.logging.log_dir, Some(PathBuf::from("./logs")));
    }

    #[test]
    fn test_generated_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.sync.channel_capacity, 64);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 8080\n\n[sync]\nwrite_timeout_ms = 0").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.sync.write_timeout(), None);
    }

    #[test]
    fn test_load_first_skips_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.toml");
        let good = dir.path().join("good.toml");
        std::fs::write(&broken, "[sync\nwrite_timeout_ms = ").unwrap();
        std::fs::write(&good, "[sync]\nwrite_timeout_ms = 250").unwrap();

        let (config, origin) = Config::load_first([
            dir.path().join("missing.toml"),
            broken.clone(),
            good.clone(),
        ]);

        assert_eq!(config.sync.write_timeout_ms, 250);
        assert_eq!(origin.path, Some(good));
        assert_eq!(origin.skipped.len(), 1);
        assert!(matches!(&origin.skipped[0], ConfigError::Parse { path, .. } if *path == broken));
    }

    #[test]
    fn test_load_first_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "not toml at all = = =").unwrap();

        let (config, origin) = Config::load_first([broken]);

        assert_eq!(config.sync.write_timeout_ms, 10_000);
        assert!(origin.path.is_none());
        assert_eq!(origin.skipped.len(), 1);
    }

    #[test]
    fn test_registry_capacity_clamped() {
        let mut sync = SyncConfig {
            channel_capacity: usize::MAX,
            ..Default::default()
        };
        assert_eq!(sync.registry_config().channel_capacity, MAX_CHANNEL_CAPACITY);

        sync.channel_capacity = 0;
        assert_eq!(sync.registry_config().channel_capacity, 1);

        sync.channel_capacity = 128;
        assert_eq!(sync.registry_config().channel_capacity, 128);
    }

    #[test]
    fn test_load_errors() {
        let missing = Config::load(Path::new("/nonexistent/syncwatch.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        let invalid = Config::load(file.path());
        assert!(matches!(invalid, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PORT", "4000"),
            ("CONTENT_DIR", "/srv/media"),
            ("TEMPLATE_DIR", "/srv/templates"),
            ("LOG_DIR", "/var/log/syncwatch"),
            ("SYNCWATCH_CHANNEL_CAPACITY", "8"),
            ("SYNCWATCH_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.content.content_dir, PathBuf::from("/srv/media"));
        assert_eq!(config.content.template_dir, PathBuf::from("/srv/templates"));
        assert_eq!(config.logging.log_dir, Some(PathBuf::from("/var/log/syncwatch")));
        assert_eq!(config.sync.channel_capacity, 8);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_port_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 3000);
    }
}
