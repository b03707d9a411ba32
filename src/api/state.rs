//! Application State
//!
//! Shared state accessible by all handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::sync::{ConnectionHandle, ConnectionRegistry, Dispatcher, StreamPump};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Live viewer connections
    pub registry: Arc<ConnectionRegistry>,
    /// Broadcasts playback actions to viewers
    pub dispatcher: Dispatcher,
    /// Server configuration
    pub config: Arc<Config>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
    /// Wall-clock start time reported by the health endpoint
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create state with a fresh, empty registry
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(config.sync.registry_config()));
        Self::with_registry(config, registry)
    }

    /// Create state around an existing registry
    pub fn with_registry(config: Config, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            dispatcher: Dispatcher::new(Arc::clone(&registry)),
            registry,
            config: Arc::new(config),
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Build the stream pump for a registered connection
    pub fn stream_pump(&self, handle: ConnectionHandle) -> StreamPump {
        let pump = StreamPump::new(Arc::clone(&self.registry), handle);
        match self.config.sync.write_timeout() {
            Some(limit) => pump.with_write_timeout(limit),
            None => pump,
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get live connection count
    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }
}
