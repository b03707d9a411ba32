//! # Syncwatch
//!
//! Watch-together playback sync. Every viewer of the same media opens a push
//! stream; when one of them resumes, pauses, or seeks, every other viewer is
//! told to do the same.
//!
//! ## Features
//!
//! - **Connection registry**: one live channel per viewer identity
//! - **Broadcast**: best-effort fan-out to everyone but the originator
//! - **Stream pumps**: Server-Sent Events or WebSocket push, torn down when
//!   the viewer becomes unreachable
//! - **Bounded channels**: a stalled viewer drops new messages instead of
//!   growing memory
//!
//! ## Modules
//!
//! - [`sync`]: Registry, dispatcher, and stream pump
//! - [`api`]: HTTP server with Axum
//! - [`config`]: TOML and environment configuration
//! - [`logging`]: Subscriber setup
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use syncwatch::sync::{ConnectionRegistry, Dispatcher, PlaybackAction, RegistryConfig};
//!
//! let registry = Arc::new(ConnectionRegistry::new(RegistryConfig::default()));
//! let dispatcher = Dispatcher::new(Arc::clone(&registry));
//!
//! registry.register("viewer-1");
//! registry.register("viewer-2");
//!
//! let report = dispatcher.dispatch("viewer-1", &PlaybackAction::Hold);
//! assert_eq!(report.delivered, 1);
//! ```

pub mod api;
pub mod config;
pub mod logging;
pub mod sync;

// Re-export top-level types for convenience
pub use api::{build_router, serve, ApiError, AppState};

pub use config::{
    Config, ConfigError, ConfigOrigin, ContentConfig, LoggingConfig, ServerConfig, SyncConfig,
};

pub use sync::{
    BodySink, ClientIdentity, ConnectionHandle, ConnectionRegistry, DispatchReport, Dispatcher,
    FrameSink, PlaybackAction, PumpExit, RegistryConfig, SinkError, StreamPump, Subscription,
    SyncError, WsSink,
};
