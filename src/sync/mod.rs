//! Playback Synchronization
//!
//! Keeps every viewer's player in step with the others.
//!
//! ## Architecture
//!
//! - **ConnectionRegistry**: one live message channel per viewer identity
//! - **Dispatcher**: fans an action out to every viewer but its originator
//! - **StreamPump**: per-connection loop writing channel messages to the viewer
//! - **Messages**: playback actions and their wire frame
//!
//! ## Flow
//!
//! A viewer pauses → the endpoint reads its identity → the dispatcher takes a
//! registry snapshot and enqueues `hold` on every other channel → each pump
//! writes `data: hold\n\n` to its own viewer.

mod dispatch;
mod messages;
mod pump;
mod registry;
mod sink;

pub use dispatch::{DispatchReport, Dispatcher};
pub use messages::{frame, PlaybackAction};
pub use pump::{PumpExit, StreamPump};
pub use registry::{
    ClientIdentity, ConnectionHandle, ConnectionRegistry, Peer, RegistryConfig, Subscription,
    MAX_CHANNEL_CAPACITY,
};
pub use sink::{BodySink, FrameSink, SinkError, WsSink};

use thiserror::Error;

/// Errors produced by the sync core
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid playback action: {0}")]
    InvalidAction(String),
}
