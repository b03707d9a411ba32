//! Broadcast Dispatcher
//!
//! Fans a playback action out to every connected viewer except the one who
//! triggered it. Delivery is best-effort and at-most-once: a peer whose
//! channel is full loses the new message (drop-newest), and a peer that
//! disconnected after the snapshot is skipped.

use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;

use super::messages::PlaybackAction;
use super::registry::ConnectionRegistry;

/// Per-call delivery counts, for logging and tests
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Messages enqueued
    pub delivered: usize,
    /// Messages discarded because the peer's channel was full
    pub dropped: usize,
    /// Peers whose channel closed between snapshot and send
    pub closed: usize,
}

impl DispatchReport {
    /// Number of peers the action was addressed to
    pub fn targeted(&self) -> usize {
        self.delivered + self.dropped + self.closed
    }
}

/// Sends playback actions to all registered connections but the originator
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Broadcast `action` to every viewer except `originator`
    pub fn dispatch(&self, originator: &str, action: &PlaybackAction) -> DispatchReport {
        let message = action.as_wire();
        // Snapshot releases the registry lock before anything is sent
        let peers = self.registry.snapshot(originator);

        let mut report = DispatchReport::default();
        for peer in peers {
            match peer.try_send(message.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    tracing::warn!(
                        client = %peer.id(),
                        action = %message,
                        "channel full, dropping message"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    report.closed += 1;
                    tracing::debug!(client = %peer.id(), "peer disconnected before send");
                }
            }
        }

        tracing::info!(
            client = %originator,
            action = %message,
            delivered = report.delivered,
            "dispatched"
        );
        report
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}
