//! Stream Pump
//!
//! One pump runs per live connection. It is the only reader of the
//! connection's channel and copies every message onto the viewer's outbound
//! stream in order.
//!
//! ## Lifecycle
//!
//! `INIT` (waits for the channel under the handle's claim) → `ACTIVE`
//! (receive, write, flush, repeat) → exit. A failed write unregisters the
//! connection exactly once. The other exits (channel closed, registry
//! shutdown, takeover by a newer subscription of the same viewer, caller
//! cancellation) leave the registry untouched. A takeover outranks a
//! cancellation that arrives at the same time.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::registry::{ConnectionHandle, ConnectionRegistry};
use super::sink::{FrameSink, SinkError};

/// Why a stream pump stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// A write or flush failed; the connection was unregistered
    Failed,
    /// The channel was closed by an unregister
    Closed,
    /// The registry is shutting down
    Shutdown,
    /// A newer subscription for the same viewer took over the channel
    Superseded,
    /// The caller's cancellation token fired
    Cancelled,
}

/// Drains one connection's channel onto its outbound stream
pub struct StreamPump {
    registry: Arc<ConnectionRegistry>,
    handle: ConnectionHandle,
    write_timeout: Option<Duration>,
}

impl StreamPump {
    pub fn new(registry: Arc<ConnectionRegistry>, handle: ConnectionHandle) -> Self {
        Self {
            registry,
            handle,
            write_timeout: None,
        }
    }

    /// Treat a write that takes longer than `limit` as a transport failure
    pub fn with_write_timeout(mut self, limit: Duration) -> Self {
        self.write_timeout = Some(limit);
        self
    }

    /// Run until the transport fails or the registry shuts down
    pub async fn run<S: FrameSink>(self, sink: S) -> PumpExit {
        self.run_until(sink, CancellationToken::new()).await
    }

    /// Run until the transport fails, the registry shuts down, or `cancel`
    /// fires
    pub async fn run_until<S: FrameSink>(self, mut sink: S, cancel: CancellationToken) -> PumpExit {
        let client = self.handle.id().to_string();
        let serial = self.handle.serial();
        let shutdown = self.registry.shutdown_token();

        let generation = self.handle.generation();
        let mut takeover = self.handle.watch_takeover();

        // A pump already serving this viewer sees the newer claim and lets go
        let mut receiver = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return PumpExit::Shutdown,
            _ = superseded(&mut takeover, generation) => return PumpExit::Superseded,
            _ = cancel.cancelled() => return PumpExit::Cancelled,
            guard = Arc::clone(&self.handle.receiver).lock_owned() => guard,
        };

        tracing::debug!(client = %client, serial, "stream pump active");

        loop {
            let message = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return exit(&client, PumpExit::Shutdown),
                _ = superseded(&mut takeover, generation) => {
                    return exit(&client, PumpExit::Superseded)
                }
                _ = cancel.cancelled() => return exit(&client, PumpExit::Cancelled),
                message = receiver.recv() => message,
            };

            let Some(message) = message else {
                return exit(&client, PumpExit::Closed);
            };

            if let Err(e) = self.write(&mut sink, &message).await {
                tracing::warn!(client = %client, serial, error = %e, "writing message");
                receiver.close();
                self.registry.unregister_connection(&self.handle);
                return exit(&client, PumpExit::Failed);
            }
        }
    }

    async fn write<S: FrameSink>(&self, sink: &mut S, message: &str) -> Result<(), SinkError> {
        match self.write_timeout {
            Some(limit) => tokio::time::timeout(limit, sink.send_message(message))
                .await
                .map_err(|_| SinkError::Timeout)?,
            None => sink.send_message(message).await,
        }
    }
}

fn exit(client: &str, reason: PumpExit) -> PumpExit {
    tracing::debug!(client = %client, reason = ?reason, "stream pump stopped");
    reason
}

/// Resolves once a claim newer than `generation` is made
async fn superseded(takeover: &mut watch::Receiver<u64>, generation: u64) {
    loop {
        let current = *takeover.borrow_and_update();
        if current != generation {
            return;
        }
        if takeover.changed().await.is_err() {
            // Sender lives as long as the handle; never reached while running
            std::future::pending::<()>().await;
        }
    }
}
