//! Connection Registry
//!
//! Tracks one live message channel per viewer identity. The map is guarded by
//! a single mutex that is only held for insert, remove, or snapshot; sends
//! always happen after the guard is released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

/// Opaque token identifying one viewer's session
pub type ClientIdentity = String;

/// Upper bound on a connection's channel capacity
pub const MAX_CHANNEL_CAPACITY: usize = 65_536;

/// Configuration for the connection registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of each connection's message channel
    pub channel_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

/// Registry entry: the send half owned by the registry plus the shared
/// receive half handed to whichever pump currently serves the connection.
struct ConnectionEntry {
    serial: u64,
    sender: mpsc::Sender<String>,
    receiver: Arc<AsyncMutex<mpsc::Receiver<String>>>,
    takeover: Arc<watch::Sender<u64>>,
}

impl ConnectionEntry {
    /// Hand out the channel under a new claim generation. Any pump serving
    /// an older generation stops reading.
    fn claim(&self, id: &str) -> ConnectionHandle {
        let mut generation = 0;
        self.takeover.send_modify(|current| {
            *current += 1;
            generation = *current;
        });
        ConnectionHandle {
            id: id.to_string(),
            serial: self.serial,
            generation,
            receiver: Arc::clone(&self.receiver),
            takeover: Arc::clone(&self.takeover),
        }
    }

    fn is_claimed_by(&self, handle: &ConnectionHandle) -> bool {
        self.serial == handle.serial && *self.takeover.borrow() == handle.generation
    }
}

/// Handle to a registered connection, used by the stream pump.
///
/// The handle never holds a sender, so removing the entry from the registry
/// is enough to close the channel. Each subscribe hands out a new claim
/// generation; only the newest claim may read or tear down the connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ClientIdentity,
    serial: u64,
    generation: u64,
    pub(crate) receiver: Arc<AsyncMutex<mpsc::Receiver<String>>>,
    takeover: Arc<watch::Sender<u64>>,
}

impl ConnectionHandle {
    /// Identity that owns this connection
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Process-unique serial of the underlying channel
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Whether both handles refer to the same channel
    pub fn same_channel(&self, other: &ConnectionHandle) -> bool {
        self.serial == other.serial && Arc::ptr_eq(&self.receiver, &other.receiver)
    }

    /// Claim generation this handle was issued under
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a newer subscription has claimed the channel since
    pub fn is_superseded(&self) -> bool {
        *self.takeover.borrow() != self.generation
    }

    pub(crate) fn watch_takeover(&self) -> watch::Receiver<u64> {
        self.takeover.subscribe()
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("serial", &self.serial)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Result of a subscribe: a new channel, or the one already registered
#[derive(Debug, Clone)]
pub enum Subscription {
    Fresh(ConnectionHandle),
    Resumed(ConnectionHandle),
}

impl Subscription {
    pub fn handle(&self) -> &ConnectionHandle {
        match self {
            Subscription::Fresh(handle) | Subscription::Resumed(handle) => handle,
        }
    }

    pub fn into_handle(self) -> ConnectionHandle {
        match self {
            Subscription::Fresh(handle) | Subscription::Resumed(handle) => handle,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Subscription::Fresh(_))
    }
}

/// Send half of another viewer's channel, taken from a registry snapshot
#[derive(Debug, Clone)]
pub struct Peer {
    id: ClientIdentity,
    sender: mpsc::Sender<String>,
}

impl Peer {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Enqueue without waiting; a full channel rejects the message
    pub fn try_send(&self, message: String) -> Result<(), TrySendError<String>> {
        self.sender.try_send(message)
    }
}

/// Shared mapping from viewer identity to its live connection
pub struct ConnectionRegistry {
    entries: Mutex<HashMap<ClientIdentity, ConnectionEntry>>,
    next_serial: AtomicU64,
    shutdown: CancellationToken,
    config: RegistryConfig,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_serial: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
            config,
        }
    }

    // A panic while holding the guard cannot leave the map half-mutated, so
    // a poisoned lock is still usable.
    fn entries(&self) -> MutexGuard<'_, HashMap<ClientIdentity, ConnectionEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a viewer, creating its channel if it has none.
    ///
    /// Subscribing twice without an intervening unregister returns the same
    /// channel as [`Subscription::Resumed`], under a newer claim.
    pub fn register(&self, id: &str) -> Subscription {
        let mut entries = self.entries();
        if let Some(entry) = entries.get(id) {
            let handle = entry.claim(id);
            drop(entries);
            tracing::debug!(client = %id, serial = handle.serial(), "resuming connection");
            return Subscription::Resumed(handle);
        }

        let capacity = self.config.channel_capacity.clamp(1, MAX_CHANNEL_CAPACITY);
        let (sender, receiver) = mpsc::channel(capacity);
        let (takeover, _) = watch::channel(0);
        let entry = ConnectionEntry {
            serial: self.next_serial.fetch_add(1, Ordering::Relaxed),
            sender,
            receiver: Arc::new(AsyncMutex::new(receiver)),
            takeover: Arc::new(takeover),
        };
        let handle = entry.claim(id);
        entries.insert(id.to_string(), entry);
        drop(entries);

        tracing::info!(client = %id, serial = handle.serial(), "creating connection");
        Subscription::Fresh(handle)
    }

    /// Remove a viewer and close its channel. Returns false if it was absent.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.entries().remove(id);
        match removed {
            Some(entry) => {
                tracing::info!(client = %id, serial = entry.serial, "deleting connection");
                true
            }
            None => false,
        }
    }

    /// Remove the viewer only if its registered channel is still the one
    /// behind `handle` and no newer subscription has claimed it.
    pub fn unregister_connection(&self, handle: &ConnectionHandle) -> bool {
        let mut entries = self.entries();
        let current = entries
            .get(handle.id())
            .is_some_and(|entry| entry.is_claimed_by(handle));
        if !current {
            return false;
        }
        let removed = entries.remove(handle.id());
        drop(entries);

        tracing::info!(client = %handle.id(), serial = handle.serial(), "deleting connection");
        removed.is_some()
    }

    /// Send halves of every registered channel except the one owned by
    /// `exclude`
    pub fn snapshot(&self, exclude: &str) -> Vec<Peer> {
        self.entries()
            .iter()
            .filter(|(id, _)| id.as_str() != exclude)
            .map(|(id, entry)| Peer {
                id: id.clone(),
                sender: entry.sender.clone(),
            })
            .collect()
    }

    /// Whether the identity currently has a live connection
    pub fn contains(&self, id: &str) -> bool {
        self.entries().contains_key(id)
    }

    /// Current connection count
    pub fn connection_count(&self) -> usize {
        self.entries().len()
    }

    /// Registered identities, sorted
    pub fn identities(&self) -> Vec<ClientIdentity> {
        let mut ids: Vec<_> = self.entries().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Signal every stream pump to stop
    pub fn shutdown(&self) {
        tracing::info!(connections = self.connection_count(), "stopping stream pumps");
        self.shutdown.cancel();
    }

    /// Token that fires when [`shutdown`](Self::shutdown) is called
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
