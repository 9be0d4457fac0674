//! Display client fanout
//!
//! The core only emits [`OutboundEvent`]s into a [`Broadcast`] sink. [`ClientFanout`]
//! is the bundled sink: every display client gets a bounded channel, and an event is
//! serialized once and offered to each channel without waiting. A client whose
//! channel is full or closed is dropped from the set; the others still get the event.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use crate::OutboundEvent;

/// Sink for outbound display events.
///
/// Called inline from the arbiter, so implementations must not block.
pub trait Broadcast: Send + Sync {
    fn broadcast(&self, event: OutboundEvent);
}

/// Identifier of a connected display client.
pub type ClientId = u64;

/// Receiving end handed to a display client connection.
pub struct ClientSubscription {
    pub id: ClientId,
    receiver: mpsc::Receiver<Arc<str>>,
}

impl ClientSubscription {
    /// Next serialized event, or `None` once the client was dropped or the fanout closed.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.receiver.recv().await
    }

    /// Next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<str>> {
        self.receiver.try_recv().ok()
    }

    pub fn into_stream(self) -> ReceiverStream<Arc<str>> {
        ReceiverStream::new(self.receiver)
    }
}

/// Best-effort fanout to every registered display client.
pub struct ClientFanout {
    clients: Mutex<HashMap<ClientId, mpsc::Sender<Arc<str>>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl ClientFanout {
    pub fn new(buffer: usize) -> Self {
        Self { clients: Mutex::new(HashMap::new()), next_id: AtomicU64::new(1), buffer: buffer.max(1) }
    }

    /// Register a new display client.
    pub fn register(&self) -> ClientSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.buffer);
        self.clients.lock().insert(id, sender);
        debug!(client = id, "Display client registered");
        ClientSubscription { id, receiver }
    }

    /// Register a client whose first event is the one `snapshot` returns.
    ///
    /// `snapshot` runs under the client registry lock, so a broadcast cannot slip
    /// in between reading the current state and queueing it.
    pub fn register_with<F>(&self, snapshot: F) -> ClientSubscription
    where
        F: FnOnce() -> OutboundEvent,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.buffer);

        let mut clients = self.clients.lock();
        let initial = snapshot();
        match initial.to_json() {
            Ok(payload) => {
                let _ = sender.try_send(Arc::from(payload));
            }
            Err(e) => error!("Failed to serialize {} event: {}", initial.name(), e),
        }
        clients.insert(id, sender);
        drop(clients);

        debug!(client = id, "Display client registered with snapshot");
        ClientSubscription { id, receiver }
    }

    pub fn unregister(&self, id: ClientId) {
        if self.clients.lock().remove(&id).is_some() {
            debug!(client = id, "Display client unregistered");
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Drop every client channel; their receivers end after draining.
    pub fn close_all(&self) {
        let mut clients = self.clients.lock();
        if !clients.is_empty() {
            info!("Closing {} display clients", clients.len());
        }
        clients.clear();
    }
}

impl Default for ClientFanout {
    fn default() -> Self {
        Self::new(32)
    }
}

impl Broadcast for ClientFanout {
    fn broadcast(&self, event: OutboundEvent) {
        let payload: Arc<str> = match event.to_json() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                error!("Failed to serialize {} event: {}", event.name(), e);
                return;
            }
        };

        let mut clients = self.clients.lock();
        clients.retain(|id, sender| match sender.try_send(Arc::clone(&payload)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(client = *id, "Display client stalled, dropping it");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(client = *id, "Display client gone");
                false
            }
        });
        debug!(event = event.name(), clients = clients.len(), "Event broadcast");
    }
}
