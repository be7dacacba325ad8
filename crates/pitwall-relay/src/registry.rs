use dashmap::DashMap;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// Unique viewer identifier, assigned at connect time.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ViewerId(pub String);

impl Default for ViewerId {
    fn default() -> Self {
        Self(format!("viewer_{}", Uuid::now_v7()))
    }
}

impl ViewerId {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for ViewerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry of all connected dashboard viewers.
///
/// Owns every outbound push channel for its lifetime: a viewer is inserted on
/// connect and removed on disconnect or the first failed send. The underlying
/// map serializes structural mutation, so a broadcast pass never observes a
/// viewer mid-teardown.
pub struct ViewerRegistry {
    viewers: DashMap<ViewerId, mpsc::Sender<String>>,
    max_send_queue: usize,
    occupancy: watch::Sender<usize>,
}

impl ViewerRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        let (occupancy, _) = watch::channel(0);
        Self {
            viewers: DashMap::new(),
            max_send_queue,
            occupancy,
        }
    }

    /// Register a new viewer. Returns its ID and the receiving end of its
    /// bounded push channel.
    pub fn register(&self) -> (ViewerId, mpsc::Receiver<String>) {
        let id = ViewerId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        self.viewers.insert(id.clone(), tx);
        self.publish_occupancy();
        tracing::info!(viewer_id = %id, viewers = self.viewers.len(), "viewer connected");
        (id, rx)
    }

    /// Remove a viewer. No-op if already gone.
    pub fn unregister(&self, id: &ViewerId) {
        if self.viewers.remove(id).is_some() {
            self.publish_occupancy();
            tracing::info!(viewer_id = %id, viewers = self.viewers.len(), "viewer disconnected");
        }
    }

    /// Deliver `message` to every registered viewer.
    ///
    /// Sends never block. A viewer whose channel is closed, or whose queue is
    /// full because it stopped draining, is unregistered and the pass
    /// continues with the rest. Returns the number of successful deliveries.
    pub fn broadcast(&self, message: &str) -> usize {
        let mut delivered = 0;
        let mut dead: Vec<ViewerId> = Vec::new();

        for entry in self.viewers.iter() {
            match entry.value().try_send(message.to_string()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(viewer_id = %entry.key(), "send queue full, dropping slow viewer");
                    dead.push(entry.key().clone());
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    dead.push(entry.key().clone());
                }
            }
        }

        // Removal happens outside the iteration pass.
        for id in dead {
            self.unregister(&id);
        }
        delivered
    }

    /// Send to a single viewer. Returns false if the viewer is gone or its
    /// queue rejected the message.
    pub fn send_to(&self, id: &ViewerId, message: String) -> bool {
        match self.viewers.get(id) {
            Some(entry) => entry.value().try_send(message).is_ok(),
            None => false,
        }
    }

    /// Number of connected viewers.
    pub fn count(&self) -> usize {
        self.viewers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }

    /// Occupancy updates for feed gating: the current viewer count, published
    /// on every register and unregister.
    pub fn watch_occupancy(&self) -> watch::Receiver<usize> {
        self.occupancy.subscribe()
    }

    fn publish_occupancy(&self) {
        self.occupancy.send_replace(self.viewers.len());
    }
}
