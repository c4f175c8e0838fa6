use dashmap::DashMap;
use log::*;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// A serialized `RelayEvent`, shared by every client it is delivered to.
pub type Payload = Arc<str>;

/// Unique identifier for a downstream connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Set of downstream output channels, one per connected subscriber.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, UnboundedSender<Payload>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    pub fn register(&self, sender: UnboundedSender<Payload>) -> ConnectionId {
        let connection_id = ConnectionId::new();
        self.connections.insert(connection_id.clone(), sender);
        connection_id
    }

    /// Returns whether the connection was still registered.
    pub fn unregister(&self, connection_id: &ConnectionId) -> bool {
        self.connections.remove(connection_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Send a payload to every registered connection - O(n)
    ///
    /// Connections whose receiving side has gone away are evicted rather than
    /// reported; one dead client never affects delivery to the others.
    /// Returns the number of connections the payload was handed to.
    pub fn broadcast(&self, payload: &Payload) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.connections.iter() {
            if entry.value().is_closed() || entry.value().send(payload.clone()).is_err() {
                closed.push(entry.key().clone());
            } else {
                delivered += 1;
            }
        }

        // Removal has to wait until the iterator has released its shard locks
        for connection_id in closed {
            debug!(
                "Evicting closed SSE connection {}",
                connection_id.as_str()
            );
            self.connections.remove(&connection_id);
        }

        delivered
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of one downstream connection.
///
/// Dropping the subscription unregisters it, so the HTTP layer only has to
/// drop its response stream when the client goes away.
pub struct Subscription {
    connection_id: ConnectionId,
    receiver: UnboundedReceiver<Payload>,
    registry: Arc<ConnectionRegistry>,
}

impl Subscription {
    pub(crate) fn open(registry: Arc<ConnectionRegistry>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection_id = registry.register(sender);
        Self {
            connection_id,
            receiver,
            registry,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Next payload in upstream arrival order; `None` once the connection was evicted.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.registry.unregister(&self.connection_id) {
            info!(
                "Unregistered SSE connection {} ({} remaining)",
                self.connection_id.as_str(),
                self.registry.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(text: &str) -> Payload {
        Arc::from(text)
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscription() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut a = Subscription::open(registry.clone());
        let mut b = Subscription::open(registry.clone());

        assert_eq!(registry.broadcast(&payload("one")), 2);

        assert_eq!(a.recv().await.as_deref(), Some("one"));
        assert_eq!(b.recv().await.as_deref(), Some("one"));
    }

    #[tokio::test]
    async fn test_per_client_order_matches_broadcast_order() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut sub = Subscription::open(registry.clone());

        for n in 0..50 {
            registry.broadcast(&payload(&n.to_string()));
        }

        for n in 0..50 {
            assert_eq!(sub.recv().await.as_deref(), Some(n.to_string().as_str()));
        }
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_unregistered() {
        let registry = Arc::new(ConnectionRegistry::new());
        let a = Subscription::open(registry.clone());
        let mut b = Subscription::open(registry.clone());
        assert_eq!(registry.len(), 2);

        drop(a);
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.broadcast(&payload("after")), 1);
        assert_eq!(b.recv().await.as_deref(), Some("after"));
    }

    #[test]
    fn test_broadcast_evicts_closed_receivers() {
        let registry = ConnectionRegistry::new();
        let (open_tx, _open_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        registry.register(open_tx);
        registry.register(closed_tx);
        drop(closed_rx);

        assert_eq!(registry.broadcast(&payload("x")), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_twice_reports_absence() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = registry.register(tx);

        assert!(registry.unregister(&id));
        assert!(!registry.unregister(&id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }
}
