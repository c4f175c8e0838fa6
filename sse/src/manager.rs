use crate::connection::{ConnectionRegistry, Payload, Subscription};
use crate::message::RelayEvent;
use log::*;
use std::sync::Arc;

/// Downstream side of the relay: the client registry plus the broadcaster.
pub struct Manager {
    registry: Arc<ConnectionRegistry>,
}

impl Manager {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
        }
    }

    /// Register a new downstream connection; dropping the subscription unregisters it.
    pub fn subscribe(&self) -> Subscription {
        let subscription = Subscription::open(self.registry.clone());
        info!(
            "Registered new SSE connection {} ({} connected)",
            subscription.id().as_str(),
            self.registry.len()
        );
        subscription
    }

    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    /// Serialize `event` once and hand it to every connected client.
    pub fn broadcast(&self, event: &RelayEvent) {
        let payload: Payload = match serde_json::to_string(event) {
            Ok(json) => json.into(),
            Err(e) => {
                error!("Failed to serialize relay event: {e}");
                return;
            }
        };

        let delivered = self.registry.broadcast(&payload);
        trace!(
            "Broadcast event {:?} (id {:?}) to {delivered} client(s)",
            event.event,
            event.id
        );
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}
