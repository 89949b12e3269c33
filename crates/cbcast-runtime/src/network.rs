//! Outbound send capability and the in-memory network.

use crate::error::NetworkError;
use crate::inbox::{Envelope, Inbox};
use async_trait::async_trait;
use cbcast_core::ProcessId;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Reliable point-to-point channels to every known peer.
///
/// Channels need not preserve order. `send` must not block the caller on
/// the peer processing the message.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Id of the process this transport sends for.
    fn local_id(&self) -> ProcessId;

    /// Every peer this transport can reach, the local process excluded.
    fn peers(&self) -> Vec<ProcessId>;

    /// Send one wire message to a peer.
    async fn send(&self, to: ProcessId, body: String) -> Result<(), NetworkError>;
}

/// In-memory transport: a send is a push into the peer's inbox.
#[derive(Clone, Debug)]
pub struct MemoryTransport {
    local_id: ProcessId,
    routes: Arc<RwLock<BTreeMap<ProcessId, Inbox>>>,
}

impl MemoryTransport {
    pub fn new(local_id: ProcessId) -> Self {
        Self {
            local_id,
            routes: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Add a one-way route from this transport to `peer`'s inbox.
    pub fn connect(&self, peer: ProcessId, inbox: Inbox) {
        self.routes.write().insert(peer, inbox);
    }

    /// Drop the route to `peer`; later sends fail with `PeerNotFound`.
    pub fn disconnect(&self, peer: ProcessId) {
        self.routes.write().remove(&peer);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn local_id(&self) -> ProcessId {
        self.local_id
    }

    fn peers(&self) -> Vec<ProcessId> {
        self.routes
            .read()
            .keys()
            .copied()
            .filter(|&id| id != self.local_id)
            .collect()
    }

    async fn send(&self, to: ProcessId, body: String) -> Result<(), NetworkError> {
        let inbox = self.routes.read().get(&to).cloned();
        match inbox {
            Some(inbox) => {
                inbox.push(Envelope::new(self.local_id, body));
                Ok(())
            }
            None => Err(NetworkError::PeerNotFound(to)),
        }
    }
}

/// Create `count` fully connected in-memory transports with ids `0..count`,
/// each paired with the inbox it receives into.
pub fn create_network(count: usize) -> Vec<(MemoryTransport, Inbox)> {
    let nodes: Vec<(MemoryTransport, Inbox)> = (0..count)
        .map(|id| (MemoryTransport::new(id), Inbox::new()))
        .collect();

    for (transport, _) in &nodes {
        for (peer, inbox) in &nodes {
            if peer.local_id != transport.local_id {
                transport.connect(peer.local_id, inbox.clone());
            }
        }
    }

    nodes
}
