//! In-process [`Host`] implementation.
//!
//! Every stream is a `tokio::io::duplex` pair. Hosts register with a shared
//! [`MemoryNetwork`] which routes stream requests and can simulate
//! partitions between pairs of peers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};

use super::{BoxedStream, Host, InboundStream, Result};
use crate::error::TransportError;
use crate::messages::{PeerId, ProtocolId};

/// Buffer size of each direction of an in-memory stream.
const DUPLEX_BUF_SIZE: usize = 64 * 1024;

/// Pending inbound streams per listener.
const ACCEPT_QUEUE: usize = 64;

type Listeners = RwLock<HashMap<ProtocolId, mpsc::Sender<InboundStream>>>;

/// Shared state for the in-memory network.
#[derive(Default)]
pub struct MemoryNetwork {
    /// Listener table of each registered host.
    hosts: RwLock<HashMap<PeerId, Arc<Listeners>>>,

    /// Unordered peer pairs that cannot reach each other.
    partitions: RwLock<HashSet<(PeerId, PeerId)>>,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a host with the given identity.
    pub async fn create_host(self: &Arc<Self>, peer_id: PeerId) -> MemoryHost {
        let listeners = Arc::new(Listeners::default());
        self.hosts.write().await.insert(peer_id, listeners.clone());
        MemoryHost {
            peer_id,
            network: Arc::clone(self),
            listeners,
        }
    }

    /// Create `count` hosts with random identities. All can reach each other.
    pub async fn full_mesh(self: &Arc<Self>, count: usize) -> Vec<MemoryHost> {
        let mut hosts = Vec::with_capacity(count);
        for _ in 0..count {
            hosts.push(self.create_host(PeerId::random()).await);
        }
        hosts
    }

    /// Make `a` and `b` unreachable from each other.
    pub async fn disconnect(&self, a: &PeerId, b: &PeerId) {
        self.partitions.write().await.insert(pair(a, b));
    }

    /// Undo [`MemoryNetwork::disconnect`].
    pub async fn connect(&self, a: &PeerId, b: &PeerId) {
        self.partitions.write().await.remove(&pair(a, b));
    }

    async fn is_partitioned(&self, a: &PeerId, b: &PeerId) -> bool {
        self.partitions.read().await.contains(&pair(a, b))
    }
}

fn pair(a: &PeerId, b: &PeerId) -> (PeerId, PeerId) {
    if a <= b {
        (*a, *b)
    } else {
        (*b, *a)
    }
}

/// In-memory host.
#[derive(Clone)]
pub struct MemoryHost {
    peer_id: PeerId,
    network: Arc<MemoryNetwork>,
    listeners: Arc<Listeners>,
}

impl MemoryHost {
    pub fn network(&self) -> &Arc<MemoryNetwork> {
        &self.network
    }
}

#[async_trait]
impl Host for MemoryHost {
    fn local_peer_id(&self) -> PeerId {
        self.peer_id
    }

    async fn new_stream(&self, peer: &PeerId, protocol: &ProtocolId) -> Result<BoxedStream> {
        if self.network.is_partitioned(&self.peer_id, peer).await {
            return Err(TransportError::PeerUnreachable(*peer));
        }

        let remote = self
            .network
            .hosts
            .read()
            .await
            .get(peer)
            .cloned()
            .ok_or(TransportError::PeerUnreachable(*peer))?;

        let not_supported = || TransportError::ProtocolNotSupported {
            peer: *peer,
            protocol: protocol.to_string(),
        };
        let accept_tx = remote
            .read()
            .await
            .get(protocol)
            .cloned()
            .ok_or_else(not_supported)?;

        let (local, far) = tokio::io::duplex(DUPLEX_BUF_SIZE);
        accept_tx
            .send(InboundStream {
                peer: self.peer_id,
                stream: Box::new(far),
            })
            .await
            // Listener dropped its receiver without unlistening.
            .map_err(|_| not_supported())?;

        tracing::trace!(from = %self.peer_id, to = %peer, %protocol, "opened memory stream");
        Ok(Box::new(local))
    }

    async fn listen(&self, protocol: &ProtocolId) -> Result<mpsc::Receiver<InboundStream>> {
        let mut listeners = self.listeners.write().await;
        if listeners.get(protocol).is_some_and(|tx| !tx.is_closed()) {
            return Err(TransportError::AlreadyListening(protocol.to_string()));
        }

        let (tx, rx) = mpsc::channel(ACCEPT_QUEUE);
        listeners.insert(protocol.clone(), tx);
        Ok(rx)
    }

    async fn unlisten(&self, protocol: &ProtocolId) {
        self.listeners.write().await.remove(protocol);
    }
}
