//! A node: one store, served to peers and filled from peers.

use std::sync::Arc;

use headex_p2p::{Exchange, ExchangeServer, Host, ProtocolId, MAX_HEADERS_PER_REQUEST};
use headex_store::Store;

use crate::config::NodeConfig;
use crate::error::Result;

/// Wires a [`Store`] to the exchange protocol.
///
/// The node serves its store to other peers through an [`ExchangeServer`]
/// and queries its trusted peers through an [`Exchange`].
pub struct Node<S, H> {
    store: Arc<S>,
    server: ExchangeServer<S, H>,
    exchange: Exchange<H>,
    protocol: ProtocolId,
}

impl<S, H> Node<S, H>
where
    S: Store + 'static,
    H: Host + 'static,
{
    pub fn new(store: S, host: H, config: NodeConfig) -> Self {
        let store = Arc::new(store);
        let host = Arc::new(host);
        let protocol = config.protocol();

        let server = ExchangeServer::new(Arc::clone(&host), Arc::clone(&store), protocol.clone());
        let exchange = Exchange::new(host, config.trusted_peers, protocol.clone(), config.exchange);

        Self {
            store,
            server,
            exchange,
            protocol,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn exchange(&self) -> &Exchange<H> {
        &self.exchange
    }

    pub fn protocol(&self) -> &ProtocolId {
        &self.protocol
    }

    /// Start the store, then begin serving it.
    pub async fn start(&self) -> Result<()> {
        self.store.start().await?;
        self.server.start().await?;
        tracing::info!(protocol = %self.protocol, height = self.store.height(), "node started");
        Ok(())
    }

    /// Stop serving, then stop the store.
    pub async fn stop(&self) -> Result<()> {
        self.server.stop().await?;
        self.store.stop().await?;
        tracing::info!(protocol = %self.protocol, "node stopped");
        Ok(())
    }

    /// Bring the local store up to the network head.
    ///
    /// Fetches every height between the local head and the reconciled
    /// network head, in ranges of at most [`MAX_HEADERS_PER_REQUEST`].
    /// Returns the number of headers appended.
    pub async fn sync_to_head(&self) -> Result<usize> {
        let target = self.exchange.head().await?.height();
        let local = self.store.height();
        if target <= local {
            tracing::debug!(local, target, "already at network head");
            return Ok(0);
        }

        let mut appended = 0;
        let mut from = local + 1;
        while from <= target {
            let to = from.saturating_add(MAX_HEADERS_PER_REQUEST).min(target + 1);
            let headers = self.exchange.get_range_by_height(from, to).await?;
            appended += self.store.append(&headers).await?;
            tracing::debug!(from, to, "fetched header range");
            from = to;
        }

        tracing::info!(appended, height = self.store.height(), "synced to network head");
        Ok(appended)
    }
}
