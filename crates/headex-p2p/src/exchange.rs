//! The requesting side of the exchange protocol.
//!
//! [`Exchange`] resolves header queries against a fixed set of trusted
//! peers. Point and range queries go to one peer at a time until one
//! answers; head queries go to every peer at once and the answers are
//! reconciled with [`best_head`].

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use headex_core::{ExtendedHeader, HeaderHash};

use crate::best_head::best_head;
use crate::codec::FramedStream;
use crate::error::{ExchangeError, Result};
use crate::messages::limits::MAX_HEADERS_PER_REQUEST;
use crate::messages::{
    ExtendedHeaderRequest, ExtendedHeaderResponse, PeerId, ProtocolId, RequestData, StatusCode,
};
use crate::transport::Host;

/// Configuration for an [`Exchange`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Deadline for one request to one peer, from opening the stream to the
    /// last response frame.
    #[serde(with = "millis")]
    pub request_timeout: Duration,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Durations as integer milliseconds.
mod millis {
    use serde::ser::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(d.as_millis()).map_err(S::Error::custom)?;
        s.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Client for the header exchange protocol.
pub struct Exchange<H> {
    host: Arc<H>,
    trusted_peers: Vec<PeerId>,
    protocol: ProtocolId,
    config: ExchangeConfig,
    cancel: CancellationToken,
}

impl<H: Host + 'static> Exchange<H> {
    pub fn new(
        host: Arc<H>,
        trusted_peers: Vec<PeerId>,
        protocol: ProtocolId,
        config: ExchangeConfig,
    ) -> Self {
        Self {
            host,
            trusted_peers,
            protocol,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that aborts every in-flight and future request of this
    /// exchange with [`ExchangeError::Cancelled`].
    ///
    /// Cancelling it permanently shuts down this exchange: a token cannot be
    /// reset, so later calls keep failing. Build a new `Exchange` to resume.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn trusted_peers(&self) -> &[PeerId] {
        &self.trusted_peers
    }

    pub fn protocol(&self) -> &ProtocolId {
        &self.protocol
    }

    /// Ask every trusted peer for its head and reconcile the answers.
    ///
    /// Peers that fail are skipped. Fails with `NotFound` if none answers.
    pub async fn head(&self) -> Result<ExtendedHeader> {
        let request = ExtendedHeaderRequest::head();
        let results = join_all(
            self.trusted_peers
                .iter()
                .map(|peer| self.request_from(peer, &request)),
        )
        .await;

        let mut candidates = Vec::with_capacity(results.len());
        for (peer, result) in self.trusted_peers.iter().zip(results) {
            match result {
                Ok(headers) => candidates.extend(headers),
                Err(e) => tracing::debug!(%peer, error = %e, "head request failed"),
            }
        }

        if candidates.is_empty() && self.cancel.is_cancelled() {
            return Err(ExchangeError::Cancelled);
        }
        let head = best_head(&candidates)?;
        tracing::debug!(
            height = head.height(),
            responses = candidates.len(),
            peers = self.trusted_peers.len(),
            "resolved network head"
        );
        Ok(head)
    }

    /// Fetch the header with the given hash.
    pub async fn get(&self, hash: &HeaderHash) -> Result<ExtendedHeader> {
        let request = ExtendedHeaderRequest::by_hash(hash);
        single(self.request_any(&request).await?)
    }

    /// Fetch the header at `height`.
    pub async fn get_by_height(&self, height: u64) -> Result<ExtendedHeader> {
        if height == 0 {
            return Err(ExchangeError::InvalidRange { from: 0, to: 1 });
        }
        let request = ExtendedHeaderRequest::by_height(height, 1);
        single(self.request_any(&request).await?)
    }

    /// Fetch the headers in `[from, to)`, in ascending height order.
    ///
    /// All or nothing: if the peers lack any height in the range the call
    /// fails with `NotFound`. Ranges wider than
    /// [`MAX_HEADERS_PER_REQUEST`] are refused before any network call.
    pub async fn get_range_by_height(&self, from: u64, to: u64) -> Result<Vec<ExtendedHeader>> {
        if from == 0 || to <= from {
            return Err(ExchangeError::InvalidRange { from, to });
        }
        let amount = to - from;
        if amount > MAX_HEADERS_PER_REQUEST {
            return Err(ExchangeError::HeadersLimitExceeded {
                requested: amount,
                max: MAX_HEADERS_PER_REQUEST,
            });
        }

        let request = ExtendedHeaderRequest::by_height(from, amount);
        self.request_any(&request).await
    }

    /// Try trusted peers in random order until one answers.
    async fn request_any(&self, request: &ExtendedHeaderRequest) -> Result<Vec<ExtendedHeader>> {
        if self.cancel.is_cancelled() {
            return Err(ExchangeError::Cancelled);
        }

        let mut peers = self.trusted_peers.clone();
        peers.shuffle(&mut rand::thread_rng());

        let mut not_found = false;
        let mut last_error = None;
        for peer in &peers {
            match self.request_from(peer, request).await {
                Ok(headers) => return Ok(headers),
                Err(ExchangeError::Cancelled) => return Err(ExchangeError::Cancelled),
                Err(ExchangeError::NotFound) => {
                    tracing::debug!(%peer, "peer does not have requested headers");
                    not_found = true;
                }
                Err(e) => {
                    tracing::warn!(%peer, error = %e, "header request failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !not_found => Err(e),
            _ => Err(ExchangeError::NotFound),
        }
    }

    /// Run one request against one peer, bounded by the request timeout and
    /// the cancellation token.
    async fn request_from(
        &self,
        peer: &PeerId,
        request: &ExtendedHeaderRequest,
    ) -> Result<Vec<ExtendedHeader>> {
        let exchange =
            tokio::time::timeout(self.config.request_timeout, self.exchange(peer, request));
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ExchangeError::Cancelled),
            result = exchange => result.unwrap_or(Err(ExchangeError::Timeout(*peer))),
        }
    }

    async fn exchange(
        &self,
        peer: &PeerId,
        request: &ExtendedHeaderRequest,
    ) -> Result<Vec<ExtendedHeader>> {
        let stream = self.host.new_stream(peer, &self.protocol).await?;
        let mut framed = FramedStream::new(stream);
        framed.send(request).await?;

        let expected = request.expected_responses().min(MAX_HEADERS_PER_REQUEST) as usize;
        let mut headers = Vec::with_capacity(expected);
        while headers.len() < expected {
            let response: ExtendedHeaderResponse = framed.recv().await?.ok_or_else(|| {
                ExchangeError::InvalidResponse(format!(
                    "stream closed after {} of {} headers",
                    headers.len(),
                    expected
                ))
            })?;
            match response.status {
                StatusCode::Ok => headers.push(response.header()?),
                StatusCode::NotFound => return Err(ExchangeError::NotFound),
                StatusCode::Invalid => return Err(ExchangeError::Rejected(*peer)),
            }
        }

        check_response(request, &headers)?;
        Ok(headers)
    }
}

/// Check that the headers answer the request that was sent.
fn check_response(request: &ExtendedHeaderRequest, headers: &[ExtendedHeader]) -> Result<()> {
    match &request.data {
        RequestData::Hash(hash) => {
            if let Some(header) = headers.iter().find(|h| h.hash().as_bytes()[..] != hash[..]) {
                return Err(ExchangeError::InvalidResponse(format!(
                    "asked for hash {}, got {}",
                    hex::encode(hash),
                    header.hash()
                )));
            }
        }
        // Head: any single header will do.
        RequestData::Origin(0) => {}
        RequestData::Origin(from) => {
            for (expected, header) in (*from..).zip(headers) {
                if header.height() != expected {
                    return Err(ExchangeError::InvalidResponse(format!(
                        "expected height {}, got {}",
                        expected,
                        header.height()
                    )));
                }
            }
        }
    }
    Ok(())
}

fn single(mut headers: Vec<ExtendedHeader>) -> Result<ExtendedHeader> {
    match (headers.pop(), headers.is_empty()) {
        (Some(header), true) => Ok(header),
        _ => Err(ExchangeError::InvalidResponse(
            "expected exactly one header".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ExchangeServer;
    use crate::transport::memory::{MemoryHost, MemoryNetwork};
    use headex_store::MemoryStore;
    use headex_testkit::TestSuite;

    fn protocol() -> ProtocolId {
        ProtocolId::header_exchange("private")
    }

    /// A client host plus one serving peer per store.
    async fn network_with(
        stores: Vec<MemoryStore>,
    ) -> (
        Exchange<MemoryHost>,
        Vec<ExchangeServer<MemoryStore, MemoryHost>>,
    ) {
        let network = MemoryNetwork::new();
        let hosts = network.full_mesh(stores.len() + 1).await;

        let mut servers = Vec::new();
        for (host, store) in hosts[1..].iter().zip(stores) {
            let server = ExchangeServer::new(Arc::new(host.clone()), Arc::new(store), protocol());
            server.start().await.unwrap();
            servers.push(server);
        }

        let peers = hosts[1..].iter().map(|h| h.local_peer_id()).collect();
        let exchange = Exchange::new(
            Arc::new(hosts[0].clone()),
            peers,
            protocol(),
            ExchangeConfig::default(),
        );
        (exchange, servers)
    }

    fn store(count: usize) -> MemoryStore {
        MemoryStore::with_headers(TestSuite::new().generate(count)).unwrap()
    }

    #[test]
    fn test_config_from_json() {
        let config: ExchangeConfig = serde_json::from_str(r#"{"request_timeout": 250}"#).unwrap();
        assert_eq!(config.request_timeout, Duration::from_millis(250));

        let defaulted: ExchangeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(defaulted, ExchangeConfig::default());
    }

    #[test]
    fn test_config_timeout_out_of_range() {
        let config = ExchangeConfig {
            request_timeout: Duration::MAX,
        };
        assert!(serde_json::to_string(&config).is_err());

        let json = serde_json::to_string(&ExchangeConfig::default()).unwrap();
        assert_eq!(json, r#"{"request_timeout":10000}"#);
    }

    #[tokio::test]
    async fn test_limit_checked_before_network() {
        // No peers at all: a network call would fail with NotFound instead.
        let network = MemoryNetwork::new();
        let host = network.create_host(PeerId::random()).await;
        let exchange = Exchange::new(Arc::new(host), vec![], protocol(), ExchangeConfig::default());

        assert!(matches!(
            exchange.get_range_by_height(1, 600).await,
            Err(ExchangeError::HeadersLimitExceeded { requested: 599, max: 512 })
        ));
        assert!(matches!(
            exchange.get_range_by_height(5, 5).await,
            Err(ExchangeError::InvalidRange { .. })
        ));
        assert!(matches!(
            exchange.get_by_height(0).await,
            Err(ExchangeError::InvalidRange { .. })
        ));
    }

    #[tokio::test]
    async fn test_no_peers_is_not_found() {
        let network = MemoryNetwork::new();
        let host = network.create_host(PeerId::random()).await;
        let exchange = Exchange::new(Arc::new(host), vec![], protocol(), ExchangeConfig::default());

        assert!(exchange.head().await.unwrap_err().is_not_found());
        assert!(exchange.get_by_height(1).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_falls_through_to_peer_that_has_it() {
        let (exchange, _servers) = network_with(vec![store(2), store(8), store(3)]).await;

        for _ in 0..5 {
            let header = exchange.get_by_height(7).await.unwrap();
            assert_eq!(header.height(), 7);
        }
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_skipped() {
        let (exchange, servers) = network_with(vec![store(4), store(4)]).await;
        servers[0].stop().await.unwrap();

        for _ in 0..5 {
            assert_eq!(exchange.get_by_height(4).await.unwrap().height(), 4);
        }
        assert_eq!(exchange.head().await.unwrap().height(), 4);
    }

    #[tokio::test]
    async fn test_transport_error_surfaces_when_no_peer_answers() {
        let (exchange, servers) = network_with(vec![store(4)]).await;
        servers[0].stop().await.unwrap();

        assert!(matches!(
            exchange.get_by_height(1).await,
            Err(ExchangeError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_exchange() {
        let (exchange, _servers) = network_with(vec![store(4)]).await;
        exchange.cancel_token().cancel();

        assert!(matches!(exchange.get_by_height(1).await, Err(ExchangeError::Cancelled)));
        assert!(matches!(exchange.head().await, Err(ExchangeError::Cancelled)));
        // Cancellation is permanent for this exchange.
        assert!(matches!(exchange.get_by_height(1).await, Err(ExchangeError::Cancelled)));
    }

    #[test]
    fn test_check_response_rejects_wrong_heights() {
        let headers = TestSuite::new().generate(3);
        let request = ExtendedHeaderRequest::by_height(2, 2);

        assert!(check_response(&request, &headers[1..]).is_ok());
        assert!(matches!(
            check_response(&request, &headers[..2]),
            Err(ExchangeError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_check_response_rejects_wrong_hash() {
        let headers = TestSuite::new().generate(2);
        let request = ExtendedHeaderRequest::by_hash(&headers[0].hash());

        assert!(check_response(&request, &headers[..1]).is_ok());
        assert!(check_response(&request, &headers[1..]).is_err());
    }
}
