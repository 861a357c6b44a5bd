//! The serving side of the exchange protocol.
//!
//! [`ExchangeServer`] listens on a protocol id and answers each inbound
//! stream from a local [`Store`]. Every stream is handled on its own task.
//! The server only reads the store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use headex_core::HeaderHash;
use headex_store::{Store, StoreError};

use crate::codec::FramedStream;
use crate::error::{ExchangeError, Result};
use crate::messages::limits::MAX_HEADERS_PER_REQUEST;
use crate::messages::{ExtendedHeaderRequest, ExtendedHeaderResponse, ProtocolId, RequestData};
use crate::transport::{Host, InboundStream};

/// How long a peer has to send its request after opening a stream.
pub const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Answers header requests from a local store.
pub struct ExchangeServer<S, H> {
    host: Arc<H>,
    store: Arc<S>,
    protocol: ProtocolId,
    read_timeout: Duration,
    running: Mutex<Option<Running>>,
}

struct Running {
    cancel: CancellationToken,
    accept_loop: JoinHandle<()>,
}

impl<S, H> ExchangeServer<S, H>
where
    S: Store + 'static,
    H: Host + 'static,
{
    pub fn new(host: Arc<H>, store: Arc<S>, protocol: ProtocolId) -> Self {
        Self {
            host,
            store,
            protocol,
            read_timeout: REQUEST_READ_TIMEOUT,
            running: Mutex::new(None),
        }
    }

    /// Override how long a peer has to send its request.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn protocol(&self) -> &ProtocolId {
        &self.protocol
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Register with the host and start accepting streams.
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(ExchangeError::AlreadyStarted);
        }

        let inbound = self.host.listen(&self.protocol).await?;
        let cancel = CancellationToken::new();
        let accept_loop = tokio::spawn(accept_loop(
            Arc::clone(&self.store),
            inbound,
            self.read_timeout,
            cancel.clone(),
        ));

        tracing::debug!(protocol = %self.protocol, peer = %self.host.local_peer_id(), "exchange server started");
        *running = Some(Running {
            cancel,
            accept_loop,
        });
        Ok(())
    }

    /// Stop accepting streams. Requests already being served run to
    /// completion.
    pub async fn stop(&self) -> Result<()> {
        let running = self
            .running
            .lock()
            .await
            .take()
            .ok_or(ExchangeError::NotStarted)?;

        running.cancel.cancel();
        self.host.unlisten(&self.protocol).await;
        if let Err(e) = running.accept_loop.await {
            tracing::warn!(error = %e, "accept loop terminated abnormally");
        }

        tracing::debug!(protocol = %self.protocol, "exchange server stopped");
        Ok(())
    }
}

/// A server dropped while running stops its accept loop. The loop drops its
/// inbound receiver on exit, which frees the protocol on the host.
impl<S, H> Drop for ExchangeServer<S, H> {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
        }
    }
}

async fn accept_loop<S: Store + 'static>(
    store: Arc<S>,
    mut inbound: mpsc::Receiver<InboundStream>,
    read_timeout: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = inbound.recv() => match next {
                Some(stream) => {
                    tokio::spawn(handle_stream(Arc::clone(&store), stream, read_timeout));
                }
                None => break,
            },
        }
    }
}

/// Serve one request on one stream.
async fn handle_stream<S: Store>(store: Arc<S>, inbound: InboundStream, read_timeout: Duration) {
    let peer = inbound.peer;
    let mut framed = FramedStream::new(inbound.stream);

    let read = framed.recv::<ExtendedHeaderRequest>();
    let request = match tokio::time::timeout(read_timeout, read).await {
        Ok(Ok(Some(request))) => request,
        Ok(Ok(None)) => {
            tracing::debug!(%peer, "stream closed before request");
            return;
        }
        Ok(Err(e)) => {
            tracing::debug!(%peer, error = %e, "dropping stream with malformed request");
            return;
        }
        Err(_) => {
            tracing::debug!(%peer, "timed out waiting for request");
            return;
        }
    };

    let responses = resolve(store.as_ref(), &request).await;
    tracing::trace!(%peer, ?request, frames = responses.len(), "serving request");

    for response in &responses {
        if let Err(e) = framed.send(response).await {
            tracing::debug!(%peer, error = %e, "failed to write response");
            return;
        }
    }
    if let Err(e) = framed.close().await {
        tracing::debug!(%peer, error = %e, "failed to close stream");
    }
}

/// Compute the response frames for a request.
///
/// Store failures never reach the wire as-is: they become `NOT_FOUND` or
/// `INVALID`.
pub async fn resolve<S: Store + ?Sized>(
    store: &S,
    request: &ExtendedHeaderRequest,
) -> Vec<ExtendedHeaderResponse> {
    let amount = request.amount;
    if amount == 0 || amount > MAX_HEADERS_PER_REQUEST {
        return vec![ExtendedHeaderResponse::invalid()];
    }

    let lookup = match &request.data {
        RequestData::Hash(bytes) => match HeaderHash::try_from(&bytes[..]) {
            Ok(hash) => store.get(&hash).await.map(|h| vec![h]),
            Err(_) => return vec![ExtendedHeaderResponse::not_found()],
        },
        RequestData::Origin(origin) => {
            let head = store.height();
            let from = if *origin == 0 { head } else { *origin };
            if from == 0 || from > head {
                return vec![ExtendedHeaderResponse::not_found()];
            }
            if amount == 1 {
                store.get_by_height(from).await.map(|h| vec![h])
            } else {
                store
                    .get_range_by_height(from, from.saturating_add(amount))
                    .await
            }
        }
    };

    match lookup {
        Ok(headers) => headers.iter().map(ExtendedHeaderResponse::ok).collect(),
        Err(StoreError::NotFound(_)) => vec![ExtendedHeaderResponse::not_found()],
        Err(StoreError::InvalidRange { .. }) => vec![ExtendedHeaderResponse::invalid()],
        Err(e) => {
            tracing::warn!(error = %e, "store lookup failed");
            vec![ExtendedHeaderResponse::not_found()]
        }
    }
}
