//! Network collaborator for the exchange protocol.
//!
//! A [`Host`] opens outbound byte streams to peers and hands out inbound
//! streams for the protocols it listens on. Peer discovery, dialing and
//! multiplexing are the host's business; the exchange only needs streams.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::messages::{PeerId, ProtocolId};

pub mod memory;

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// A bidirectional, ordered byte stream scoped to one exchange.
pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> ByteStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// A boxed [`ByteStream`].
pub type BoxedStream = Box<dyn ByteStream>;

/// A stream opened by a remote peer.
pub struct InboundStream {
    /// The peer that opened the stream.
    pub peer: PeerId,
    pub stream: BoxedStream,
}

impl std::fmt::Debug for InboundStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundStream").field("peer", &self.peer).finish()
    }
}

/// Host trait for opening and accepting protocol streams.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Host: Send + Sync {
    /// Get the local peer's identity.
    fn local_peer_id(&self) -> PeerId;

    /// Open a stream to `peer` under `protocol`.
    async fn new_stream(&self, peer: &PeerId, protocol: &ProtocolId) -> Result<BoxedStream>;

    /// Start accepting streams for `protocol`.
    ///
    /// Each inbound stream is delivered once on the returned channel.
    /// Fails with `AlreadyListening` if the protocol already has a listener.
    async fn listen(&self, protocol: &ProtocolId) -> Result<mpsc::Receiver<InboundStream>>;

    /// Stop accepting streams for `protocol`. Streams already delivered are
    /// unaffected.
    async fn unlisten(&self, protocol: &ProtocolId);
}
