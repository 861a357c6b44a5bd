//! # Headex P2P
//!
//! The header exchange protocol: a client ([`Exchange`]) that fetches
//! extended headers from trusted peers, and a server ([`ExchangeServer`])
//! that answers such requests from a local store.
//!
//! ## Protocol
//!
//! One request per stream, routed by a [`ProtocolId`] such as
//! `/header-ex/v0.0.3/<network>`:
//!
//! 1. The client opens a stream and writes one [`ExtendedHeaderRequest`]
//!    selecting headers by hash, by height range, or "your head".
//! 2. The server writes one [`ExtendedHeaderResponse`] per header found, or a
//!    single `NOT_FOUND` / `INVALID` response, and closes the stream.
//!
//! Every message is a length-delimited CBOR frame (see [`codec`]).
//!
//! ## Head Reconciliation
//!
//! [`Exchange::head`] asks every trusted peer and picks one answer with
//! [`best_head`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use headex_p2p::{Exchange, ExchangeConfig, ProtocolId};
//!
//! let exchange = Exchange::new(host, trusted_peers, ProtocolId::header_exchange("private"), ExchangeConfig::default());
//! let head = exchange.head().await?;
//! let headers = exchange.get_range_by_height(1, head.height() + 1).await?;
//! ```

pub mod best_head;
pub mod codec;
pub mod error;
pub mod exchange;
pub mod messages;
pub mod server;
pub mod transport;

pub use best_head::{best_head, MIN_HEAD_RESPONSES};
pub use error::{CodecError, ExchangeError, InvalidPeerId, Result, TransportError};
pub use exchange::{Exchange, ExchangeConfig};
pub use messages::limits::MAX_HEADERS_PER_REQUEST;
pub use messages::{
    ExtendedHeaderRequest, ExtendedHeaderResponse, PeerId, ProtocolId, RequestData, StatusCode,
};
pub use server::ExchangeServer;
pub use transport::memory::{MemoryHost, MemoryNetwork};
pub use transport::{BoxedStream, ByteStream, Host, InboundStream};
