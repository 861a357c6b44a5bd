//! Error types for the exchange protocol.

use thiserror::Error;

use headex_core::CoreError;

use crate::messages::PeerId;

/// Failures opening or routing streams.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer {0} is unreachable")]
    PeerUnreachable(PeerId),

    #[error("peer {peer} does not support protocol {protocol}")]
    ProtocolNotSupported { peer: PeerId, protocol: String },

    #[error("already listening on protocol {0}")]
    AlreadyListening(String),

    #[error("stream error: {0}")]
    Stream(String),
}

/// Framing and message (de)serialization failures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
#[error("invalid peer id: {0}")]
pub struct InvalidPeerId(pub String);

/// Errors surfaced by [`Exchange`](crate::Exchange) and
/// [`ExchangeServer`](crate::ExchangeServer).
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// No peer had the requested header(s), or no peer answered at all.
    #[error("header not found")]
    NotFound,

    /// A range request spans more headers than one request may carry.
    #[error("requested {requested} headers, limit is {max}")]
    HeadersLimitExceeded { requested: u64, max: u64 },

    #[error("invalid range: [{from}, {to})")]
    InvalidRange { from: u64, to: u64 },

    /// The peer answered INVALID.
    #[error("request rejected by peer {0}")]
    Rejected(PeerId),

    /// The peer's answer does not match what was asked for.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("header decode error: {0}")]
    Decode(#[from] CoreError),

    #[error("request to peer {0} timed out")]
    Timeout(PeerId),

    #[error("exchange cancelled")]
    Cancelled,

    #[error("server already started")]
    AlreadyStarted,

    #[error("server not started")]
    NotStarted,
}

impl ExchangeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ExchangeError::NotFound)
    }
}

/// Result type for exchange operations.
pub type Result<T> = std::result::Result<T, ExchangeError>;
