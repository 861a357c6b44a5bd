//! Error types for headex core.

use thiserror::Error;

/// Errors raised while encoding, decoding or signing headers.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid hash length: expected 32 bytes, got {0}")]
    InvalidHashLength(usize),

    #[error("unsupported header version: {0}")]
    UnsupportedVersion(u8),

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("non-canonical header encoding")]
    NonCanonical,

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
