//! # Headex Core
//!
//! Pure primitives for header exchange: extended headers, their identifying
//! hashes, signing keys and the canonical byte encoding.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`ExtendedHeader`] - A signed block header, identified by its [`HeaderHash`]
//! - [`RawHeader`] - The signed portion of an extended header
//! - [`HeaderBuilder`] - Builds and signs extended headers
//! - [`Keypair`] - Ed25519 signing identity
//!
//! ## Encoding
//!
//! Headers are encoded as deterministic CBOR. See the [`canonical`] module.
//! The same header always produces the same bytes, and therefore the same hash.

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod header;
pub mod types;

pub use canonical::{decode_header, header_bytes, raw_header_bytes};
pub use crypto::{Keypair, PublicKey, Signature};
pub use error::{CoreError, Result};
pub use header::{ExtendedHeader, HeaderBuilder, RawHeader, HEADER_VERSION};
pub use types::HeaderHash;
