//! Extended headers: the records exchanged between peers.
//!
//! An extended header is immutable once built. Its identity is the
//! [`HeaderHash`] of the signed raw header; its position in the chain is its
//! height. The exchange protocol treats everything else as opaque payload.

use crate::canonical::{decode_header, header_bytes, raw_header_bytes};
use crate::crypto::{Keypair, PublicKey, Signature};
use crate::error::Result;
use crate::types::HeaderHash;

/// The current header schema version.
pub const HEADER_VERSION: u8 = 0;

/// The signed portion of an extended header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHeader {
    /// Schema version (currently 0).
    pub version: u8,

    /// Chain discriminator.
    pub chain_id: String,

    /// Height in the chain. Heights start at 1.
    pub height: u64,

    /// Producer-claimed block time (Unix milliseconds).
    pub time: i64,

    /// Hash of the header at `height - 1` (None at height 1).
    pub last_header_hash: Option<HeaderHash>,

    /// Commitment to the block data.
    pub data_hash: [u8; 32],
}

/// A signed header plus the key that signed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedHeader {
    pub header: RawHeader,
    pub signer: PublicKey,
    /// Ed25519 signature over the canonical raw-header bytes.
    pub signature: Signature,
}

impl ExtendedHeader {
    /// The header's identity.
    pub fn hash(&self) -> HeaderHash {
        HeaderHash::digest(&raw_header_bytes(&self.header))
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn chain_id(&self) -> &str {
        &self.header.chain_id
    }

    pub fn last_header_hash(&self) -> Option<&HeaderHash> {
        self.header.last_header_hash.as_ref()
    }

    /// Deterministic binary encoding of the whole header.
    pub fn marshal(&self) -> Vec<u8> {
        header_bytes(self)
    }

    /// Decode bytes produced by [`ExtendedHeader::marshal`].
    pub fn unmarshal(bytes: &[u8]) -> Result<Self> {
        decode_header(bytes)
    }
}

/// Builder for signed extended headers.
pub struct HeaderBuilder {
    chain_id: String,
    height: u64,
    time: i64,
    last_header_hash: Option<HeaderHash>,
    data_hash: [u8; 32],
}

impl HeaderBuilder {
    pub fn new(chain_id: impl Into<String>, height: u64) -> Self {
        Self {
            chain_id: chain_id.into(),
            height,
            time: 0,
            last_header_hash: None,
            data_hash: [0u8; 32],
        }
    }

    pub fn time(mut self, time: i64) -> Self {
        self.time = time;
        self
    }

    /// Link to the parent header.
    pub fn last_header_hash(mut self, hash: HeaderHash) -> Self {
        self.last_header_hash = Some(hash);
        self
    }

    pub fn data_hash(mut self, data_hash: [u8; 32]) -> Self {
        self.data_hash = data_hash;
        self
    }

    /// Build the raw header and sign it.
    pub fn sign(self, keypair: &Keypair) -> ExtendedHeader {
        let header = RawHeader {
            version: HEADER_VERSION,
            chain_id: self.chain_id,
            height: self.height,
            time: self.time,
            last_header_hash: self.last_header_hash,
            data_hash: self.data_hash,
        };
        let signature = keypair.sign(&raw_header_bytes(&header));

        ExtendedHeader {
            header,
            signer: keypair.public_key(),
            signature,
        }
    }
}
