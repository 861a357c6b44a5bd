//! Test fixtures and helpers.

use headex_core::{ExtendedHeader, HeaderBuilder, Keypair, PublicKey};
use headex_store::MemoryStore;

/// Chain id used when none is given.
pub const DEFAULT_CHAIN_ID: &str = "private";

/// Block time of the header at height 1 (Unix ms).
const GENESIS_TIME: i64 = 1_700_000_000_000;

/// Spacing between consecutive headers (ms).
const BLOCK_INTERVAL: i64 = 1_000;

/// Produces a linked chain of signed headers starting at height 1.
///
/// Deterministic: two suites with the same seed and chain id produce
/// identical headers.
pub struct TestSuite {
    keypair: Keypair,
    chain_id: String,
    head: Option<ExtendedHeader>,
}

impl TestSuite {
    pub fn new() -> Self {
        Self::with_seed([0x5e; 32], DEFAULT_CHAIN_ID)
    }

    /// A suite for a different chain. Its headers collide in height, but not
    /// in hash, with those of [`TestSuite::new`].
    pub fn new_with_chain(chain_id: impl Into<String>) -> Self {
        Self::with_seed([0x5e; 32], chain_id)
    }

    /// A suite signing with a fresh random key.
    pub fn with_random_key() -> Self {
        Self::with_seed(rand::random(), DEFAULT_CHAIN_ID)
    }

    pub fn with_seed(seed: [u8; 32], chain_id: impl Into<String>) -> Self {
        Self {
            keypair: Keypair::from_seed(&seed),
            chain_id: chain_id.into(),
            head: None,
        }
    }

    pub fn signer(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// The last header produced, if any.
    pub fn head(&self) -> Option<&ExtendedHeader> {
        self.head.as_ref()
    }

    /// Produce the next header, linked to the previous one.
    pub fn next_header(&mut self) -> ExtendedHeader {
        let height = self.head.as_ref().map_or(1, |h| h.height() + 1);
        let mut data_hash = [0u8; 32];
        data_hash[..8].copy_from_slice(&height.to_be_bytes());

        let mut builder = HeaderBuilder::new(self.chain_id.clone(), height)
            .time(GENESIS_TIME + BLOCK_INTERVAL * (height as i64 - 1))
            .data_hash(data_hash);
        if let Some(parent) = &self.head {
            builder = builder.last_header_hash(parent.hash());
        }

        let header = builder.sign(&self.keypair);
        self.head = Some(header.clone());
        header
    }

    /// Produce the next `count` headers.
    pub fn generate(&mut self, count: usize) -> Vec<ExtendedHeader> {
        (0..count).map(|_| self.next_header()).collect()
    }
}

impl Default for TestSuite {
    fn default() -> Self {
        Self::new()
    }
}

/// A memory store holding headers `1..=count` of the default suite.
pub fn create_store(count: usize) -> MemoryStore {
    MemoryStore::with_headers(TestSuite::new().generate(count))
        .expect("freshly generated chain has no conflicts")
}
