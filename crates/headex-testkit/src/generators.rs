//! Proptest generators for property-based testing.

use proptest::prelude::*;

use headex_core::{ExtendedHeader, HeaderBuilder, HeaderHash, Keypair};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random HeaderHash.
pub fn header_hash() -> impl Strategy<Value = HeaderHash> {
    any::<[u8; 32]>().prop_map(HeaderHash::from_bytes)
}

/// Generate a valid height (1-indexed).
pub fn height() -> impl Strategy<Value = u64> {
    1u64..=u64::MAX
}

/// Generate a chain id.
pub fn chain_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}".prop_map(String::from)
}

/// Parameters for generating a header.
#[derive(Debug, Clone)]
pub struct HeaderParams {
    pub keypair: Keypair,
    pub chain_id: String,
    pub height: u64,
    pub time: i64,
    pub last_header_hash: Option<HeaderHash>,
    pub data_hash: [u8; 32],
}

impl Arbitrary for HeaderParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            keypair(),
            chain_id(),
            height(),
            any::<i64>(),
            proptest::option::of(header_hash()),
            any::<[u8; 32]>(),
        )
            .prop_map(
                |(keypair, chain_id, height, time, last_header_hash, data_hash)| HeaderParams {
                    keypair,
                    chain_id,
                    height,
                    time,
                    last_header_hash,
                    data_hash,
                },
            )
            .boxed()
    }
}

/// Build and sign a header from params.
pub fn header_from_params(params: &HeaderParams) -> ExtendedHeader {
    let mut builder = HeaderBuilder::new(params.chain_id.clone(), params.height)
        .time(params.time)
        .data_hash(params.data_hash);
    if let Some(parent) = params.last_header_hash {
        builder = builder.last_header_hash(parent);
    }
    builder.sign(&params.keypair)
}

/// Generate a signed header.
pub fn header() -> impl Strategy<Value = ExtendedHeader> {
    any::<HeaderParams>().prop_map(|p| header_from_params(&p))
}

/// Heights reported by a set of peers for their head: `1..=max_height`,
/// with repeats, at least one report.
pub fn head_reports(max_height: u64, max_peers: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(1..=max_height, 1..=max_peers)
}
