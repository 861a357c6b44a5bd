//! Exchange protocol message types.
//!
//! One [`ExtendedHeaderRequest`] travels per stream; the server answers with
//! one [`ExtendedHeaderResponse`] frame per header, or a single non-OK frame.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use headex_core::{CoreError, ExtendedHeader, HeaderHash, PublicKey};

use crate::error::InvalidPeerId;

/// Identity of a node on the network.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(pub [u8; 32]);

impl PeerId {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a random peer ID.
    pub fn random() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }

    /// Peer ID of a node identified by its signing key.
    pub fn from_public_key(key: &PublicKey) -> Self {
        Self(*key.as_bytes())
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for PeerId {
    type Err = InvalidPeerId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| InvalidPeerId(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| InvalidPeerId(format!("expected 32 bytes, got {}", b.len())))?;
        Ok(Self(arr))
    }
}

// Hex in human-readable formats (config files), raw bytes otherwise.
impl Serialize for PeerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for PeerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(D::Error::custom)
        } else {
            let bytes = Bytes::deserialize(deserializer)?;
            let arr: [u8; 32] = bytes[..]
                .try_into()
                .map_err(|_| D::Error::custom("peer id must be 32 bytes"))?;
            Ok(Self(arr))
        }
    }
}

/// Current protocol version, embedded in every protocol id.
pub const PROTOCOL_VERSION: &str = "v0.0.3";

/// Routes streams to the exchange handler on a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtocolId(String);

impl ProtocolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `/header-ex/<version>/<network>`.
    pub fn header_exchange(network: &str) -> Self {
        Self(format!("/header-ex/{}/{}", PROTOCOL_VERSION, network))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Protocol limits.
pub mod limits {
    /// Max headers served for one request.
    pub const MAX_HEADERS_PER_REQUEST: u64 = 512;
    /// Max size of one length-delimited frame.
    pub const MAX_FRAME_SIZE: usize = 1024 * 1024;
}

/// What a request selects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestData {
    /// A header hash. Not validated on decode: the server answers NOT_FOUND
    /// for anything that is not a known hash.
    Hash(Bytes),
    /// First height of a run. `0` means the responder's current head.
    Origin(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedHeaderRequest {
    pub data: RequestData,
    pub amount: u64,
}

impl ExtendedHeaderRequest {
    /// Ask for the responder's head.
    pub fn head() -> Self {
        Self {
            data: RequestData::Origin(0),
            amount: 1,
        }
    }

    pub fn by_hash(hash: &HeaderHash) -> Self {
        Self {
            data: RequestData::Hash(Bytes::copy_from_slice(hash.as_bytes())),
            amount: 1,
        }
    }

    /// `amount` headers starting at `origin`.
    pub fn by_height(origin: u64, amount: u64) -> Self {
        Self {
            data: RequestData::Origin(origin),
            amount,
        }
    }

    /// How many OK frames a complete answer carries.
    pub fn expected_responses(&self) -> u64 {
        match self.data {
            RequestData::Hash(_) => 1,
            RequestData::Origin(_) => self.amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    Ok,
    NotFound,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedHeaderResponse {
    pub status: StatusCode,
    /// Marshaled header. Empty unless `status` is `Ok`.
    pub body: Bytes,
}

impl ExtendedHeaderResponse {
    pub fn ok(header: &ExtendedHeader) -> Self {
        Self {
            status: StatusCode::Ok,
            body: Bytes::from(header.marshal()),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NotFound,
            body: Bytes::new(),
        }
    }

    pub fn invalid() -> Self {
        Self {
            status: StatusCode::Invalid,
            body: Bytes::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::Ok
    }

    /// Decode the carried header.
    pub fn header(&self) -> Result<ExtendedHeader, CoreError> {
        ExtendedHeader::unmarshal(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use headex_testkit::TestSuite;
    use proptest::prelude::*;

    #[test]
    fn test_protocol_id_embeds_network() {
        let id = ProtocolId::header_exchange("private");
        assert_eq!(id.as_str(), "/header-ex/v0.0.3/private");
        assert_ne!(id, ProtocolId::header_exchange("mainnet"));
    }

    #[test]
    fn test_custom_protocol_id() {
        let id = ProtocolId::new("/custom/1");
        assert_eq!(id.to_string(), "/custom/1");
    }

    #[test]
    fn test_peer_id_from_public_key() {
        let suite = TestSuite::new();
        let peer = PeerId::from_public_key(&suite.signer());
        assert_eq!(peer.as_bytes(), suite.signer().as_bytes());
    }

    #[test]
    fn test_peer_id_hex() {
        let peer = PeerId::from_bytes([0xab; 32]);
        let parsed: PeerId = peer.to_string().parse().unwrap();
        assert_eq!(parsed, peer);

        assert!("abcd".parse::<PeerId>().is_err());
        assert!("not hex".parse::<PeerId>().is_err());
    }

    #[test]
    fn test_peer_id_json_is_hex_string() {
        let peer = PeerId::from_bytes([0x01; 32]);
        let json = serde_json::to_string(&peer).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));
        assert_eq!(serde_json::from_str::<PeerId>(&json).unwrap(), peer);
    }

    #[test]
    fn test_peer_id_cbor_roundtrip() {
        let peer = PeerId::random();
        let bytes = codec::encode(&peer).unwrap();
        assert_eq!(codec::decode::<PeerId>(&bytes).unwrap(), peer);
    }

    #[test]
    fn test_non_ok_responses_have_empty_body() {
        assert!(ExtendedHeaderResponse::not_found().body.is_empty());
        assert!(ExtendedHeaderResponse::invalid().body.is_empty());
        assert!(!ExtendedHeaderResponse::invalid().is_ok());
    }

    #[test]
    fn test_ok_response_carries_header() {
        let header = TestSuite::new().next_header();
        let response = ExtendedHeaderResponse::ok(&header);
        assert!(response.is_ok());
        assert_eq!(response.header().unwrap(), header);
    }

    #[test]
    fn test_expected_responses() {
        let hash = HeaderHash::from_bytes([1; 32]);
        assert_eq!(ExtendedHeaderRequest::by_hash(&hash).expected_responses(), 1);
        assert_eq!(ExtendedHeaderRequest::head().expected_responses(), 1);
        assert_eq!(ExtendedHeaderRequest::by_height(3, 7).expected_responses(), 7);
    }

    fn request_data() -> impl Strategy<Value = RequestData> {
        prop_oneof![
            prop::collection::vec(any::<u8>(), 0..64).prop_map(|b| RequestData::Hash(b.into())),
            any::<u64>().prop_map(RequestData::Origin),
        ]
    }

    proptest! {
        #[test]
        fn ok_response_preserves_header(header in headex_testkit::generators::header()) {
            let bytes = codec::encode(&ExtendedHeaderResponse::ok(&header)).unwrap();
            let response: ExtendedHeaderResponse = codec::decode(&bytes).unwrap();
            prop_assert_eq!(response.header().unwrap(), header);
        }

        #[test]
        fn request_survives_wire(data in request_data(), amount in any::<u64>()) {
            let request = ExtendedHeaderRequest { data, amount };
            let bytes = codec::encode(&request).unwrap();
            prop_assert_eq!(codec::decode::<ExtendedHeaderRequest>(&bytes).unwrap(), request);
        }

        #[test]
        fn response_survives_wire(
            status in prop_oneof![Just(StatusCode::Ok), Just(StatusCode::NotFound), Just(StatusCode::Invalid)],
            body in prop::collection::vec(any::<u8>(), 0..256),
        ) {
            let response = ExtendedHeaderResponse { status, body: body.into() };
            let bytes = codec::encode(&response).unwrap();
            prop_assert_eq!(codec::decode::<ExtendedHeaderResponse>(&bytes).unwrap(), response);
        }
    }
}
