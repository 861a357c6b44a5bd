//! Strong type definitions for headex.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// A 32-byte header hash: Blake3 over the canonical raw-header bytes.
///
/// This is the identity of a header for lookups. Two headers with the same
/// signed content have the same hash.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HeaderHash(pub [u8; 32]);

impl HeaderHash {
    /// Hash arbitrary bytes.
    pub fn digest(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::DecodingError(e.to_string()))?;
        Self::try_from(bytes.as_slice())
    }
}

impl fmt::Debug for HeaderHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeaderHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for HeaderHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for HeaderHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for HeaderHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for HeaderHash {
    type Error = CoreError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice
            .try_into()
            .map_err(|_| CoreError::InvalidHashLength(slice.len()))?;
        Ok(Self(arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_hex_roundtrip() {
        let hash = HeaderHash::from_bytes([0x42; 32]);
        let recovered = HeaderHash::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, recovered);
    }

    #[test]
    fn test_hash_rejects_wrong_length() {
        let err = HeaderHash::try_from(&b"dummy_hash"[..]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidHashLength(10)));
    }

    #[test]
    fn test_hash_debug_is_truncated() {
        let hash = HeaderHash::from_bytes([0xcd; 32]);
        assert_eq!(format!("{:?}", hash), "HeaderHash(cdcdcdcdcdcdcdcd)");
        assert_eq!(format!("{}", hash).len(), 64);
    }

    #[test]
    fn test_hash_serde_json() {
        let hash = HeaderHash::digest(b"genesis");
        let json = serde_json::to_string(&hash).unwrap();
        let back: HeaderHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn test_digest_is_deterministic() {
        assert_eq!(HeaderHash::digest(b"abc"), HeaderHash::digest(b"abc"));
        assert_ne!(HeaderHash::digest(b"abc"), HeaderHash::digest(b"abd"));
    }
}
