//! Canonical CBOR encoding for extended headers.
//!
//! Headers are encoded as a single CBOR map with small integer keys, written
//! in ascending key order with shortest-form integers and definite lengths
//! (RFC 8949 core deterministic encoding). The hash of a header is computed
//! over the encoding of its raw (signed) fields only; the wire encoding
//! appends the signer and the signature under the next two keys.
//!
//! Decoding goes through `ciborium` and then re-encodes the result: input that
//! is valid CBOR but not in canonical form is rejected.

use ciborium::value::Value;

use crate::crypto::{PublicKey, Signature};
use crate::error::{CoreError, Result};
use crate::header::{ExtendedHeader, RawHeader, HEADER_VERSION};
use crate::types::HeaderHash;

/// Map keys. Values 0-23 encode as a single byte.
mod keys {
    pub const VERSION: u64 = 0;
    pub const CHAIN_ID: u64 = 1;
    pub const HEIGHT: u64 = 2;
    pub const TIME: u64 = 3;
    pub const LAST_HEADER_HASH: u64 = 4;
    pub const DATA_HASH: u64 = 5;
    pub const SIGNER: u64 = 6;
    pub const SIGNATURE: u64 = 7;
}

const RAW_FIELDS: u64 = 6;
const ALL_FIELDS: u64 = 8;

mod major {
    pub const UNSIGNED: u8 = 0;
    pub const NEGATIVE: u8 = 1;
    pub const BYTES: u8 = 2;
    pub const TEXT: u8 = 3;
    pub const MAP: u8 = 5;
}

const NULL: u8 = 0xf6;

/// Canonical bytes of the signed portion. This is what gets hashed and signed.
pub fn raw_header_bytes(header: &RawHeader) -> Vec<u8> {
    let mut buf = Vec::with_capacity(96 + header.chain_id.len());
    write_head(&mut buf, major::MAP, RAW_FIELDS);
    write_raw_fields(&mut buf, header);
    buf
}

/// Canonical bytes of a full extended header (the wire body).
pub fn header_bytes(header: &ExtendedHeader) -> Vec<u8> {
    let mut buf = Vec::with_capacity(200 + header.header.chain_id.len());
    write_head(&mut buf, major::MAP, ALL_FIELDS);
    write_raw_fields(&mut buf, &header.header);
    write_head(&mut buf, major::UNSIGNED, keys::SIGNER);
    write_bytes(&mut buf, header.signer.as_bytes());
    write_head(&mut buf, major::UNSIGNED, keys::SIGNATURE);
    write_bytes(&mut buf, header.signature.as_bytes());
    buf
}

fn write_raw_fields(buf: &mut Vec<u8>, header: &RawHeader) {
    write_head(buf, major::UNSIGNED, keys::VERSION);
    write_head(buf, major::UNSIGNED, header.version.into());

    write_head(buf, major::UNSIGNED, keys::CHAIN_ID);
    write_head(buf, major::TEXT, header.chain_id.len() as u64);
    buf.extend_from_slice(header.chain_id.as_bytes());

    write_head(buf, major::UNSIGNED, keys::HEIGHT);
    write_head(buf, major::UNSIGNED, header.height);

    write_head(buf, major::UNSIGNED, keys::TIME);
    write_int(buf, header.time);

    write_head(buf, major::UNSIGNED, keys::LAST_HEADER_HASH);
    match &header.last_header_hash {
        Some(hash) => write_bytes(buf, hash.as_bytes()),
        None => buf.push(NULL),
    }

    write_head(buf, major::UNSIGNED, keys::DATA_HASH);
    write_bytes(buf, &header.data_hash);
}

/// Write a major type with its argument in the shortest form.
fn write_head(buf: &mut Vec<u8>, major: u8, arg: u64) {
    let mt = major << 5;
    match arg {
        0..=23 => buf.push(mt | arg as u8),
        24..=0xff => buf.extend_from_slice(&[mt | 24, arg as u8]),
        0x100..=0xffff => {
            buf.push(mt | 25);
            buf.extend_from_slice(&(arg as u16).to_be_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(mt | 26);
            buf.extend_from_slice(&(arg as u32).to_be_bytes());
        }
        _ => {
            buf.push(mt | 27);
            buf.extend_from_slice(&arg.to_be_bytes());
        }
    }
}

fn write_int(buf: &mut Vec<u8>, n: i64) {
    if n >= 0 {
        write_head(buf, major::UNSIGNED, n as u64);
    } else {
        // CBOR stores -1 - n, which is the bitwise complement.
        write_head(buf, major::NEGATIVE, !n as u64);
    }
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_head(buf, major::BYTES, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Decode a full extended header from its canonical bytes.
pub fn decode_header(bytes: &[u8]) -> Result<ExtendedHeader> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;

    let entries = match value {
        Value::Map(entries) => entries,
        _ => return Err(CoreError::MalformedHeader("expected map".into())),
    };
    let field = |key: u64| {
        entries
            .iter()
            .find(|(k, _)| k.as_integer().map(i128::from) == Some(key as i128))
            .map(|(_, v)| v)
    };

    let version = u8::try_from(uint(field(keys::VERSION), "version")?)
        .map_err(|_| CoreError::MalformedHeader("version out of range".into()))?;
    if version != HEADER_VERSION {
        return Err(CoreError::UnsupportedVersion(version));
    }

    let chain_id = match field(keys::CHAIN_ID) {
        Some(Value::Text(s)) => s.clone(),
        _ => return Err(CoreError::MalformedHeader("invalid chain_id".into())),
    };

    let time = match field(keys::TIME).and_then(Value::as_integer) {
        Some(i) => i64::try_from(i128::from(i))
            .map_err(|_| CoreError::MalformedHeader("time out of range".into()))?,
        None => return Err(CoreError::MalformedHeader("missing time".into())),
    };

    let last_header_hash = match field(keys::LAST_HEADER_HASH) {
        Some(Value::Null) => None,
        other => Some(HeaderHash(bytes32(other, "last_header_hash")?)),
    };

    let signature = match field(keys::SIGNATURE) {
        Some(Value::Bytes(b)) => Signature::try_from(b.as_slice())?,
        _ => return Err(CoreError::MalformedHeader("invalid signature".into())),
    };

    let decoded = ExtendedHeader {
        header: RawHeader {
            version,
            chain_id,
            height: uint(field(keys::HEIGHT), "height")?,
            time,
            last_header_hash,
            data_hash: bytes32(field(keys::DATA_HASH), "data_hash")?,
        },
        signer: PublicKey(bytes32(field(keys::SIGNER), "signer")?),
        signature,
    };

    if header_bytes(&decoded) != bytes {
        return Err(CoreError::NonCanonical);
    }
    Ok(decoded)
}

fn uint(value: Option<&Value>, name: &str) -> Result<u64> {
    value
        .and_then(Value::as_integer)
        .and_then(|i| u64::try_from(i128::from(i)).ok())
        .ok_or_else(|| CoreError::MalformedHeader(format!("invalid {}", name)))
}

fn bytes32(value: Option<&Value>, name: &str) -> Result<[u8; 32]> {
    value
        .and_then(Value::as_bytes)
        .and_then(|b| <[u8; 32]>::try_from(b.as_slice()).ok())
        .ok_or_else(|| CoreError::MalformedHeader(format!("invalid {}", name)))
}
