//! Length-prefixed, little-endian, versioned framing around `bincode`.
//!
//! Frame layout: 4-byte magic, 4-byte format version (both little-endian),
//! then a `u32` little-endian length prefix followed by that many bytes of
//! bincode-encoded payload. `bincode`'s own framing is not relied upon
//! directly since it isn't specified to be stable across versions.

use crate::error::{CodecError, Result};
use crate::snapshot::{DeltaSnapshot, RingSnapshot};
use serde::{de::DeserializeOwned, Serialize};

const MAGIC: u32 = 0x52_4E_47_31; // ASCII "RNG1"
const FORMAT_VERSION: u32 = 1;

fn write_frame<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let payload = bincode::serialize(value).map_err(|e| CodecError::Encode(e.to_string()))?;
    let mut out = Vec::with_capacity(4 + 4 + 4 + payload.len());
    out.extend_from_slice(&MAGIC.to_le_bytes());
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

fn read_frame<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.len() < 12 {
        return Err(CodecError::Truncated { expected: 12, found: bytes.len() });
    }
    let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    if magic != MAGIC {
        return Err(CodecError::BadMagic { expected: MAGIC, found: magic });
    }
    let format_version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    if format_version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion { found: format_version, supported: FORMAT_VERSION });
    }
    let len = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
    let body = &bytes[12..];
    if body.len() < len {
        return Err(CodecError::Truncated { expected: len, found: body.len() });
    }
    bincode::deserialize(&body[..len]).map_err(|e| CodecError::Decode(e.to_string()))
}

pub fn encode_full(snapshot: &RingSnapshot) -> Result<Vec<u8>> {
    write_frame(snapshot)
}

pub fn decode_full(bytes: &[u8]) -> Result<RingSnapshot> {
    read_frame(bytes)
}

pub fn encode_delta(delta: &DeltaSnapshot) -> Result<Vec<u8>> {
    write_frame(delta)
}

pub fn decode_delta(bytes: &[u8]) -> Result<DeltaSnapshot> {
    read_frame(bytes)
}
