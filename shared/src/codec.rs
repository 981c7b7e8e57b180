//! Payload encoding shared by both sides of the wire.
//!
//! Every blob payload is `compress(encode(value))`: JSON through
//! `serde_json`, then zlib at best compression.

use std::io::{Read, Write};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

pub type CodecResult<T> = Result<T, CodecError>;

pub fn encode<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn compress(bytes: &[u8]) -> CodecResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

pub fn decompress(bytes: &[u8]) -> CodecResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Serializes then compresses. Use this for every outgoing object.
pub fn archive<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    compress(&encode(value)?)
}

/// Decompresses then deserializes. Use this for every incoming object.
pub fn unarchive<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    decode(&decompress(bytes)?)
}
