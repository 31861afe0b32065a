// rust/worker-core/src/codec.rs

//! Self-describing frame for model updates exchanged with the master.
//!
//! ```text
//! +----------------------+
//! | Header length (u32)  |  <- little endian
//! +----------------------+
//! | Header (bincode)     |  <- FrameHeader
//! +----------------------+
//! | Payload (bincode)    |  <- the update value
//! +----------------------+
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use crate::error::{Result, WorkerError};

/// Header preceding every encoded update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    /// Magic bytes identifying an update frame ("IRUP")
    pub magic: [u8; 4],
    /// Format version number
    pub version: u32,
    /// Size of the payload in bytes
    pub payload_len: u64,
    /// XXHash64 checksum of the payload
    pub checksum: u64,
}

impl FrameHeader {
    pub const MAGIC: [u8; 4] = *b"IRUP";

    pub const VERSION: u32 = 1;

    pub fn new(payload: &[u8]) -> Self {
        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
            payload_len: payload.len() as u64,
            checksum: checksum(payload),
        }
    }

    pub fn validate_magic(&self) -> bool {
        self.magic == Self::MAGIC
    }

    pub fn validate_version(&self) -> bool {
        self.version == Self::VERSION
    }
}

fn checksum(data: &[u8]) -> u64 {
    use std::hash::Hasher;
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish()
}

/// Encode `value` as a checksummed frame.
pub fn encode_frame<T: Serialize>(value: &T) -> Result<Bytes> {
    let payload = bincode::serialize(value)
        .map_err(|e| WorkerError::serialization(format!("failed to encode payload: {e}")))?;
    let header = FrameHeader::new(&payload);
    let header_bytes = bincode::serialize(&header)
        .map_err(|e| WorkerError::serialization(format!("failed to encode header: {e}")))?;
    let header_len = u32::try_from(header_bytes.len())
        .map_err(|_| WorkerError::serialization("frame header too large"))?;

    let mut frame = BytesMut::with_capacity(4 + header_bytes.len() + payload.len());
    frame.put_u32_le(header_len);
    frame.put_slice(&header_bytes);
    frame.put_slice(&payload);
    Ok(frame.freeze())
}

/// Decode a frame produced by [`encode_frame`], verifying its integrity.
pub fn decode_frame<T: DeserializeOwned>(frame: &[u8]) -> Result<T> {
    if frame.len() < 4 {
        return Err(WorkerError::serialization(format!(
            "frame too short: {} bytes",
            frame.len()
        )));
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&frame[..4]);
    let header_len = u32::from_le_bytes(len_bytes) as usize;

    let body = &frame[4..];
    if body.len() < header_len {
        return Err(WorkerError::serialization(format!(
            "truncated frame header: expected {} bytes, got {}",
            header_len,
            body.len()
        )));
    }

    let header: FrameHeader = bincode::deserialize(&body[..header_len])
        .map_err(|e| WorkerError::serialization(format!("failed to decode header: {e}")))?;

    if !header.validate_magic() {
        return Err(WorkerError::serialization(format!(
            "invalid frame magic: {:?}",
            header.magic
        )));
    }
    if !header.validate_version() {
        return Err(WorkerError::serialization(format!(
            "unsupported frame version: {}",
            header.version
        )));
    }

    let payload = &body[header_len..];
    if payload.len() as u64 != header.payload_len {
        return Err(WorkerError::serialization(format!(
            "payload length mismatch: expected {}, got {}",
            header.payload_len,
            payload.len()
        )));
    }

    let computed = checksum(payload);
    if computed != header.checksum {
        return Err(WorkerError::serialization(format!(
            "checksum mismatch: expected {}, got {}",
            header.checksum, computed
        )));
    }

    bincode::deserialize(payload)
        .map_err(|e| WorkerError::serialization(format!("failed to decode payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Weights {
        iteration: u32,
        values: Vec<f64>,
    }

    fn sample() -> Weights {
        Weights {
            iteration: 7,
            values: vec![0.5, -1.25, 3.0],
        }
    }

    #[test]
    fn test_round_trip() {
        let frame = encode_frame(&sample()).unwrap();
        let decoded: Weights = decode_frame(&frame).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn test_header_layout() {
        let frame = encode_frame(&sample()).unwrap();
        let header_len = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        let header: FrameHeader = bincode::deserialize(&frame[4..4 + header_len]).unwrap();

        assert_eq!(header.magic, FrameHeader::MAGIC);
        assert_eq!(header.version, FrameHeader::VERSION);
        assert_eq!(header.payload_len as usize, frame.len() - 4 - header_len);
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut frame = encode_frame(&sample()).unwrap().to_vec();
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;

        let err = decode_frame::<Weights>(&frame).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_invalid_magic() {
        let payload = bincode::serialize(&sample()).unwrap();
        let mut header = FrameHeader::new(&payload);
        header.magic = *b"XXXX";
        let header_bytes = bincode::serialize(&header).unwrap();

        let mut frame = (header_bytes.len() as u32).to_le_bytes().to_vec();
        frame.extend_from_slice(&header_bytes);
        frame.extend_from_slice(&payload);

        let err = decode_frame::<Weights>(&frame).unwrap_err();
        assert!(err.to_string().contains("invalid frame magic"));
    }

    #[test]
    fn test_unsupported_version() {
        let payload = bincode::serialize(&sample()).unwrap();
        let mut header = FrameHeader::new(&payload);
        header.version = 999;
        let header_bytes = bincode::serialize(&header).unwrap();

        let mut frame = (header_bytes.len() as u32).to_le_bytes().to_vec();
        frame.extend_from_slice(&header_bytes);
        frame.extend_from_slice(&payload);

        let err = decode_frame::<Weights>(&frame).unwrap_err();
        assert!(err.to_string().contains("unsupported frame version"));
    }

    #[test]
    fn test_truncated_frames() {
        assert!(decode_frame::<Weights>(&[]).is_err());
        assert!(decode_frame::<Weights>(&[1, 2]).is_err());

        let frame = encode_frame(&sample()).unwrap();
        let err = decode_frame::<Weights>(&frame[..frame.len() - 3]).unwrap_err();
        assert!(err.to_string().contains("payload length mismatch"));

        let err = decode_frame::<Weights>(&frame[..8]).unwrap_err();
        assert!(err.to_string().contains("truncated frame header"));
    }
}
