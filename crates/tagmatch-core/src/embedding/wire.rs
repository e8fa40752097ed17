//! Length-prefixed multipart framing for the embedding session protocol.
//!
//! Each message on the two uni-directional streams is a frame: a `u32`
//! little-endian part count followed by, per part, a `u32` LE byte
//! length and the raw bytes. Numeric ids and counts travel as decimal
//! ASCII parts, headers as JSON, vector data as raw little-endian
//! float32 buffers.
//!
//! The inbound path reuses one [`FrameBuf`] per stream: every read
//! clears and refills the same backing buffer, so peak inbound
//! allocation stays bounded by the largest single frame regardless of
//! how many responses a session carries. The outbound path likewise
//! serializes into one scratch buffer cleared per send.

use crate::config::MAX_FRAME_PARTS;
use crate::error::ProtocolError;
use serde::Deserialize;
use std::io::{Read, Write};
use std::ops::Range;

/// Serializes `parts` into `scratch` and writes the frame in one call.
///
/// `scratch` is cleared first and reused across sends.
pub fn write_frame(
    stream: &mut impl Write,
    scratch: &mut Vec<u8>,
    parts: &[&[u8]],
) -> Result<(), ProtocolError> {
    scratch.clear();
    scratch.extend_from_slice(&(parts.len() as u32).to_le_bytes());
    for part in parts {
        scratch.extend_from_slice(&(part.len() as u32).to_le_bytes());
        scratch.extend_from_slice(part);
    }
    stream.write_all(scratch)?;
    stream.flush()?;
    Ok(())
}

/// Reusable inbound frame buffer.
///
/// Not thread-safe; each stream's reader owns exactly one.
pub struct FrameBuf {
    buf: Vec<u8>,
    parts: Vec<Range<usize>>,
    max_part_bytes: usize,
}

impl FrameBuf {
    /// Creates a buffer that rejects parts larger than `max_part_bytes`.
    pub fn new(max_part_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            parts: Vec::new(),
            max_part_bytes,
        }
    }

    /// Reads one complete frame, replacing the previous contents.
    pub fn read_from(&mut self, stream: &mut impl Read) -> Result<(), ProtocolError> {
        self.buf.clear();
        self.parts.clear();

        let count = read_u32(stream)? as usize;
        if count == 0 || count > MAX_FRAME_PARTS {
            return Err(ProtocolError::MalformedFrame(format!(
                "frame part count {count} outside 1..={MAX_FRAME_PARTS}"
            )));
        }
        for _ in 0..count {
            let len = read_u32(stream)? as usize;
            if len > self.max_part_bytes {
                return Err(ProtocolError::OversizedPart {
                    got: len,
                    limit: self.max_part_bytes,
                });
            }
            let start = self.buf.len();
            self.buf.resize(start + len, 0);
            stream.read_exact(&mut self.buf[start..start + len])?;
            self.parts.push(start..start + len);
        }
        Ok(())
    }

    /// Number of parts in the current frame.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Raw bytes of part `i`.
    pub fn part(&self, i: usize) -> &[u8] {
        &self.buf[self.parts[i].clone()]
    }
}

fn read_u32(stream: &mut impl Read) -> Result<u32, ProtocolError> {
    let mut bytes = [0u8; 4];
    stream.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

/// Parses a decimal ASCII part into a `u64`.
pub fn parse_decimal(part: &[u8]) -> Result<u64, ProtocolError> {
    let text = std::str::from_utf8(part)
        .map_err(|_| ProtocolError::MalformedFrame("non-UTF8 numeric part".into()))?;
    text.parse()
        .map_err(|_| ProtocolError::MalformedFrame(format!("'{text}' is not a decimal count")))
}

/// Server configuration blob returned by the handshake.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Fixed response sequence length, or `None` when the server sizes
    /// responses to the longest sentence in each batch.
    pub max_seq_len: Option<usize>,
    /// Pooling strategy; must be `"NONE"` for per-token vectors.
    pub pooling: String,
    /// Embedding vector dimension.
    pub dim: usize,
}

impl ServerConfig {
    /// Parses the handshake JSON and rejects pooled servers.
    pub fn parse(blob: &[u8]) -> Result<Self, ProtocolError> {
        let config: ServerConfig = serde_json::from_slice(blob)
            .map_err(|e| ProtocolError::BadConfig(e.to_string()))?;
        if config.pooling != "NONE" {
            return Err(ProtocolError::PooledServer(config.pooling));
        }
        Ok(config)
    }
}

/// JSON header preceding each raw response buffer.
#[derive(Debug, Deserialize)]
pub struct ResponseHeader {
    /// Element type of the raw buffer; only `float32` is accepted.
    pub dtype: String,
    /// Token strings as the server saw them, for diagnostics.
    #[serde(default)]
    pub tokens: Vec<Vec<String>>,
    /// `[batch_size, seq_len, dim]`.
    pub shape: [usize; 3],
}
