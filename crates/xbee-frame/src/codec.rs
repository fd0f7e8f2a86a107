use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::checksum;
use crate::error::{FrameError, Result};
use crate::escape::{self, EscapeMode};

/// Frame start delimiter.
pub const START_DELIMITER: u8 = escape::START;

/// Frame header: start delimiter (1) + length (2) = 3 bytes.
pub const HEADER_SIZE: usize = 3;

/// Header plus trailing checksum byte.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + 1;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// An API frame with framing stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame payload. The first byte is the API type tag.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The API type tag, or `None` for an empty payload.
    pub fn api_id(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// The checksum this frame carries on the wire.
    pub fn checksum(&self) -> u8 {
        checksum::compute(&self.payload)
    }

    /// The total unescaped wire size of this frame.
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬────────────┬──────────────────┬──────────┐
/// │ Start    │ Length     │ Payload          │ Checksum │
/// │ 0x7E     │ (2B BE)    │ (Length bytes)   │ (1B)     │
/// └──────────┴────────────┴──────────────────┴──────────┘
/// ```
///
/// In escaped mode everything after the start delimiter is stuffed.
pub fn encode_frame(payload: &[u8], escape: EscapeMode, dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::UnsupportedLength {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }

    let len = (payload.len() as u16).to_be_bytes();
    let sum = checksum::compute(payload);

    dst.reserve(FRAME_OVERHEAD + payload.len());
    dst.put_u8(START_DELIMITER);
    match escape {
        EscapeMode::Unescaped => {
            dst.put_slice(&len);
            dst.put_slice(payload);
            dst.put_u8(sum);
        }
        EscapeMode::Escaped => {
            escape::stuff(&len, dst);
            escape::stuff(payload, dst);
            escape::stuff(&[sum], dst);
        }
    }
    Ok(())
}

/// Encode an unescaped frame into a fresh buffer.
pub fn encode(payload: &[u8]) -> Result<Vec<u8>> {
    let mut dst = BytesMut::with_capacity(FRAME_OVERHEAD + payload.len());
    encode_frame(payload, EscapeMode::Unescaped, &mut dst)?;
    Ok(dst.to_vec())
}

/// Outcome of inspecting an unescaped buffer that begins at a start delimiter.
#[derive(Debug)]
pub enum FrameExtraction {
    /// More bytes are needed before a verdict is possible.
    Incomplete,
    /// A checksummed frame occupies the first `consumed` bytes.
    Complete { frame: Frame, consumed: usize },
    /// The candidate frame can never become valid; the caller must resynchronize.
    Invalid(FrameError),
}

/// Inspect `buf` for one complete frame without consuming it.
///
/// A checksum failure on a fully buffered frame is a final verdict on that
/// candidate, never a request for more data.
pub fn try_extract(buf: &[u8], max_payload: usize) -> FrameExtraction {
    let Some(&first) = buf.first() else {
        return FrameExtraction::Incomplete;
    };
    if first != START_DELIMITER {
        return FrameExtraction::Invalid(FrameError::InvalidStartDelimiter(first));
    }
    if buf.len() < HEADER_SIZE {
        return FrameExtraction::Incomplete;
    }

    let payload_len = u16::from_be_bytes([buf[1], buf[2]]) as usize;
    if payload_len > max_payload {
        return FrameExtraction::Invalid(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = FRAME_OVERHEAD + payload_len;
    if buf.len() < total {
        return FrameExtraction::Incomplete;
    }

    let payload = &buf[HEADER_SIZE..HEADER_SIZE + payload_len];
    let claimed = buf[total - 1];
    if !checksum::verify(payload, claimed) {
        return FrameExtraction::Invalid(FrameError::ChecksumMismatch {
            expected: checksum::compute(payload),
            actual: claimed,
        });
    }

    FrameExtraction::Complete {
        frame: Frame::new(Bytes::copy_from_slice(payload)),
        consumed: total,
    }
}

/// Decode one unescaped frame from the front of a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. On error the buffer
/// is left untouched; streams with noise should go through
/// [`StreamReassembler`](crate::StreamReassembler) instead.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    match try_extract(src, max_payload) {
        FrameExtraction::Incomplete => Ok(None),
        FrameExtraction::Complete { frame, consumed } => {
            src.advance(consumed);
            Ok(Some(frame))
        }
        FrameExtraction::Invalid(err) => Err(err),
    }
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Whether reserved bytes are stuffed on this link.
    pub escape: EscapeMode,
    /// Maximum payload size in bytes. Default: 65535 (the length field limit).
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            escape: EscapeMode::Unescaped,
            max_payload_size: MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
