//! `tokio_util::codec` adapter for use with `FramedRead`/`FramedWrite`.

use std::collections::VecDeque;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::escape::EscapeMode;
use crate::reassembler::{ReassemblerStats, StreamReassembler};

/// XBee API frame codec for async byte streams.
///
/// Decoding runs through the same resynchronizing reassembler as the
/// blocking [`FrameReader`](crate::FrameReader): noise is skipped rather than
/// reported as a stream error.
#[derive(Debug)]
pub struct XBeeCodec {
    escape: EscapeMode,
    max_payload_size: usize,
    reassembler: StreamReassembler,
    pending: VecDeque<Frame>,
}

impl XBeeCodec {
    /// Codec with default configuration (unescaped, full length range).
    pub fn new() -> Self {
        Self::with_config(&FrameConfig::default())
    }

    /// Codec honoring the escape mode and payload cap of `config`.
    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            escape: config.escape,
            max_payload_size: config.max_payload_size,
            reassembler: StreamReassembler::with_max_payload(
                config.escape,
                config.max_payload_size,
            ),
            pending: VecDeque::new(),
        }
    }

    /// Stream counters from the decoder side.
    pub fn stats(&self) -> ReassemblerStats {
        self.reassembler.stats()
    }
}

impl Default for XBeeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for XBeeCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if self.pending.is_empty() && !src.is_empty() {
            let mut frames = Vec::new();
            self.reassembler.push_into(src, &mut frames);
            src.clear();
            self.pending.extend(frames);
        }
        Ok(self.pending.pop_front())
    }
}

impl Encoder<Frame> for XBeeCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        if item.payload.len() > self.max_payload_size {
            return Err(FrameError::UnsupportedLength {
                size: item.payload.len(),
                max: self.max_payload_size,
            });
        }
        encode_frame(&item.payload, self.escape, dst)
    }
}
