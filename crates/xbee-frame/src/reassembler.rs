//! Incremental frame reassembly over an unbounded byte stream.
//!
//! State machine:
//! - `Seeking`: scanning for a start delimiter, everything else is discarded
//! - `Accumulating`: buffering unescaped bytes from a start delimiter until
//!   [`try_extract`] reaches a verdict
//!
//! A candidate frame that can never become valid (checksum failure, absurd
//! length) is dropped and parsing re-anchors on the next start delimiter
//! already buffered, or falls back to `Seeking`. Every resynchronization
//! step discards at least one byte, so recovery is bounded by buffer size.
//!
//! An incomplete candidate is never cut short: without escaping, a `0x7E`
//! inside a payload is ordinary data. A stray delimiter whose length
//! swallows the real frame behind it is only given up once its checksum
//! fails, at which point the rescan finds the real frame still buffered.

use bytes::{Buf, BufMut, BytesMut};
use tracing::{debug, trace};

use crate::codec::{try_extract, Frame, FrameExtraction, MAX_PAYLOAD, START_DELIMITER};
use crate::error::FrameError;
use crate::escape::{EscapeMode, ESCAPE, ESCAPE_XOR, XOFF, XON};

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Counters describing what the reassembler has seen on the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblerStats {
    /// Frames delivered.
    pub frames: u64,
    /// Fully buffered candidates rejected for a bad checksum.
    pub checksum_failures: u64,
    /// Candidates rejected for a length above the configured maximum.
    pub invalid_lengths: u64,
    /// Partial frames abandoned because a new start delimiter arrived, or
    /// resynchronizations that found no further start delimiter.
    pub desyncs: u64,
    /// Bytes thrown away outside of delivered frames.
    pub discarded_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Seeking,
    Accumulating,
}

/// Rebuilds frames from bytes delivered one at a time or in chunks.
#[derive(Debug)]
pub struct StreamReassembler {
    escape: EscapeMode,
    max_payload: usize,
    state: State,
    /// Unescaped bytes of the current candidate, starting at its delimiter.
    buf: BytesMut,
    /// The previous raw byte was an escape marker.
    escape_next: bool,
    /// Bytes skipped while seeking since the last reported skip.
    skipped: usize,
    stats: ReassemblerStats,
}

impl StreamReassembler {
    /// Create a reassembler accepting any length the wire format allows.
    pub fn new(escape: EscapeMode) -> Self {
        Self::with_max_payload(escape, MAX_PAYLOAD)
    }

    /// Create a reassembler that rejects length fields above `max_payload`.
    pub fn with_max_payload(escape: EscapeMode, max_payload: usize) -> Self {
        Self {
            escape,
            max_payload: max_payload.min(MAX_PAYLOAD),
            state: State::Seeking,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            escape_next: false,
            skipped: 0,
            stats: ReassemblerStats::default(),
        }
    }

    /// Feed raw link bytes and return every frame they complete, in arrival order.
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        self.push_into(data, &mut frames);
        frames
    }

    /// Like [`push`](Self::push), appending completed frames to `out`.
    pub fn push_into(&mut self, data: &[u8], out: &mut Vec<Frame>) {
        for &byte in data {
            self.feed(byte, out);
        }
    }

    /// Drop any partial frame and return to seeking.
    pub fn reset(&mut self) {
        self.discard_buffer();
        self.escape_next = false;
        self.skipped = 0;
    }

    /// True when no partial frame is buffered.
    pub fn is_idle(&self) -> bool {
        self.state == State::Seeking
    }

    /// Number of unescaped bytes held for the current candidate frame.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Escape mode this reassembler decodes.
    pub fn escape_mode(&self) -> EscapeMode {
        self.escape
    }

    /// Stream counters so far.
    pub fn stats(&self) -> ReassemblerStats {
        self.stats
    }

    fn feed(&mut self, byte: u8, out: &mut Vec<Frame>) {
        let byte = match self.escape {
            EscapeMode::Unescaped => byte,
            EscapeMode::Escaped => match self.unescape(byte) {
                Some(b) => b,
                None => return,
            },
        };

        match self.state {
            State::Seeking => {
                if byte == START_DELIMITER {
                    self.begin_frame();
                } else {
                    self.skipped += 1;
                    self.stats.discarded_bytes += 1;
                }
            }
            State::Accumulating => {
                self.buf.put_u8(byte);
                self.drain(out);
            }
        }
    }

    /// Escaped-mode handling of one raw byte. Returns the data byte to
    /// buffer, or `None` when the byte was consumed here.
    fn unescape(&mut self, byte: u8) -> Option<u8> {
        if byte == START_DELIMITER {
            // Never stuffed: always a frame boundary, even right after an escape.
            self.escape_next = false;
            self.begin_frame();
            return None;
        }
        if self.escape_next {
            self.escape_next = false;
            return Some(byte ^ ESCAPE_XOR);
        }
        match byte {
            ESCAPE if self.state == State::Accumulating => {
                self.escape_next = true;
                None
            }
            XON | XOFF => {
                trace!(byte, "dropping raw flow-control byte");
                self.stats.discarded_bytes += 1;
                None
            }
            _ => Some(byte),
        }
    }

    fn begin_frame(&mut self) {
        if self.skipped > 0 {
            debug!(
                discarded = self.skipped,
                "skipped bytes before start delimiter"
            );
            self.skipped = 0;
        }
        if self.state == State::Accumulating && self.buf.len() > 1 {
            self.stats.desyncs += 1;
            self.stats.discarded_bytes += self.buf.len() as u64;
            debug!(
                discarded = self.buf.len(),
                "start delimiter inside partial frame; restarting"
            );
        }
        self.buf.clear();
        self.buf.put_u8(START_DELIMITER);
        self.state = State::Accumulating;
    }

    /// Extract every complete frame from the buffer, resynchronizing past
    /// invalid candidates.
    fn drain(&mut self, out: &mut Vec<Frame>) {
        loop {
            match try_extract(&self.buf, self.max_payload) {
                FrameExtraction::Incomplete => return,
                FrameExtraction::Complete { frame, consumed } => {
                    self.buf.advance(consumed);
                    self.stats.frames += 1;
                    trace!(len = frame.payload.len(), api_id = ?frame.api_id(), "frame reassembled");
                    out.push(frame);
                    if !self.reanchor() {
                        return;
                    }
                }
                FrameExtraction::Invalid(err) => {
                    match &err {
                        FrameError::ChecksumMismatch { .. } => self.stats.checksum_failures += 1,
                        FrameError::PayloadTooLarge { .. } => self.stats.invalid_lengths += 1,
                        _ => {}
                    }
                    debug!(error = %err, buffered = self.buf.len(), "discarding candidate frame");
                    // Drop the failed delimiter so the scan moves forward.
                    self.buf.advance(1);
                    self.stats.discarded_bytes += 1;
                    if !self.reanchor() {
                        return;
                    }
                }
            }
        }
    }

    /// Align the buffer on its next start delimiter. Returns false (and
    /// returns to seeking) when none is buffered.
    fn reanchor(&mut self) -> bool {
        let next_start = match self.escape {
            // A raw delimiter restarts the buffer as it arrives, so an
            // unescaped 0x7E here is payload data, never a boundary.
            EscapeMode::Escaped => None,
            EscapeMode::Unescaped => self.buf.iter().position(|&b| b == START_DELIMITER),
        };

        match next_start {
            Some(pos) => {
                if pos > 0 {
                    debug!(discarded = pos, "resynchronized on next start delimiter");
                    self.stats.discarded_bytes += pos as u64;
                    self.buf.advance(pos);
                }
                true
            }
            None => {
                if !self.buf.is_empty() {
                    let err = FrameError::Desync {
                        discarded: self.buf.len(),
                    };
                    debug!(error = %err, "no start delimiter buffered; seeking");
                    self.stats.desyncs += 1;
                }
                self.discard_buffer();
                false
            }
        }
    }

    fn discard_buffer(&mut self) {
        self.stats.discarded_bytes += self.buf.len() as u64;
        self.buf.clear();
        self.state = State::Seeking;
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::codec::encode_frame;

    fn wire(payload: &[u8], escape: EscapeMode) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(payload, escape, &mut buf).unwrap();
        buf.to_vec()
    }

    fn feed_bytewise(r: &mut StreamReassembler, data: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        for &b in data {
            frames.extend(r.push(&[b]));
        }
        frames
    }

    #[test]
    fn reassembles_frame_delivered_byte_by_byte() {
        let payload = [0x88, 0x01, b'N', b'I', 0x00, b'r', b'o', b'u', b't', b'e', b'r'];
        let mut r = StreamReassembler::new(EscapeMode::Unescaped);

        let frames = feed_bytewise(&mut r, &wire(&payload, EscapeMode::Unescaped));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), payload.as_slice());
        assert!(r.is_idle());
        assert_eq!(r.stats().frames, 1);
    }

    #[test]
    fn roundtrip_escaped_and_unescaped_across_lengths() {
        for escape in [EscapeMode::Unescaped, EscapeMode::Escaped] {
            for len in [0usize, 1, 2, 0x11, 0x13, 0x7D, 0x7E, 255, 256, 4096, MAX_PAYLOAD] {
                let payload: Vec<u8> = (0..len).map(|i| (i * 7 % 256) as u8).collect();
                let mut r = StreamReassembler::new(escape);
                let frames = r.push(&wire(&payload, escape));
                assert_eq!(frames.len(), 1, "len {len} {escape:?}");
                assert_eq!(frames[0].payload.as_ref(), payload.as_slice());
            }
        }
    }

    #[test]
    fn frame_shaped_payload_data_does_not_split_the_frame() {
        // RX packet whose RF data holds `7E 00 00 FF`, itself a valid empty frame.
        let mut payload = vec![0x90, 0x00, 0x13, 0xA2, 0x00, 0x40, 0x52, 0x2B, 0xAA];
        payload.extend([0x7D, 0x84, 0x01, 0x7E, 0x00, 0x00, 0xFF, 0x42, 0x43]);
        let stream = wire(&payload, EscapeMode::Unescaped);

        let mut r = StreamReassembler::new(EscapeMode::Unescaped);
        let frames = r.push(&stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), payload.as_slice());

        let mut r = StreamReassembler::new(EscapeMode::Unescaped);
        let frames = feed_bytewise(&mut r, &stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), payload.as_slice());
        assert_eq!(r.stats().desyncs, 0);
        assert_eq!(r.stats().discarded_bytes, 0);
    }

    #[test]
    fn tunnelled_api_frame_stays_inside_its_carrier() {
        let inner = wire(&[0x8A, 0x06], EscapeMode::Unescaped);
        let mut payload = vec![0x90, 0x00, 0x13, 0xA2, 0x00, 0x40, 0x52, 0x2B, 0xAA];
        payload.extend([0xFF, 0xFE, 0x01]);
        payload.extend(&inner);

        let mut r = StreamReassembler::new(EscapeMode::Unescaped);
        let frames = feed_bytewise(&mut r, &wire(&payload, EscapeMode::Unescaped));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), payload.as_slice());
        assert!(r.is_idle());
    }

    #[test]
    fn drains_multiple_frames_from_one_chunk_in_order() {
        let a = [0x8A, 0x00];
        let b = [0x90, 0x01, 0x02];
        let mut chunk = wire(&a, EscapeMode::Unescaped);
        chunk.extend(wire(&b, EscapeMode::Unescaped));

        let mut r = StreamReassembler::new(EscapeMode::Unescaped);
        let frames = r.push(&chunk);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].payload.as_ref(), &a);
        assert_eq!(frames[1].payload.as_ref(), &b);
    }

    #[test]
    fn resynchronizes_after_garbage_with_reserved_looking_bytes() {
        let payload = [0x90, 0x00, 0x13, 0xA2, 0x00, 0x40, 0x7E, 0x11, 0x13, 0x7D];
        let garbage = [
            0x7E, 0x7E, 0x00, 0x7D, 0x11, 0x13, 0x7E, 0x00, 0x03, 0xAA, 0xBB, 0xCC, 0x00, 0x7E,
            0x00,
        ];

        for escape in [EscapeMode::Unescaped, EscapeMode::Escaped] {
            let mut stream = garbage.to_vec();
            stream.extend(wire(&payload, escape));

            // The cap rejects the garbage's bogus lengths (0x7D, 0x7E) on sight.
            let mut r = StreamReassembler::with_max_payload(escape, 64);
            let frames = feed_bytewise(&mut r, &stream);
            assert_eq!(frames.len(), 1, "{escape:?}");
            assert_eq!(frames[0].payload.as_ref(), payload.as_slice());
        }
    }

    #[test]
    fn corrupted_frame_does_not_poison_the_next_one() {
        let mut bad = wire(&[0x8A, 0x02], EscapeMode::Unescaped);
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;
        let good = wire(&[0x8A, 0x06], EscapeMode::Unescaped);

        let mut stream = bad;
        stream.extend(&good);

        let mut r = StreamReassembler::new(EscapeMode::Unescaped);
        let frames = r.push(&stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), &[0x8A, 0x06]);
        assert_eq!(r.stats().checksum_failures, 1);
    }

    #[test]
    fn bogus_length_swallowing_a_real_frame_is_recovered() {
        // A stray delimiter whose length claims 8 bytes; the real frame starts
        // inside that window and must be found by rescanning.
        let good = wire(&[0x8A, 0x06], EscapeMode::Unescaped);
        let mut stream = vec![0x7E, 0x00, 0x08];
        stream.extend(&good);
        stream.extend([0x00, 0x00, 0x00]);

        let mut r = StreamReassembler::new(EscapeMode::Unescaped);
        let frames = feed_bytewise(&mut r, &stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), &[0x8A, 0x06]);
    }

    #[test]
    fn bogus_length_holds_the_stream_until_its_checksum_fails() {
        let good = wire(&[0x8A, 0x06], EscapeMode::Unescaped);
        let mut stream = vec![0x7E, 0x00, 0x10];
        stream.extend(&good);

        let mut r = StreamReassembler::new(EscapeMode::Unescaped);
        assert!(r.push(&stream).is_empty());
        assert!(!r.is_idle());

        // Padding completes the bogus candidate; the buffered frame is then found.
        let frames = r.push(&[0x00; 11]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), &[0x8A, 0x06]);
        assert_eq!(r.stats().checksum_failures, 1);
    }

    #[test]
    fn oversized_length_is_rejected_without_waiting() {
        let good = wire(&[0x8A, 0x00], EscapeMode::Unescaped);
        let mut stream = vec![0x7E, 0xFF, 0xFF];
        stream.extend(&good);

        let mut r = StreamReassembler::with_max_payload(EscapeMode::Unescaped, 256);
        let frames = r.push(&stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(r.stats().invalid_lengths, 1);
    }

    #[test]
    fn garbage_without_delimiter_is_discarded() {
        let mut r = StreamReassembler::new(EscapeMode::Unescaped);
        assert!(r.push(&[0x01, 0x02, 0x03, 0x04, 0x05]).is_empty());
        assert!(r.is_idle());
        assert_eq!(r.buffered_len(), 0);
        assert_eq!(r.stats().discarded_bytes, 5);
    }

    #[test]
    fn raw_delimiter_restarts_partial_frame_in_escaped_mode() {
        let good = wire(&[0x8A, 0x01], EscapeMode::Escaped);
        let mut stream = vec![0x7E, 0x00, 0x05, 0x90, 0x00];
        stream.extend(&good);

        let mut r = StreamReassembler::new(EscapeMode::Escaped);
        let frames = r.push(&stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), &[0x8A, 0x01]);
        assert_eq!(r.stats().desyncs, 1);
    }

    #[test]
    fn raw_flow_control_bytes_are_ignored_in_escaped_mode() {
        let good = wire(&[0x8A, 0x06], EscapeMode::Escaped);
        let mut stream = Vec::new();
        for (i, b) in good.iter().enumerate() {
            stream.push(*b);
            if i % 2 == 1 {
                stream.push(XON);
                stream.push(XOFF);
            }
        }

        let mut r = StreamReassembler::new(EscapeMode::Escaped);
        let frames = r.push(&stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), &[0x8A, 0x06]);
    }

    #[test]
    fn escape_split_across_reads_is_preserved() {
        let payload = [0x90, 0x7E, 0x7D];
        let stream = wire(&payload, EscapeMode::Escaped);
        let split = stream.iter().position(|&b| b == ESCAPE).unwrap() + 1;

        let mut r = StreamReassembler::new(EscapeMode::Escaped);
        assert!(r.push(&stream[..split]).is_empty());
        let frames = r.push(&stream[split..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), &payload);
    }

    #[test]
    fn reset_drops_partial_frame() {
        let stream = wire(&[0x8A, 0x06], EscapeMode::Unescaped);
        let mut r = StreamReassembler::new(EscapeMode::Unescaped);
        r.push(&stream[..3]);
        assert!(!r.is_idle());

        r.reset();
        assert!(r.is_idle());
        assert!(r.push(&stream[3..]).is_empty());
        assert_eq!(r.push(&stream).len(), 1);
    }
}
