use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use xbee_transport::XBeeLink;

use crate::codec::{Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::reassembler::{ReassemblerStats, StreamReassembler};

const READ_CHUNK_SIZE: usize = 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads, noise and escape sequences internally. Callers
/// always get checksummed frames; corrupt input is skipped and counted in
/// [`stats`](Self::stats).
pub struct FrameReader<T> {
    inner: T,
    reassembler: StreamReassembler,
    pending: VecDeque<Frame>,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            reassembler: StreamReassembler::with_max_payload(
                config.escape,
                config.max_payload_size,
            ),
            pending: VecDeque::new(),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// A read timeout on the underlying stream surfaces as
    /// `Err(FrameError::Io(_))` with `WouldBlock` or `TimedOut`; any partial
    /// frame is kept and the call may simply be repeated.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(frame);
            }

            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            let mut frames = Vec::new();
            self.reassembler.push_into(&chunk[..read], &mut frames);
            self.pending.extend(frames);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Swap the underlying stream, dropping any partial frame.
    ///
    /// Frames already reassembled from the old stream are still returned.
    pub fn replace_inner(&mut self, inner: T) -> T {
        self.reassembler.reset();
        std::mem::replace(&mut self.inner, inner)
    }

    /// Stream counters from the reassembler.
    pub fn stats(&self) -> ReassemblerStats {
        self.reassembler.stats()
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<XBeeLink> {
    /// Create a frame reader for `XBeeLink` and apply read timeout from config.
    pub fn with_config_link(mut inner: XBeeLink, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: xbee_transport::TransportError) -> FrameError {
    match err {
        xbee_transport::TransportError::Io(io) => FrameError::Io(io),
        xbee_transport::TransportError::Closed => FrameError::ConnectionClosed,
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
