use std::io::{ErrorKind, Write};
use std::time::Instant;

use bytes::BytesMut;
use xbee_transport::XBeeLink;

use crate::codec::{encode_frame, Frame, FrameConfig, FRAME_OVERHEAD};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Writes complete frames to any `Write` stream.
///
/// Each frame is encoded in full (stuffed when the configuration selects
/// escaped mode) and written with a single flush, so frames from different
/// callers never interleave as long as the writer itself is not shared
/// without a lock.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.payload.as_ref())
    }

    /// Encode and send a payload as one frame.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::UnsupportedLength {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        self.buf.reserve(FRAME_OVERHEAD + payload.len());
        encode_frame(payload, self.config.escape, &mut self.buf)?;

        let deadline = self.deadline();
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock && !expired(deadline) => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush_until(deadline)
    }

    /// Flush the underlying stream.
    ///
    /// A stream that keeps reporting `WouldBlock` past the configured write
    /// timeout fails with [`FrameError::Io`].
    pub fn flush(&mut self) -> Result<()> {
        let deadline = self.deadline();
        self.flush_until(deadline)
    }

    fn flush_until(&mut self, deadline: Option<Instant>) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock && !expired(deadline) => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.config
            .write_timeout
            .and_then(|timeout| Instant::now().checked_add(timeout))
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Swap the underlying stream, returning the old one.
    pub fn replace_inner(&mut self, inner: T) -> T {
        std::mem::replace(&mut self.inner, inner)
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|at| Instant::now() >= at)
}

impl FrameWriter<XBeeLink> {
    /// Create a frame writer for `XBeeLink` and apply write timeout from config.
    pub fn with_config_link(mut inner: XBeeLink, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{decode_frame, MAX_PAYLOAD};
    use crate::escape::EscapeMode;

    fn written(writer: FrameWriter<Cursor<Vec<u8>>>) -> Vec<u8> {
        writer.into_inner().into_inner()
    }

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(&[0x08, 0x01, b'N', b'I']).unwrap();

        assert_eq!(
            written(writer),
            vec![0x7E, 0x00, 0x04, 0x08, 0x01, 0x4E, 0x49, 0x5F]
        );
    }

    #[test]
    fn write_multiple_frames() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(b"\x08\x01NI").unwrap();
        writer.send(b"\x08\x02ND").unwrap();
        writer.send(b"\x10\x03data").unwrap();

        let mut wire = BytesMut::from(written(writer).as_slice());

        let f1 = decode_frame(&mut wire, MAX_PAYLOAD).unwrap().unwrap();
        let f2 = decode_frame(&mut wire, MAX_PAYLOAD).unwrap().unwrap();
        let f3 = decode_frame(&mut wire, MAX_PAYLOAD).unwrap().unwrap();

        assert_eq!(f1.payload.as_ref(), b"\x08\x01NI");
        assert_eq!(f2.payload.as_ref(), b"\x08\x02ND");
        assert_eq!(f3.payload.as_ref(), b"\x10\x03data");
        assert!(wire.is_empty());
    }

    #[test]
    fn escaped_config_stuffs_reserved_bytes() {
        let cfg = FrameConfig {
            escape: EscapeMode::Escaped,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        writer.send(&[0x10, 0x7E]).unwrap();

        // checksum = 0xFF - 0x8E = 0x71
        assert_eq!(
            written(writer),
            vec![0x7E, 0x00, 0x02, 0x10, 0x7D, 0x5E, 0x71]
        );
    }

    #[test]
    fn payload_over_configured_cap_rejected() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer.send(b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::UnsupportedLength { size: 9, max: 4 }));
        assert!(written(writer).is_empty());
    }

    #[test]
    fn payload_over_length_field_rejected() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let payload = vec![0u8; MAX_PAYLOAD + 1];

        let err = writer.send(&payload).unwrap_err();
        assert!(matches!(err, FrameError::UnsupportedLength { .. }));
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.send(b"\x08\x01AP").unwrap();

        assert!(flag.load(Ordering::SeqCst));
        assert_eq!(writer.get_ref().data.len(), 8);
    }

    #[test]
    fn write_frame_method() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let frame = Frame::new(&b"\x08\x01VR"[..]);

        writer.write_frame(&frame).unwrap();

        let mut wire = BytesMut::from(written(writer).as_slice());
        let decoded = decode_frame(&mut wire, MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut writer = FrameWriter::new(cursor);

        let _ = writer.get_ref();
        let _ = writer.get_mut();
        assert_eq!(writer.config().escape, EscapeMode::Unescaped);
        let old = writer.replace_inner(Cursor::new(Vec::new()));
        assert!(old.into_inner().is_empty());
        let _inner = writer.into_inner();
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let writer_impl = InterruptedWriteThenFlush {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        };

        let mut writer = FrameWriter::new(writer_impl);
        writer.send(b"\x08\x05ID").unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data.len(), 8);
    }

    #[test]
    fn handles_would_block_write_and_flush() {
        let writer_impl = WouldBlockWriteThenFlush {
            wrote_once: false,
            flush_would_block: false,
            data: Vec::new(),
        };

        let mut writer = FrameWriter::new(writer_impl);
        writer.send(b"\x08\x06ID").unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data.len(), 8);
    }

    #[test]
    fn stalled_stream_fails_after_write_timeout() {
        let cfg = FrameConfig {
            write_timeout: Some(std::time::Duration::from_millis(20)),
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(AlwaysWouldBlock, cfg);

        let err = writer.send(b"\x8A\x00").unwrap_err();
        assert!(matches!(err, FrameError::Io(ref e) if e.kind() == ErrorKind::WouldBlock));
        assert!(matches!(writer.flush(), Err(FrameError::Io(_))));
    }

    #[test]
    #[cfg(unix)]
    fn unread_link_fails_instead_of_spinning() {
        let (left, _right) = XBeeLink::pair().unwrap();
        let cfg = FrameConfig {
            write_timeout: Some(std::time::Duration::from_millis(20)),
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config_link(left, cfg).unwrap();
        let payload = vec![0x10u8; MAX_PAYLOAD];

        // The peer never reads, so the socket buffer fills and a send times out.
        let failed = (0..256).find_map(|_| writer.send(&payload).err());
        assert!(matches!(failed, Some(FrameError::Io(_))));
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(b"\x8A\x00").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    #[cfg(unix)]
    fn applies_write_timeout_for_link() {
        let (left, _right) = XBeeLink::pair().unwrap();
        let cfg = FrameConfig {
            write_timeout: Some(std::time::Duration::from_millis(10)),
            ..FrameConfig::default()
        };

        let writer = FrameWriter::with_config_link(left, cfg);
        assert!(writer.is_ok());
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptedWriteThenFlush {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct WouldBlockWriteThenFlush {
        wrote_once: bool,
        flush_would_block: bool,
        data: Vec<u8>,
    }

    impl Write for WouldBlockWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_would_block {
                self.flush_would_block = true;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            Ok(())
        }
    }

    struct AlwaysWouldBlock;

    impl Write for AlwaysWouldBlock {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn written_bytes_decode() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(b"\x8A\x06").unwrap();

        let wire = written(writer);
        let mut framed = crate::reader::FrameReader::new(Cursor::new(wire));
        let frame = framed.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"\x8A\x06");
    }
}
