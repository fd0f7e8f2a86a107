use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Timeout programmed into a serial port when the caller asks for "no timeout".
///
/// `serialport` has no blocking-forever mode, so an unbounded wait is
/// expressed as one day.
const UNBOUNDED_SERIAL_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// A connected link to an XBee module. Implements `Read` and `Write`.
///
/// This is the fundamental I/O type returned by transport operations.
/// In production it wraps a serial port; on Unix it can also wrap one end
/// of a socket pair so that a simulated radio can sit on the other end.
pub struct XBeeLink {
    inner: LinkInner,
}

enum LinkInner {
    Serial(Box<dyn serialport::SerialPort>),
    #[cfg(unix)]
    Socket(std::os::unix::net::UnixStream),
}

impl Read for XBeeLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkInner::Serial(port) => port.read(buf),
            #[cfg(unix)]
            LinkInner::Socket(stream) => stream.read(buf),
        }
    }
}

impl Write for XBeeLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkInner::Serial(port) => port.write(buf),
            #[cfg(unix)]
            LinkInner::Socket(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            LinkInner::Serial(port) => port.flush(),
            #[cfg(unix)]
            LinkInner::Socket(stream) => stream.flush(),
        }
    }
}

impl XBeeLink {
    /// Create a link from an opened serial port.
    pub(crate) fn from_serial(port: Box<dyn serialport::SerialPort>) -> Self {
        Self {
            inner: LinkInner::Serial(port),
        }
    }

    /// Create a connected pair of in-process links.
    ///
    /// Bytes written to one end are read from the other. Used to attach a
    /// simulated radio to an engine without hardware.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((
            Self {
                inner: LinkInner::Socket(left),
            },
            Self {
                inner: LinkInner::Socket(right),
            },
        ))
    }

    /// Set read timeout on the underlying link.
    ///
    /// A serial port shares one timeout between both directions of a handle,
    /// so this also bounds writes on the same handle. Use [`try_clone`](Self::try_clone)
    /// to give the reader and the writer independent handles.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            LinkInner::Serial(port) => port
                .set_timeout(timeout.unwrap_or(UNBOUNDED_SERIAL_TIMEOUT))
                .map_err(Into::into),
            #[cfg(unix)]
            LinkInner::Socket(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying link.
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            LinkInner::Serial(port) => port
                .set_timeout(timeout.unwrap_or(UNBOUNDED_SERIAL_TIMEOUT))
                .map_err(Into::into),
            #[cfg(unix)]
            LinkInner::Socket(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this link (creates a new handle to the same device).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            LinkInner::Serial(port) => Ok(Self::from_serial(port.try_clone()?)),
            #[cfg(unix)]
            LinkInner::Socket(stream) => Ok(Self {
                inner: LinkInner::Socket(stream.try_clone()?),
            }),
        }
    }

    /// Discard bytes received but not yet read.
    pub fn clear_input(&self) -> Result<()> {
        match &self.inner {
            LinkInner::Serial(port) => port
                .clear(serialport::ClearBuffer::Input)
                .map_err(Into::into),
            #[cfg(unix)]
            LinkInner::Socket(_) => Ok(()),
        }
    }

    /// Human-readable name of the link for diagnostics.
    pub fn name(&self) -> String {
        match &self.inner {
            LinkInner::Serial(port) => port.name().unwrap_or_else(|| "serial".to_string()),
            #[cfg(unix)]
            LinkInner::Socket(_) => "socket-pair".to_string(),
        }
    }
}

impl std::fmt::Debug for XBeeLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            LinkInner::Serial(port) => f
                .debug_struct("XBeeLink")
                .field("type", &"serial")
                .field("port", &port.name())
                .finish(),
            #[cfg(unix)]
            LinkInner::Socket(_) => f.debug_struct("XBeeLink").field("type", &"socket").finish(),
        }
    }
}
