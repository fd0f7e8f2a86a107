/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A candidate frame does not begin with the start delimiter.
    #[error("invalid start delimiter 0x{0:02X} (expected 0x7E)")]
    InvalidStartDelimiter(u8),

    /// An outbound payload does not fit the 16-bit length field (or the configured cap).
    #[error("unsupported payload length ({size} bytes, max {max})")]
    UnsupportedLength { size: usize, max: usize },

    /// An inbound length field exceeds the configured maximum payload size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A fully buffered frame failed its checksum.
    #[error("checksum mismatch (expected 0x{expected:02X}, got 0x{actual:02X})")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// No start delimiter was found while resynchronizing.
    #[error("stream desynchronized ({discarded} bytes discarded)")]
    Desync { discarded: usize },

    /// Escaped data ended in the middle of an escape sequence.
    #[error("escaped data ends with a dangling escape byte")]
    DanglingEscape,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
