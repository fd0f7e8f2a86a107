/// Errors from building requests or parsing typed API payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// A frame payload was empty, so it carries no API type tag.
    #[error("empty API payload")]
    Empty,

    /// A known API type's body is shorter than its fixed fields.
    #[error("API frame 0x{api_id:02X} truncated: need {needed} more bytes, {available} available")]
    Truncated {
        api_id: u8,
        needed: usize,
        available: usize,
    },

    /// Not enough bytes to read a fixed-size value.
    #[error("insufficient input: expected {expected} bytes, got {actual}")]
    InsufficientBytes { expected: usize, actual: usize },

    /// An AT command name is not exactly two printable ASCII characters.
    #[error("invalid AT command {0:?}: expected two ASCII characters")]
    InvalidCommand(String),

    /// An address string is not valid hexadecimal of the right width.
    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    /// The request has no frame id slot, so no reply can be correlated to it.
    #[error("API frame 0x{0:02X} carries no frame id")]
    NoFrameId(u8),
}

pub type Result<T> = std::result::Result<T, ApiError>;
