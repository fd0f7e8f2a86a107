use std::time::Duration;

/// Errors that can occur in device operations.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] xbee_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] xbee_frame::FrameError),

    /// Request could not be built or has no frame id slot.
    #[error("api error: {0}")]
    Api(#[from] xbee_api::ApiError),

    /// No matching response arrived in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Another request is outstanding and the caller asked not to wait.
    #[error("another request is already outstanding")]
    Busy,

    /// The engine has stopped; no further requests can complete.
    #[error("device closed")]
    Closed,

    /// Mode auto-detection found the module in transparent (AT) mode.
    #[error("module is in transparent mode; configure API mode (ATAP1 or ATAP2)")]
    TransparentMode,

    /// Every frame id from 1 to 255 is waiting for a response.
    #[error("all 255 frame ids are in flight")]
    FrameIdsExhausted,

    /// The background reader thread could not be started.
    #[error("failed to spawn reader thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
