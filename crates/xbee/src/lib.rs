//! XBee/ZigBee API-mode protocol engine for serial radio modules.
//!
//! Talks to Digi XBee modules in framed API mode: builds and checksums
//! frames, reassembles them from a noisy serial stream, decodes them into
//! typed responses, and correlates replies with requests by frame id.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial link abstraction and API-mode detection
//! - [`frame`]: checksum, escape-mode byte stuffing and stream reassembly
//! - [`api`]: addresses, typed requests and responses
//! - [`device`]: background reader and request/response engine (behind the `device` feature)

/// Re-export transport types.
pub mod transport {
    pub use xbee_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use xbee_frame::*;
}

/// Re-export API message types.
pub mod api {
    pub use xbee_api::*;
}

/// Re-export device types (requires `device` feature).
#[cfg(feature = "device")]
pub mod device {
    pub use xbee_device::*;
}

#[cfg(feature = "device")]
pub use xbee_device::{open, DeviceConfig, DeviceError, DeviceEvent, XBeeDevice};
