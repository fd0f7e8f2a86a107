//! XBee protocol engine.
//!
//! This is the "just works" layer. Open a serial port, and an [`XBeeDevice`]
//! starts a background reader that reassembles frames, decodes them and
//! routes each one: replies go to the request waiting on their frame id,
//! everything else (modem status, received data, late replies) goes to the
//! event channel.
//!
//! ```no_run
//! use xbee_api::Request;
//!
//! let device = xbee_device::open("/dev/ttyUSB0")?;
//! let reply = device.execute(&Request::at("NI")?)?;
//! println!("{reply:?}");
//! # Ok::<(), xbee_device::DeviceError>(())
//! ```

pub mod config;
pub mod connector;
pub mod coordinator;
pub mod device;
pub mod error;
pub mod event;

pub use config::{
    DeviceConfig, ModeSelection, ReconnectPolicy, RequestPolicy, DEFAULT_MAX_PAYLOAD,
};
pub use connector::{open, open_with_config};
pub use coordinator::{Coordinator, Dispatch, FRAME_ID_COUNT};
pub use device::{DeviceStats, XBeeDevice};
pub use error::{DeviceError, Result};
pub use event::DeviceEvent;
