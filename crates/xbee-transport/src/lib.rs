//! Serial link abstraction for XBee radio modules.
//!
//! Provides a unified interface over the links an XBee engine talks through:
//! - Serial ports (UART / USB-serial adapters) via the `serialport` crate
//! - Unix socket pairs (in-process loopback for simulated radios)
//!
//! This is the lowest layer of the engine. Framing, decoding and request
//! coordination all build on the [`XBeeLink`] type provided here, and link-open
//! mode auto-detection lives in [`mode`].

pub mod error;
pub mod link;
pub mod mode;
pub mod serial;

pub use error::{Result, TransportError};
pub use link::XBeeLink;
pub use mode::{detect_mode, exit_command_mode, LinkMode, ModeDetectConfig};
pub use serial::{open, LinkConfig, DEFAULT_BAUD_RATE, DEFAULT_LINK_TIMEOUT};
