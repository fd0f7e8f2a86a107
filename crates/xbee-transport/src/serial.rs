use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::link::XBeeLink;

/// Factory default baud rate of XBee modules (`ATBD3`).
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default per-call read/write timeout on the serial handle.
///
/// Kept short so that a blocked reader regularly returns control to its
/// owner and can observe a stop request between reads.
pub const DEFAULT_LINK_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial link configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Serial port identifier (`/dev/ttyUSB0`, `COM3`, ...).
    pub port: String,
    /// Line speed in baud.
    pub baud_rate: u32,
    /// Read/write timeout applied to the opened handle.
    pub timeout: Duration,
}

impl LinkConfig {
    /// Configuration for `port` with default baud rate and timeout.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    /// Override the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Override the handle timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_LINK_TIMEOUT,
        }
    }
}

/// Open a serial port as an XBee link (8N1, no hardware flow control).
pub fn open(config: &LinkConfig) -> Result<XBeeLink> {
    if config.port.is_empty() {
        return Err(TransportError::Open {
            port: config.port.clone(),
            source: serialport::Error::new(
                serialport::ErrorKind::InvalidInput,
                "serial port identifier must not be empty",
            ),
        });
    }

    let port = serialport::new(&config.port, config.baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .stop_bits(serialport::StopBits::One)
        .parity(serialport::Parity::None)
        .flow_control(serialport::FlowControl::None)
        .timeout(config.timeout)
        .open()
        .map_err(|source| TransportError::Open {
            port: config.port.clone(),
            source,
        })?;

    debug!(port = %config.port, "discarding stale input");
    port.clear(serialport::ClearBuffer::All)?;

    info!(port = %config.port, baud = config.baud_rate, "opened serial link");
    Ok(XBeeLink::from_serial(port))
}
