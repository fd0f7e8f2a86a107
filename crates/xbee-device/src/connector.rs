use xbee_transport::LinkConfig;

use crate::config::DeviceConfig;
use crate::device::XBeeDevice;
use crate::error::Result;

/// Open the serial port `port` at the default baud rate and start a device
/// with default configuration (mode auto-detection, single outstanding
/// request).
pub fn open(port: &str) -> Result<XBeeDevice> {
    open_with_config(LinkConfig::new(port), DeviceConfig::default())
}

/// Open with explicit link and device configuration.
pub fn open_with_config(link: LinkConfig, config: DeviceConfig) -> Result<XBeeDevice> {
    XBeeDevice::open(link, config)
}
