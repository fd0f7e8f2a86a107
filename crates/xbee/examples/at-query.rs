//! Query a module's identity with a few local AT commands.
//!
//! Run with:
//!   cargo run --example at-query -- /dev/ttyUSB0
//!
//! The module must be in API mode (AP=1). Pass `--escaped` for AP=2.

use xbee::api::{Request, Response};
use xbee::device::{DeviceConfig, XBeeDevice};
use xbee::frame::EscapeMode;
use xbee::transport::LinkConfig;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let port = args.next().unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let escaped = args.any(|arg| arg == "--escaped");

    let config = DeviceConfig {
        escape: if escaped {
            EscapeMode::Escaped
        } else {
            EscapeMode::Unescaped
        },
        ..DeviceConfig::default()
    };
    let device = XBeeDevice::open(LinkConfig::new(port), config)?;

    for command in ["NI", "SH", "SL", "MY", "ID", "VR"] {
        match device.execute(&Request::at(command)?)? {
            Response::AtCommand(at) if at.status.is_ok() => {
                let value = match std::str::from_utf8(&at.value) {
                    Ok(text) if command == "NI" => text.to_string(),
                    _ => at.value.iter().map(|b| format!("{b:02X}")).collect(),
                };
                println!("{command}: {value}");
            }
            Response::AtCommand(at) => println!("{command}: {}", at.status),
            other => println!("{command}: unexpected {}", other.kind()),
        }
    }

    eprintln!("{:?}", device.stats());
    Ok(())
}
