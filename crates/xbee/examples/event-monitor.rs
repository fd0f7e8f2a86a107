//! Print received packets and modem status changes until the reader stops.
//!
//! Run with:
//!   cargo run --example event-monitor -- /dev/ttyUSB0

use xbee::api::Response;
use xbee::device::{DeviceEvent, ReconnectPolicy};
use xbee::transport::LinkConfig;
use xbee::{DeviceConfig, XBeeDevice};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    let config = DeviceConfig {
        reconnect: ReconnectPolicy::Reopen {
            attempts: 5,
            delay: std::time::Duration::from_secs(1),
        },
        ..DeviceConfig::default()
    };
    let device = XBeeDevice::open(LinkConfig::new(port), config)?;
    eprintln!("Listening on {}", device.name());

    for event in device.events() {
        match event {
            DeviceEvent::Response(Response::ZbRxPacket(rx)) => {
                println!(
                    "{} ({}) sent {} bytes: {:?}",
                    rx.source64,
                    rx.source16,
                    rx.data.len(),
                    String::from_utf8_lossy(&rx.data)
                );
            }
            DeviceEvent::Response(Response::NodeIdentification(node)) => {
                println!("node joined: {} {}", node.node_id, node.remote64);
            }
            DeviceEvent::Response(other) => println!("{} frame", other.kind()),
            DeviceEvent::ModemStatus(status) => println!("modem: {status}"),
            DeviceEvent::Reconnected => eprintln!("link re-opened"),
            DeviceEvent::ReaderStopped { reason } => {
                eprintln!("reader stopped: {reason}");
                break;
            }
        }
    }

    Ok(())
}
