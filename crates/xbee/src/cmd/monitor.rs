use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use tracing::{info, warn};
use xbee_api::Response;
use xbee_device::DeviceEvent;

use crate::cmd::MonitorArgs;
use crate::exit::{CliError, CliResult, FAILURE, INTERNAL, SUCCESS};
use crate::output::{print_response, OutputFormat};

/// How often the loop checks for Ctrl-C while no events arrive.
const POLL: Duration = Duration::from_millis(200);

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let device = args.link.open(Duration::from_secs(5))?;
    let events = device.events();
    info!(port = %args.link.port, "monitoring; press Ctrl-C to stop");

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let event = match events.recv_timeout(POLL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let response = match event {
            DeviceEvent::Response(response) => response,
            DeviceEvent::ModemStatus(status) => Response::ModemStatus(status),
            DeviceEvent::Reconnected => {
                info!(port = %args.link.port, "link re-opened");
                continue;
            }
            DeviceEvent::ReaderStopped { reason } => {
                warn!(%reason, "reader stopped");
                return Err(CliError::new(FAILURE, format!("monitor stopped: {reason}")));
            }
        };

        print_response(&response, &args.link.port, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    device.shutdown();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
