use std::time::Duration;

use xbee_transport::{detect_mode, exit_command_mode, LinkConfig, LinkMode, ModeDetectConfig};

use crate::cmd::DetectArgs;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_mode, OutputFormat};

/// Read timeout while probing; well under the guard time.
const PROBE_POLL: Duration = Duration::from_millis(50);

pub fn run(args: DetectArgs, format: OutputFormat) -> CliResult<i32> {
    let config = LinkConfig::new(&args.port)
        .with_baud_rate(args.baud)
        .with_timeout(PROBE_POLL);
    let context = format!("detect on {} failed", args.port);

    let mut link = xbee_transport::open(&config).map_err(|err| transport_error(&context, err))?;
    let mode = detect_mode(&mut link, &ModeDetectConfig::default())
        .map_err(|err| transport_error(&context, err))?;
    if mode == LinkMode::Transparent {
        exit_command_mode(&mut link).map_err(|err| transport_error(&context, err))?;
    }

    print_mode(mode, &args.port, format);
    Ok(SUCCESS)
}
