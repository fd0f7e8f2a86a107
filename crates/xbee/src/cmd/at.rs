use tracing::debug;
use xbee_api::{Request, Response};

use crate::cmd::{parse_duration, parse_hex, AtArgs};
use crate::exit::{api_error, device_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_response, OutputFormat};

pub fn run(args: AtArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let request = build_request(&args)?;

    let device = args.link.open(timeout)?;
    debug!(command = %args.command, remote = args.dest.is_some(), "sending AT command");
    let response = device
        .execute(&request)
        .map_err(|err| device_error(&format!("AT{} failed", args.command), err))?;

    print_response(&response, &args.link.port, format);
    Ok(exit_code(&response))
}

fn build_request(args: &AtArgs) -> CliResult<Request> {
    let parameter = match &args.param {
        Some(hex) => parse_hex(hex)?,
        None => Vec::new(),
    };
    let request = match args.dest {
        Some(dest) => Request::remote_at(dest, &args.command, parameter),
        None => Request::at_with_param(&args.command, parameter),
    };
    request.map_err(|err| api_error("invalid AT command", err))
}

/// A response with a non-ok status still prints, but the command fails.
fn exit_code(response: &Response) -> i32 {
    let ok = match response {
        Response::AtCommand(at) => at.status.is_ok(),
        Response::RemoteAtCommand(at) => at.status.is_ok(),
        _ => true,
    };
    if ok {
        SUCCESS
    } else {
        FAILURE
    }
}
