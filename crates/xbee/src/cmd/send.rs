use xbee_api::{Request, Response};

use crate::cmd::{parse_duration, parse_hex, SendArgs};
use crate::exit::{device_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_response, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let payload = resolve_payload(&args)?;

    let device = args.link.open(timeout)?;
    let response = device
        .execute(&Request::zb_transmit(args.dest, payload))
        .map_err(|err| device_error(&format!("send to {} failed", args.dest), err))?;

    print_response(&response, &args.link.port, format);
    Ok(exit_code(&response))
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    Ok(args
        .data
        .as_deref()
        .map(|data| data.as_bytes().to_vec())
        .unwrap_or_default())
}

fn exit_code(response: &Response) -> i32 {
    let delivered = match response {
        Response::ZbTxStatus(status) => status.delivery_status.is_success(),
        Response::TxStatus(status) => status.status.is_success(),
        _ => true,
    };
    if delivered {
        SUCCESS
    } else {
        FAILURE
    }
}

#[cfg(test)]
mod tests {
    use xbee_api::{Address16, Address64, DeliveryStatus, ZbTxStatus};

    use super::*;
    use crate::cmd::LinkArgs;

    fn args(data: Option<&str>, hex: Option<&str>) -> SendArgs {
        SendArgs {
            link: LinkArgs {
                port: "/dev/null".to_string(),
                baud: 9600,
                escaped: false,
                assume_api: false,
            },
            dest: Address64::BROADCAST,
            data: data.map(str::to_string),
            hex: hex.map(str::to_string),
            timeout: "1s".to_string(),
        }
    }

    #[test]
    fn payload_from_text_or_hex() {
        assert_eq!(resolve_payload(&args(Some("hi"), None)).unwrap(), b"hi");
        assert_eq!(
            resolve_payload(&args(None, Some("7E 7D"))).unwrap(),
            vec![0x7E, 0x7D]
        );
    }

    #[test]
    fn failed_delivery_exits_nonzero() {
        let status = |delivery_status| {
            Response::ZbTxStatus(ZbTxStatus {
                frame_id: 1,
                dest16: Address16::UNKNOWN,
                retry_count: 0,
                delivery_status,
                discovery_status: 0,
            })
        };
        assert_eq!(exit_code(&status(DeliveryStatus::Success)), SUCCESS);
        assert_eq!(exit_code(&status(DeliveryStatus::NotJoined)), FAILURE);
    }
}
