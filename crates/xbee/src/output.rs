use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use xbee_api::Response;
use xbee_transport::LinkMode;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ResponseOutput<'a> {
    kind: &'static str,
    api_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame_id: Option<u8>,
    port: &'a str,
    fields: serde_json::Map<String, serde_json::Value>,
    timestamp: String,
}

#[derive(Serialize)]
struct ModeOutput<'a> {
    port: &'a str,
    mode: String,
    timestamp: String,
}

pub fn print_response(response: &Response, port: &str, format: OutputFormat) {
    let fields = describe(response);
    match format {
        OutputFormat::Json => {
            let out = ResponseOutput {
                kind: response.kind(),
                api_id: format!("0x{:02X}", response.api_id()),
                frame_id: response.frame_id(),
                port,
                fields: fields
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), serde_json::Value::String(value)))
                    .collect(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"])
                .add_row(vec!["kind".to_string(), response.kind().to_string()]);
            if let Some(frame_id) = response.frame_id() {
                table.add_row(vec!["frame_id".to_string(), frame_id.to_string()]);
            }
            for (name, value) in fields {
                table.add_row(vec![name.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let body = fields
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{} {}", response.kind(), body);
        }
        OutputFormat::Raw => print_raw(raw_data(response)),
    }
}

pub fn print_mode(mode: LinkMode, port: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ModeOutput {
                port,
                mode: mode.to_string(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["PORT", "MODE"])
                .add_row(vec![port.to_string(), mode.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("port={port} mode={mode}"),
        OutputFormat::Raw => println!("{mode}"),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Named, display-ready fields of a response.
pub fn describe(response: &Response) -> Vec<(&'static str, String)> {
    match response {
        Response::AtCommand(at) => vec![
            ("command", at.command.to_string()),
            ("status", at.status.to_string()),
            ("value", data_preview(&at.value)),
        ],
        Response::RemoteAtCommand(at) => vec![
            ("source64", at.source64.to_string()),
            ("source16", at.source16.to_string()),
            ("command", at.command.to_string()),
            ("status", at.status.to_string()),
            ("value", data_preview(&at.value)),
        ],
        Response::ModemStatus(status) => vec![("status", status.to_string())],
        Response::Rx64(rx) | Response::Rx64IoSample(rx) => vec![
            ("source64", rx.source.to_string()),
            ("rssi", format!("-{} dBm", rx.rssi)),
            ("options", format!("0x{:02X}", rx.options)),
            ("data", data_preview(&rx.data)),
        ],
        Response::Rx16(rx) | Response::Rx16IoSample(rx) => vec![
            ("source16", rx.source.to_string()),
            ("rssi", format!("-{} dBm", rx.rssi)),
            ("options", format!("0x{:02X}", rx.options)),
            ("data", data_preview(&rx.data)),
        ],
        Response::TxStatus(tx) => vec![("status", tx.status.to_string())],
        Response::ZbTxStatus(tx) => vec![
            ("dest16", tx.dest16.to_string()),
            ("retries", tx.retry_count.to_string()),
            ("delivery", tx.delivery_status.to_string()),
            ("discovery", format!("0x{:02X}", tx.discovery_status)),
        ],
        Response::ZbRxPacket(rx) => vec![
            ("source64", rx.source64.to_string()),
            ("source16", rx.source16.to_string()),
            ("options", format!("0x{:02X}", rx.options)),
            ("data", data_preview(&rx.data)),
        ],
        Response::ZbExplicitRx(rx) => vec![
            ("source64", rx.source64.to_string()),
            ("source16", rx.source16.to_string()),
            (
                "endpoints",
                format!("0x{:02X}->0x{:02X}", rx.source_endpoint, rx.dest_endpoint),
            ),
            ("cluster", format!("0x{:04X}", rx.cluster_id)),
            ("profile", format!("0x{:04X}", rx.profile_id)),
            ("data", data_preview(&rx.data)),
        ],
        Response::ZbIoSample(sample) => {
            let mut fields = vec![
                ("source64", sample.source64.to_string()),
                ("source16", sample.source16.to_string()),
                ("digital_mask", format!("0x{:04X}", sample.digital_mask)),
            ];
            if let Some(levels) = sample.digital_samples {
                fields.push(("digital", format!("0x{levels:04X}")));
            }
            let analog = sample
                .analog_samples
                .iter()
                .map(|s| format!("AD{}={}", s.channel, s.value))
                .collect::<Vec<_>>()
                .join(",");
            if !analog.is_empty() {
                fields.push(("analog", analog));
            }
            fields
        }
        Response::SensorRead(read) => vec![
            ("source64", read.source64.to_string()),
            ("sensors", format!("0x{:02X}", read.sensors)),
            (
                "analog",
                read.analog
                    .iter()
                    .map(u16::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            ("temperature", read.temperature.to_string()),
        ],
        Response::NodeIdentification(node) => vec![
            ("remote64", node.remote64.to_string()),
            ("remote16", node.remote16.to_string()),
            ("node_id", node.node_id.clone()),
            ("device_type", node.device_type.to_string()),
            ("parent16", node.parent16.to_string()),
        ],
        Response::Unknown { api_id, data } => vec![
            ("api_id", format!("0x{api_id:02X}")),
            ("data", hex(data)),
        ],
    }
}

/// Opaque bytes a response carries, for `--format raw`.
fn raw_data(response: &Response) -> &[u8] {
    match response {
        Response::AtCommand(at) => &at.value[..],
        Response::RemoteAtCommand(at) => &at.value[..],
        Response::Rx64(rx) | Response::Rx64IoSample(rx) => &rx.data[..],
        Response::Rx16(rx) | Response::Rx16IoSample(rx) => &rx.data[..],
        Response::ZbRxPacket(rx) => &rx.data[..],
        Response::ZbExplicitRx(rx) => &rx.data[..],
        Response::Unknown { data, .. } => &data[..],
        _ => &[],
    }
}

/// Printable ASCII as text, anything else as hex.
pub fn data_preview(data: &[u8]) -> String {
    if !data.is_empty() && data.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        String::from_utf8_lossy(data).into_owned()
    } else {
        hex(data)
    }
}

pub fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use xbee_api::{AtCommand, AtCommandResponse, AtCommandStatus, ModemStatus};

    use super::*;

    #[test]
    fn previews_text_and_binary() {
        assert_eq!(data_preview(b"Router 1"), "Router 1");
        assert_eq!(data_preview(&[0x00, 0x13, 0xA2]), "00 13 A2");
        assert_eq!(data_preview(&[]), "");
    }

    #[test]
    fn describes_at_response() {
        let response = Response::AtCommand(AtCommandResponse {
            frame_id: 1,
            command: AtCommand::from_bytes(*b"ID"),
            status: AtCommandStatus::Ok,
            value: Bytes::from_static(&[0x33, 0x32]),
        });
        assert_eq!(
            describe(&response),
            vec![
                ("command", "ID".to_string()),
                ("status", "ok".to_string()),
                ("value", "32".to_string()),
            ]
        );
        assert_eq!(raw_data(&response), b"32");
    }

    #[test]
    fn describes_modem_status_without_raw_data() {
        let response = Response::ModemStatus(ModemStatus::CoordinatorStarted);
        assert_eq!(
            describe(&response),
            vec![("status", "coordinator started".to_string())]
        );
        assert!(raw_data(&response).is_empty());
    }
}
