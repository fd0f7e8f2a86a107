use std::time::Duration;

use clap::{Args, Subcommand};
use xbee_api::Address64;
use xbee_device::{DeviceConfig, ModeSelection, XBeeDevice};
use xbee_frame::EscapeMode;
use xbee_transport::{LinkConfig, LinkMode, DEFAULT_BAUD_RATE};

use crate::exit::{device_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod at;
pub mod detect;
pub mod monitor;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Probe a module and report whether it is in API or transparent mode.
    Detect(DetectArgs),
    /// Run a local or remote AT command.
    At(AtArgs),
    /// Send data to another node and report its delivery status.
    Send(SendArgs),
    /// Print unsolicited frames and modem status changes.
    Monitor(MonitorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Detect(args) => detect::run(args, format),
        Command::At(args) => at::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Serial link options shared by every command that talks to a module.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Serial port (e.g. /dev/ttyUSB0, COM3).
    pub port: String,
    /// Baud rate.
    #[arg(long, short = 'b', default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Use escaped API framing (AP=2).
    #[arg(long)]
    pub escaped: bool,
    /// Skip mode detection and assume the module is in API mode.
    #[arg(long)]
    pub assume_api: bool,
}

impl LinkArgs {
    pub fn link_config(&self) -> LinkConfig {
        LinkConfig::new(&self.port).with_baud_rate(self.baud)
    }

    pub fn device_config(&self, response_timeout: Duration) -> DeviceConfig {
        DeviceConfig {
            mode: if self.assume_api {
                ModeSelection::Fixed(LinkMode::Api)
            } else {
                ModeSelection::Auto
            },
            escape: if self.escaped {
                EscapeMode::Escaped
            } else {
                EscapeMode::Unescaped
            },
            response_timeout,
            ..DeviceConfig::default()
        }
    }

    pub fn open(&self, response_timeout: Duration) -> CliResult<XBeeDevice> {
        XBeeDevice::open(self.link_config(), self.device_config(response_timeout))
            .map_err(|err| device_error(&format!("failed to open {}", self.port), err))
    }
}

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Serial port (e.g. /dev/ttyUSB0, COM3).
    pub port: String,
    /// Baud rate.
    #[arg(long, short = 'b', default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
}

#[derive(Args, Debug)]
pub struct AtArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Two-character AT command (e.g. NI, ID, SH).
    pub command: String,
    /// Parameter value as hex (e.g. 3332 or "33 32").
    #[arg(long)]
    pub param: Option<String>,
    /// Run the command on the node with this 64-bit address.
    #[arg(long, value_name = "ADDR64")]
    pub dest: Option<Address64>,
    /// Maximum time to wait for the response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// 64-bit destination address (000000000000FFFF broadcasts).
    #[arg(long, value_name = "ADDR64")]
    pub dest: Address64,
    /// Text payload.
    #[arg(long, conflicts_with = "hex", required_unless_present = "hex")]
    pub data: Option<String>,
    /// Payload as hex.
    #[arg(long, conflicts_with = "data")]
    pub hex: Option<String>,
    /// Maximum time to wait for the transmit status (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Exit after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Parse hex digits, ignoring whitespace and an optional `0x` prefix.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<u8> = trimmed
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();

    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("hex value must have an even number of digits: {input}"),
        ));
    }

    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| CliError::new(USAGE, format!("invalid hex value: {input}")))
        })
        .collect()
}
