//! Inbound API frames decoded into typed responses.
//!
//! Dispatch is a fixed table keyed by the leading tag byte. Multi-byte
//! fields are big-endian; trailing opaque data takes the rest of the payload.

use bytes::Bytes;
use tracing::debug;

use crate::address::{Address16, Address64};
use crate::api_id;
use crate::error::{ApiError, Result};
use crate::request::AtCommand;
use crate::status::{AtCommandStatus, DeliveryStatus, DeviceType, ModemStatus};

/// Reply to a local AT command (`0x88`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtCommandResponse {
    pub frame_id: u8,
    pub command: AtCommand,
    pub status: AtCommandStatus,
    pub value: Bytes,
}

/// Reply to a remote AT command (`0x97`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAtCommandResponse {
    pub frame_id: u8,
    pub source64: Address64,
    pub source16: Address16,
    pub command: AtCommand,
    pub status: AtCommandStatus,
    pub value: Bytes,
}

/// 802.15.4 receive indicator, generic over the source address width.
///
/// For the I/O sample variants `data` holds the raw sample block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxPacket<A> {
    pub source: A,
    pub rssi: u8,
    pub options: u8,
    pub data: Bytes,
}

/// 802.15.4 transmit status (`0x89`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxStatus {
    pub frame_id: u8,
    pub status: DeliveryStatus,
}

/// ZigBee transmit status (`0x8B`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZbTxStatus {
    pub frame_id: u8,
    pub dest16: Address16,
    pub retry_count: u8,
    pub delivery_status: DeliveryStatus,
    /// 0: no overhead, 1: address discovery, 2: route discovery, 3: both.
    pub discovery_status: u8,
}

/// ZigBee receive packet (`0x90`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZbRxPacket {
    pub source64: Address64,
    pub source16: Address16,
    pub options: u8,
    pub data: Bytes,
}

/// ZigBee explicit receive indicator (`0x91`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZbExplicitRx {
    pub source64: Address64,
    pub source16: Address16,
    pub source_endpoint: u8,
    pub dest_endpoint: u8,
    pub cluster_id: u16,
    pub profile_id: u16,
    pub options: u8,
    pub data: Bytes,
}

/// One analog reading from an I/O sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalogSample {
    /// Analog channel; 7 is the supply voltage.
    pub channel: u8,
    pub value: u16,
}

/// ZigBee I/O data sample indicator (`0x92`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZbIoSample {
    pub source64: Address64,
    pub source16: Address16,
    pub options: u8,
    pub sample_sets: u8,
    pub digital_mask: u16,
    pub analog_mask: u8,
    /// Present only when `digital_mask` is nonzero.
    pub digital_samples: Option<u16>,
    pub analog_samples: Vec<AnalogSample>,
}

impl ZbIoSample {
    /// Level of digital line `pin`, if it is enabled in the mask.
    pub fn digital(&self, pin: u8) -> Option<bool> {
        let bit = 1u16.checked_shl(u32::from(pin))?;
        if self.digital_mask & bit == 0 {
            return None;
        }
        self.digital_samples.map(|levels| levels & bit != 0)
    }

    /// Reading for analog `channel`, if it is enabled in the mask.
    pub fn analog(&self, channel: u8) -> Option<u16> {
        self.analog_samples
            .iter()
            .find(|s| s.channel == channel)
            .map(|s| s.value)
    }
}

/// ZigBee sensor read indicator (`0x94`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorRead {
    pub source64: Address64,
    pub source16: Address16,
    pub options: u8,
    /// 1-Wire sensor type flags.
    pub sensors: u8,
    pub analog: [u16; 4],
    pub temperature: u16,
}

/// Node identification indicator (`0x95`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentification {
    pub sender64: Address64,
    pub sender16: Address16,
    pub options: u8,
    pub remote16: Address16,
    pub remote64: Address64,
    pub node_id: String,
    pub parent16: Address16,
    pub device_type: DeviceType,
    /// 1: pushbutton, 2: joined, 3: power cycle.
    pub source_event: u8,
    pub profile_id: u16,
    pub manufacturer_id: u16,
}

/// A decoded API frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    AtCommand(AtCommandResponse),
    RemoteAtCommand(RemoteAtCommandResponse),
    ModemStatus(ModemStatus),
    Rx64(RxPacket<Address64>),
    Rx16(RxPacket<Address16>),
    Rx64IoSample(RxPacket<Address64>),
    Rx16IoSample(RxPacket<Address16>),
    TxStatus(TxStatus),
    ZbTxStatus(ZbTxStatus),
    ZbRxPacket(ZbRxPacket),
    ZbExplicitRx(ZbExplicitRx),
    ZbIoSample(ZbIoSample),
    SensorRead(SensorRead),
    NodeIdentification(NodeIdentification),
    /// A tag without a typed decoder, or a known tag whose body is malformed.
    Unknown { api_id: u8, data: Bytes },
}

impl Response {
    /// Decode a frame payload. Never fails: anything that cannot be typed
    /// becomes [`Response::Unknown`]. An empty payload decodes as
    /// `Unknown { api_id: 0, data: [] }`.
    pub fn decode(payload: &[u8]) -> Self {
        match Self::try_decode(payload) {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, len = payload.len(), "undecodable API frame kept as unknown");
                let (api_id, data) = match payload.split_first() {
                    Some((&api_id, data)) => (api_id, Bytes::copy_from_slice(data)),
                    None => (0, Bytes::new()),
                };
                Self::Unknown { api_id, data }
            }
        }
    }

    /// Decode a frame payload, reporting why a known tag could not be typed.
    pub fn try_decode(payload: &[u8]) -> Result<Self> {
        let (&tag, body) = payload.split_first().ok_or(ApiError::Empty)?;
        let mut f = Fields::new(tag, body);

        let response = match tag {
            api_id::AT_COMMAND_RESPONSE => Self::AtCommand(AtCommandResponse {
                frame_id: f.u8()?,
                command: f.command()?,
                status: f.u8()?.into(),
                value: f.rest(),
            }),
            api_id::REMOTE_AT_RESPONSE => Self::RemoteAtCommand(RemoteAtCommandResponse {
                frame_id: f.u8()?,
                source64: f.addr64()?,
                source16: f.addr16()?,
                command: f.command()?,
                status: f.u8()?.into(),
                value: f.rest(),
            }),
            api_id::MODEM_STATUS => Self::ModemStatus(f.u8()?.into()),
            api_id::RX_64 => Self::Rx64(f.rx(Fields::addr64)?),
            api_id::RX_16 => Self::Rx16(f.rx(Fields::addr16)?),
            api_id::RX_64_IO => Self::Rx64IoSample(f.rx(Fields::addr64)?),
            api_id::RX_16_IO => Self::Rx16IoSample(f.rx(Fields::addr16)?),
            api_id::TX_STATUS => Self::TxStatus(TxStatus {
                frame_id: f.u8()?,
                status: f.u8()?.into(),
            }),
            api_id::ZB_TX_STATUS => Self::ZbTxStatus(ZbTxStatus {
                frame_id: f.u8()?,
                dest16: f.addr16()?,
                retry_count: f.u8()?,
                delivery_status: f.u8()?.into(),
                discovery_status: f.u8()?,
            }),
            api_id::ZB_RX_PACKET => Self::ZbRxPacket(ZbRxPacket {
                source64: f.addr64()?,
                source16: f.addr16()?,
                options: f.u8()?,
                data: f.rest(),
            }),
            api_id::ZB_EXPLICIT_RX => Self::ZbExplicitRx(ZbExplicitRx {
                source64: f.addr64()?,
                source16: f.addr16()?,
                source_endpoint: f.u8()?,
                dest_endpoint: f.u8()?,
                cluster_id: f.u16()?,
                profile_id: f.u16()?,
                options: f.u8()?,
                data: f.rest(),
            }),
            api_id::ZB_IO_SAMPLE => Self::ZbIoSample(decode_io_sample(&mut f)?),
            api_id::ZB_SENSOR_READ => Self::SensorRead(SensorRead {
                source64: f.addr64()?,
                source16: f.addr16()?,
                options: f.u8()?,
                sensors: f.u8()?,
                analog: [f.u16()?, f.u16()?, f.u16()?, f.u16()?],
                temperature: f.u16()?,
            }),
            api_id::NODE_IDENTIFICATION => Self::NodeIdentification(NodeIdentification {
                sender64: f.addr64()?,
                sender16: f.addr16()?,
                options: f.u8()?,
                remote16: f.addr16()?,
                remote64: f.addr64()?,
                node_id: f.c_string()?,
                parent16: f.addr16()?,
                device_type: f.u8()?.into(),
                source_event: f.u8()?,
                profile_id: f.u16()?,
                manufacturer_id: f.u16()?,
            }),
            _ => Self::Unknown {
                api_id: tag,
                data: Bytes::copy_from_slice(body),
            },
        };
        Ok(response)
    }

    /// The API type tag this response was decoded from.
    pub fn api_id(&self) -> u8 {
        match self {
            Self::AtCommand(_) => api_id::AT_COMMAND_RESPONSE,
            Self::RemoteAtCommand(_) => api_id::REMOTE_AT_RESPONSE,
            Self::ModemStatus(_) => api_id::MODEM_STATUS,
            Self::Rx64(_) => api_id::RX_64,
            Self::Rx16(_) => api_id::RX_16,
            Self::Rx64IoSample(_) => api_id::RX_64_IO,
            Self::Rx16IoSample(_) => api_id::RX_16_IO,
            Self::TxStatus(_) => api_id::TX_STATUS,
            Self::ZbTxStatus(_) => api_id::ZB_TX_STATUS,
            Self::ZbRxPacket(_) => api_id::ZB_RX_PACKET,
            Self::ZbExplicitRx(_) => api_id::ZB_EXPLICIT_RX,
            Self::ZbIoSample(_) => api_id::ZB_IO_SAMPLE,
            Self::SensorRead(_) => api_id::ZB_SENSOR_READ,
            Self::NodeIdentification(_) => api_id::NODE_IDENTIFICATION,
            Self::Unknown { api_id, .. } => *api_id,
        }
    }

    /// Correlation id for variants that answer a request.
    pub fn frame_id(&self) -> Option<u8> {
        match self {
            Self::AtCommand(r) => Some(r.frame_id),
            Self::RemoteAtCommand(r) => Some(r.frame_id),
            Self::TxStatus(r) => Some(r.frame_id),
            Self::ZbTxStatus(r) => Some(r.frame_id),
            _ => None,
        }
    }

    /// Short name for logs and output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unknown { .. } => "unknown",
            other => api_id::name(other.api_id()).unwrap_or("unknown"),
        }
    }
}

fn decode_io_sample(f: &mut Fields<'_>) -> Result<ZbIoSample> {
    let source64 = f.addr64()?;
    let source16 = f.addr16()?;
    let options = f.u8()?;
    let sample_sets = f.u8()?;
    let digital_mask = f.u16()?;
    let analog_mask = f.u8()?;

    let digital_samples = if digital_mask != 0 {
        Some(f.u16()?)
    } else {
        None
    };

    let mut analog_samples = Vec::with_capacity(analog_mask.count_ones() as usize);
    for channel in 0..8u8 {
        if analog_mask & (1 << channel) != 0 {
            analog_samples.push(AnalogSample {
                channel,
                value: f.u16()?,
            });
        }
    }

    Ok(ZbIoSample {
        source64,
        source16,
        options,
        sample_sets,
        digital_mask,
        analog_mask,
        digital_samples,
        analog_samples,
    })
}

/// Sequential field reader over a response body.
struct Fields<'a> {
    api_id: u8,
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn new(api_id: u8, buf: &'a [u8]) -> Self {
        Self { api_id, buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.buf.len() - self.pos;
        if available < n {
            return Err(ApiError::Truncated {
                api_id: self.api_id,
                needed: n,
                available,
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn addr16(&mut self) -> Result<Address16> {
        Address16::read(self.take(Address16::SIZE)?)
    }

    fn addr64(&mut self) -> Result<Address64> {
        Address64::read(self.take(Address64::SIZE)?)
    }

    fn command(&mut self) -> Result<AtCommand> {
        let b = self.take(2)?;
        Ok(AtCommand::from_bytes([b[0], b[1]]))
    }

    /// NUL-terminated string; the terminator is consumed.
    fn c_string(&mut self) -> Result<String> {
        let remaining = &self.buf[self.pos..];
        let len = remaining
            .iter()
            .position(|&b| b == 0)
            .ok_or(ApiError::Truncated {
                api_id: self.api_id,
                needed: remaining.len() + 1,
                available: remaining.len(),
            })?;
        let text = String::from_utf8_lossy(&remaining[..len]).into_owned();
        self.pos += len + 1;
        Ok(text)
    }

    fn rx<A>(&mut self, address: fn(&mut Self) -> Result<A>) -> Result<RxPacket<A>> {
        Ok(RxPacket {
            source: address(self)?,
            rssi: self.u8()?,
            options: self.u8()?,
            data: self.rest(),
        })
    }

    fn rest(&mut self) -> Bytes {
        let out = Bytes::copy_from_slice(&self.buf[self.pos..]);
        self.pos = self.buf.len();
        out
    }
}
