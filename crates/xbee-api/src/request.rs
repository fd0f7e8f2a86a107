//! Outbound API requests.

use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, Bytes};

use crate::address::{Address16, Address64};
use crate::api_id;
use crate::error::{ApiError, Result};

/// Remote AT option: apply changes on the remote module immediately.
pub const REMOTE_APPLY_CHANGES: u8 = 0x02;

/// A two-character AT command name such as `NI` or `D0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtCommand([u8; 2]);

impl AtCommand {
    pub fn new(name: &str) -> Result<Self> {
        match name.as_bytes() {
            [a, b] if a.is_ascii_graphic() && b.is_ascii_graphic() => {
                Ok(Self([a.to_ascii_uppercase(), b.to_ascii_uppercase()]))
            }
            _ => Err(ApiError::InvalidCommand(name.to_string())),
        }
    }

    /// Wrap two raw bytes as received on the wire.
    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 2] {
        &self.0
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0[0] as char, self.0[1] as char)
    }
}

impl FromStr for AtCommand {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// A logical outbound message.
///
/// Every typed variant carries a frame id slot right after the tag. The
/// slot is filled at encode time: a nonzero id asks the module for a reply,
/// zero suppresses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Local AT command, applied immediately.
    AtCommand {
        command: AtCommand,
        parameter: Bytes,
    },
    /// Local AT command whose value is queued until `AC` or another
    /// immediate command applies it.
    AtCommandQueue {
        command: AtCommand,
        parameter: Bytes,
    },
    /// AT command executed on another node.
    RemoteAtCommand {
        dest64: Address64,
        dest16: Address16,
        options: u8,
        command: AtCommand,
        parameter: Bytes,
    },
    /// 802.15.4 transmit to a 64-bit address.
    Tx64 {
        dest: Address64,
        options: u8,
        data: Bytes,
    },
    /// 802.15.4 transmit to a 16-bit address.
    Tx16 {
        dest: Address16,
        options: u8,
        data: Bytes,
    },
    /// ZigBee transmit request.
    ZbTransmit {
        dest64: Address64,
        dest16: Address16,
        broadcast_radius: u8,
        options: u8,
        data: Bytes,
    },
    /// ZigBee transmit with explicit application-layer addressing.
    ZbExplicit {
        dest64: Address64,
        dest16: Address16,
        source_endpoint: u8,
        dest_endpoint: u8,
        cluster_id: u16,
        profile_id: u16,
        broadcast_radius: u8,
        options: u8,
        data: Bytes,
    },
    /// Any other tag. With `frame_id` set, the byte after the tag is a
    /// frame id slot and its value is replaced at encode time.
    Raw {
        api_id: u8,
        frame_id: Option<u8>,
        data: Bytes,
    },
}

impl Request {
    /// Local AT query or command without a parameter.
    pub fn at(command: &str) -> Result<Self> {
        Self::at_with_param(command, Bytes::new())
    }

    /// Local AT command that sets `parameter`.
    pub fn at_with_param(command: &str, parameter: impl Into<Bytes>) -> Result<Self> {
        Ok(Self::AtCommand {
            command: AtCommand::new(command)?,
            parameter: parameter.into(),
        })
    }

    /// Queued local AT command.
    pub fn at_queue(command: &str, parameter: impl Into<Bytes>) -> Result<Self> {
        Ok(Self::AtCommandQueue {
            command: AtCommand::new(command)?,
            parameter: parameter.into(),
        })
    }

    /// Remote AT command addressed by 64-bit address, changes applied at once.
    pub fn remote_at(
        dest64: Address64,
        command: &str,
        parameter: impl Into<Bytes>,
    ) -> Result<Self> {
        Ok(Self::RemoteAtCommand {
            dest64,
            dest16: Address16::UNKNOWN,
            options: REMOTE_APPLY_CHANGES,
            command: AtCommand::new(command)?,
            parameter: parameter.into(),
        })
    }

    /// ZigBee unicast to a 64-bit address with default radius and options.
    pub fn zb_transmit(dest64: Address64, data: impl Into<Bytes>) -> Self {
        Self::ZbTransmit {
            dest64,
            dest16: Address16::UNKNOWN,
            broadcast_radius: 0,
            options: 0,
            data: data.into(),
        }
    }

    pub fn tx64(dest: Address64, data: impl Into<Bytes>) -> Self {
        Self::Tx64 {
            dest,
            options: 0,
            data: data.into(),
        }
    }

    pub fn tx16(dest: Address16, data: impl Into<Bytes>) -> Self {
        Self::Tx16 {
            dest,
            options: 0,
            data: data.into(),
        }
    }

    pub fn raw(api_id: u8, frame_id: Option<u8>, data: impl Into<Bytes>) -> Self {
        Self::Raw {
            api_id,
            frame_id,
            data: data.into(),
        }
    }

    /// The API type tag this request encodes with.
    pub fn api_id(&self) -> u8 {
        match self {
            Self::AtCommand { .. } => api_id::AT_COMMAND,
            Self::AtCommandQueue { .. } => api_id::AT_COMMAND_QUEUE,
            Self::RemoteAtCommand { .. } => api_id::REMOTE_AT_REQUEST,
            Self::Tx64 { .. } => api_id::TX_REQUEST_64,
            Self::Tx16 { .. } => api_id::TX_REQUEST_16,
            Self::ZbTransmit { .. } => api_id::ZB_TX_REQUEST,
            Self::ZbExplicit { .. } => api_id::ZB_EXPLICIT_TX_REQUEST,
            Self::Raw { api_id, .. } => *api_id,
        }
    }

    /// True when the request has a frame id slot and can therefore be
    /// correlated with a reply.
    pub fn expects_response(&self) -> bool {
        match self {
            Self::Raw { frame_id, .. } => frame_id.is_some(),
            _ => true,
        }
    }

    /// Encode the frame payload (tag first) with `frame_id` in its slot.
    ///
    /// Requests without a slot ignore `frame_id`.
    pub fn encode(&self, frame_id: u8) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.put_u8(self.api_id());

        match self {
            Self::AtCommand { command, parameter }
            | Self::AtCommandQueue { command, parameter } => {
                out.put_u8(frame_id);
                out.put_slice(command.as_bytes());
                out.put_slice(parameter);
            }
            Self::RemoteAtCommand {
                dest64,
                dest16,
                options,
                command,
                parameter,
            } => {
                out.put_u8(frame_id);
                out.put_slice(&dest64.write());
                out.put_slice(&dest16.write());
                out.put_u8(*options);
                out.put_slice(command.as_bytes());
                out.put_slice(parameter);
            }
            Self::Tx64 {
                dest,
                options,
                data,
            } => {
                out.put_u8(frame_id);
                out.put_slice(&dest.write());
                out.put_u8(*options);
                out.put_slice(data);
            }
            Self::Tx16 {
                dest,
                options,
                data,
            } => {
                out.put_u8(frame_id);
                out.put_slice(&dest.write());
                out.put_u8(*options);
                out.put_slice(data);
            }
            Self::ZbTransmit {
                dest64,
                dest16,
                broadcast_radius,
                options,
                data,
            } => {
                out.put_u8(frame_id);
                out.put_slice(&dest64.write());
                out.put_slice(&dest16.write());
                out.put_u8(*broadcast_radius);
                out.put_u8(*options);
                out.put_slice(data);
            }
            Self::ZbExplicit {
                dest64,
                dest16,
                source_endpoint,
                dest_endpoint,
                cluster_id,
                profile_id,
                broadcast_radius,
                options,
                data,
            } => {
                out.put_u8(frame_id);
                out.put_slice(&dest64.write());
                out.put_slice(&dest16.write());
                out.put_u8(*source_endpoint);
                out.put_u8(*dest_endpoint);
                out.put_u16(*cluster_id);
                out.put_u16(*profile_id);
                out.put_u8(*broadcast_radius);
                out.put_u8(*options);
                out.put_slice(data);
            }
            Self::Raw {
                frame_id: slot,
                data,
                ..
            } => {
                if slot.is_some() {
                    out.put_u8(frame_id);
                }
                out.put_slice(data);
            }
        }

        out
    }

    fn encoded_len(&self) -> usize {
        let body = match self {
            Self::AtCommand { parameter, .. } | Self::AtCommandQueue { parameter, .. } => {
                1 + 2 + parameter.len()
            }
            Self::RemoteAtCommand { parameter, .. } => 1 + 8 + 2 + 1 + 2 + parameter.len(),
            Self::Tx64 { data, .. } => 1 + 8 + 1 + data.len(),
            Self::Tx16 { data, .. } => 1 + 2 + 1 + data.len(),
            Self::ZbTransmit { data, .. } => 1 + 8 + 2 + 2 + data.len(),
            Self::ZbExplicit { data, .. } => 1 + 8 + 2 + 2 + 4 + 2 + data.len(),
            Self::Raw { frame_id, data, .. } => usize::from(frame_id.is_some()) + data.len(),
        };
        1 + body
    }
}
