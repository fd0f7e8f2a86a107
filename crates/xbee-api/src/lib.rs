//! Typed XBee/ZigBee API messages.
//!
//! Sits on top of the frame layer: a frame payload is a one-byte API type
//! tag followed by type-specific fields. This crate builds request payloads
//! ([`Request::encode`]) and turns received payloads into a closed set of
//! [`Response`] variants ([`Response::decode`]). Unrecognized tags decode to
//! [`Response::Unknown`] instead of failing, so new firmware frame types never
//! break the receive path.

pub mod address;
pub mod api_id;
pub mod error;
pub mod request;
pub mod response;
pub mod status;

pub use address::{Address16, Address64};
pub use error::{ApiError, Result};
pub use request::{AtCommand, Request, REMOTE_APPLY_CHANGES};
pub use response::{
    AnalogSample, AtCommandResponse, NodeIdentification, RemoteAtCommandResponse, Response,
    RxPacket, SensorRead, TxStatus, ZbExplicitRx, ZbIoSample, ZbRxPacket, ZbTxStatus,
};
pub use status::{AtCommandStatus, DeliveryStatus, DeviceType, ModemStatus};
