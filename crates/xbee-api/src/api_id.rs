//! API type tags: the first payload byte of every frame.

// Requests (host -> module)
pub const TX_REQUEST_64: u8 = 0x00;
pub const TX_REQUEST_16: u8 = 0x01;
pub const AT_COMMAND: u8 = 0x08;
pub const AT_COMMAND_QUEUE: u8 = 0x09;
pub const ZB_TX_REQUEST: u8 = 0x10;
pub const ZB_EXPLICIT_TX_REQUEST: u8 = 0x11;
pub const REMOTE_AT_REQUEST: u8 = 0x17;

// Responses and indicators (module -> host)
pub const RX_64: u8 = 0x80;
pub const RX_16: u8 = 0x81;
pub const RX_64_IO: u8 = 0x82;
pub const RX_16_IO: u8 = 0x83;
pub const AT_COMMAND_RESPONSE: u8 = 0x88;
pub const TX_STATUS: u8 = 0x89;
pub const MODEM_STATUS: u8 = 0x8A;
pub const ZB_TX_STATUS: u8 = 0x8B;
pub const ZB_RX_PACKET: u8 = 0x90;
pub const ZB_EXPLICIT_RX: u8 = 0x91;
pub const ZB_IO_SAMPLE: u8 = 0x92;
pub const ZB_SENSOR_READ: u8 = 0x94;
pub const NODE_IDENTIFICATION: u8 = 0x95;
pub const REMOTE_AT_RESPONSE: u8 = 0x97;

/// Human-readable name of a tag, if it is one this crate knows.
pub fn name(api_id: u8) -> Option<&'static str> {
    let name = match api_id {
        TX_REQUEST_64 => "tx-request-64",
        TX_REQUEST_16 => "tx-request-16",
        AT_COMMAND => "at-command",
        AT_COMMAND_QUEUE => "at-command-queue",
        ZB_TX_REQUEST => "zb-tx-request",
        ZB_EXPLICIT_TX_REQUEST => "zb-explicit-tx-request",
        REMOTE_AT_REQUEST => "remote-at-request",
        RX_64 => "rx-64",
        RX_16 => "rx-16",
        RX_64_IO => "rx-64-io",
        RX_16_IO => "rx-16-io",
        AT_COMMAND_RESPONSE => "at-command-response",
        TX_STATUS => "tx-status",
        MODEM_STATUS => "modem-status",
        ZB_TX_STATUS => "zb-tx-status",
        ZB_RX_PACKET => "zb-rx-packet",
        ZB_EXPLICIT_RX => "zb-explicit-rx",
        ZB_IO_SAMPLE => "zb-io-sample",
        ZB_SENSOR_READ => "zb-sensor-read",
        NODE_IDENTIFICATION => "node-identification",
        REMOTE_AT_RESPONSE => "remote-at-response",
        _ => return None,
    };
    Some(name)
}
