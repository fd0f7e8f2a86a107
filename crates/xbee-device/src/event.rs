use xbee_api::{ModemStatus, Response};

/// Traffic not claimed by a synchronous request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Unsolicited frame, or a reply nobody is waiting for (including a
    /// late reply to a request that already timed out).
    Response(Response),
    /// The module reported a link-level status change.
    ModemStatus(ModemStatus),
    /// The link failed and was re-opened.
    Reconnected,
    /// The reader has exited; no further events will arrive.
    ReaderStopped { reason: String },
}
