use std::time::Duration;

use xbee_frame::{EscapeMode, FrameConfig};
use xbee_transport::{LinkMode, ModeDetectConfig, DEFAULT_LINK_TIMEOUT};

/// Default payload limit in either direction. Covers the largest frame a
/// module emits (an explicit RX indicator carrying 255 bytes of RF data),
/// so a corrupt length field above it is rejected as soon as it is read.
pub const DEFAULT_MAX_PAYLOAD: usize = 300;

/// How synchronous requests share the link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestPolicy {
    /// One request in flight at a time. Concurrent callers queue behind a
    /// lock held for the whole request/response round trip.
    #[default]
    SingleOutstanding,
    /// Up to 255 requests in flight, each correlated by its own frame id.
    Concurrent,
}

/// How the link mode is chosen when the device opens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModeSelection {
    /// Probe with the command-mode escape sequence.
    #[default]
    Auto,
    /// Trust the configured mode without probing.
    Fixed(LinkMode),
}

/// What the reader does when the link fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Stop the reader and fail every pending request.
    #[default]
    Terminate,
    /// Re-open the serial port up to `attempts` times, `delay` apart.
    /// Only devices opened from a `LinkConfig` can reconnect.
    Reopen { attempts: u32, delay: Duration },
}

/// Configuration for an [`XBeeDevice`](crate::XBeeDevice).
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Link mode selection at open.
    pub mode: ModeSelection,
    /// Parameters for `ModeSelection::Auto`.
    pub mode_detect: ModeDetectConfig,
    /// Escaped (`AP=2`) or unescaped (`AP=1`) API framing.
    pub escape: EscapeMode,
    /// Request concurrency policy.
    pub request_policy: RequestPolicy,
    /// Default wait for a response in [`execute`](crate::XBeeDevice::execute).
    pub response_timeout: Duration,
    /// Read timeout of the reader's link handle. Bounds how long shutdown
    /// waits for the reader to notice the stop flag.
    pub poll_interval: Duration,
    /// Write timeout of the writer's link handle.
    pub write_timeout: Duration,
    /// Largest frame payload accepted in either direction.
    pub max_payload_size: usize,
    /// Capacity of the event channel. Events beyond it are dropped.
    pub event_capacity: usize,
    /// Reader behavior on link failure.
    pub reconnect: ReconnectPolicy,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            mode: ModeSelection::Auto,
            mode_detect: ModeDetectConfig::default(),
            escape: EscapeMode::Unescaped,
            request_policy: RequestPolicy::SingleOutstanding,
            response_timeout: Duration::from_secs(5),
            poll_interval: DEFAULT_LINK_TIMEOUT,
            write_timeout: Duration::from_secs(1),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            event_capacity: 256,
            reconnect: ReconnectPolicy::Terminate,
        }
    }
}

impl DeviceConfig {
    /// Frame layer configuration derived from this device configuration.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            escape: self.escape,
            max_payload_size: self.max_payload_size,
            read_timeout: Some(self.poll_interval),
            write_timeout: Some(self.write_timeout),
        }
    }
}
