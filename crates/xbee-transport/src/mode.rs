//! Link-open mode auto-detection.
//!
//! A module left in transparent (AT) mode answers the `+++` escape sequence
//! with `OK\r` after its guard time. A module in API mode treats the same
//! bytes as line noise outside any frame and stays silent.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Guard time the module needs after `+++` before it answers.
pub const DEFAULT_GUARD_TIME: Duration = Duration::from_millis(1025);

/// Command-mode escape sequence.
pub const COMMAND_SEQUENCE: &[u8] = b"+++";

/// Reply that confirms command mode.
pub const COMMAND_MODE_REPLY: &[u8] = b"OK\r";

/// Operating mode of the module on the other end of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Legacy text mode. The link carries plain AT command text, no frames.
    Transparent,
    /// Framed API mode (escaped or unescaped per frame configuration).
    Api,
}

impl std::fmt::Display for LinkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkMode::Transparent => f.write_str("transparent"),
            LinkMode::Api => f.write_str("api"),
        }
    }
}

/// Configuration for mode auto-detection.
#[derive(Debug, Clone)]
pub struct ModeDetectConfig {
    /// How long to wait for `OK\r` after the escape sequence.
    pub guard_time: Duration,
    /// Bytes sent to request command mode.
    pub command_sequence: Vec<u8>,
}

impl Default for ModeDetectConfig {
    fn default() -> Self {
        Self {
            guard_time: DEFAULT_GUARD_TIME,
            command_sequence: COMMAND_SEQUENCE.to_vec(),
        }
    }
}

/// Probe the module and report which mode it is in.
///
/// The link must have a read timeout shorter than `guard_time` configured,
/// otherwise a silent module blocks the probe past its deadline.
pub fn detect_mode<L: Read + Write>(link: &mut L, config: &ModeDetectConfig) -> Result<LinkMode> {
    write_all_retrying(link, &config.command_sequence)?;

    let deadline = Instant::now() + config.guard_time;
    let mut seen = Vec::with_capacity(16);
    let mut chunk = [0u8; 64];

    while Instant::now() < deadline {
        match link.read(&mut chunk) {
            Ok(0) => return Err(TransportError::Closed),
            Ok(n) => {
                seen.extend_from_slice(&chunk[..n]);
                if contains(&seen, COMMAND_MODE_REPLY) {
                    info!("module answered escape sequence; transparent mode");
                    return Ok(LinkMode::Transparent);
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(err) => return Err(TransportError::Io(err)),
        }
    }

    debug!(
        noise = seen.len(),
        "no reply to escape sequence within guard time; api mode"
    );
    Ok(LinkMode::Api)
}

/// Leave command mode entered by [`detect_mode`] (`ATCN`).
pub fn exit_command_mode<W: Write>(link: &mut W) -> Result<()> {
    write_all_retrying(link, b"ATCN\r")
}

fn write_all_retrying<W: Write>(link: &mut W, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match link.write(&bytes[offset..]) {
            Ok(0) => return Err(TransportError::Closed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
    link.flush()?;
    Ok(())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
