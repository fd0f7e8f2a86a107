use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, info, trace, warn};
use xbee_api::{ApiError, Request, Response};
use xbee_frame::{Frame, FrameError, FrameReader, FrameWriter, ReassemblerStats};
use xbee_transport::{detect_mode, exit_command_mode, LinkConfig, LinkMode, XBeeLink};

use crate::config::{DeviceConfig, ModeSelection, ReconnectPolicy, RequestPolicy};
use crate::coordinator::{Coordinator, Dispatch};
use crate::error::{DeviceError, Result};
use crate::event::DeviceEvent;

/// Counters describing engine traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    /// Replies handed to a waiting request.
    pub responses_matched: u64,
    /// Events placed on the event channel.
    pub events_emitted: u64,
    /// Events lost because the event channel was full.
    pub events_dropped: u64,
    /// Replies that arrived after their request timed out.
    pub late_responses: u64,
    pub timeouts: u64,
    pub reconnects: u64,
    /// Reassembly counters of the current link.
    pub link: ReassemblerStats,
}

#[derive(Debug, Default)]
struct Counters {
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    responses_matched: AtomicU64,
    events_emitted: AtomicU64,
    events_dropped: AtomicU64,
    late_responses: AtomicU64,
    timeouts: AtomicU64,
    reconnects: AtomicU64,
}

/// State shared between callers and the reader thread.
struct Shared {
    config: DeviceConfig,
    link_config: Option<LinkConfig>,
    coordinator: Coordinator,
    writer: Mutex<FrameWriter<XBeeLink>>,
    events_tx: Sender<DeviceEvent>,
    stop: AtomicBool,
    counters: Counters,
    link_stats: Mutex<ReassemblerStats>,
}

/// A running XBee protocol engine.
///
/// Owns a background reader thread that reassembles and decodes every
/// inbound frame. Replies are matched to waiting [`execute`](Self::execute)
/// calls by frame id; everything else is published on [`events`](Self::events).
///
/// All methods take `&self`, so a device can be shared across threads in
/// an `Arc`. Dropping the device stops the reader cooperatively.
pub struct XBeeDevice {
    shared: Arc<Shared>,
    exchange: Mutex<()>,
    events_rx: Receiver<DeviceEvent>,
    reader: Mutex<Option<JoinHandle<()>>>,
    name: String,
}

impl XBeeDevice {
    /// Open the serial port described by `link` and start the engine.
    ///
    /// Unlike [`from_link`](Self::from_link), a device opened this way can
    /// re-open its port under [`ReconnectPolicy::Reopen`].
    pub fn open(link: LinkConfig, config: DeviceConfig) -> Result<Self> {
        let handle = xbee_transport::open(&link)?;
        Self::start(handle, Some(link), config)
    }

    /// Start the engine on an already-open link.
    pub fn from_link(link: XBeeLink, config: DeviceConfig) -> Result<Self> {
        Self::start(link, None, config)
    }

    fn start(
        mut link: XBeeLink,
        link_config: Option<LinkConfig>,
        config: DeviceConfig,
    ) -> Result<Self> {
        let name = link.name();
        resolve_mode(&mut link, &config)?;

        let frame_config = config.frame_config();
        let writer = FrameWriter::with_config_link(link.try_clone()?, frame_config.clone())?;
        let reader = FrameReader::with_config_link(link, frame_config)?;

        let (events_tx, events_rx) = crossbeam_channel::bounded(config.event_capacity.max(1));
        let shared = Arc::new(Shared {
            config,
            link_config,
            coordinator: Coordinator::new(),
            writer: Mutex::new(writer),
            events_tx,
            stop: AtomicBool::new(false),
            counters: Counters::default(),
            link_stats: Mutex::new(ReassemblerStats::default()),
        });

        let reader_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("xbee-reader".to_string())
            .spawn(move || reader_loop(reader_shared, reader))
            .map_err(DeviceError::Spawn)?;

        info!(link = %name, policy = ?shared.config.request_policy, "xbee device started");
        Ok(Self {
            shared,
            exchange: Mutex::new(()),
            events_rx,
            reader: Mutex::new(Some(handle)),
            name,
        })
    }

    /// Send `request` and wait for its reply using the configured timeout.
    pub fn execute(&self, request: &Request) -> Result<Response> {
        self.execute_with_timeout(request, self.shared.config.response_timeout)
    }

    /// Send `request` and wait up to `timeout` for the reply carrying its
    /// frame id.
    ///
    /// Under [`RequestPolicy::SingleOutstanding`] concurrent callers are
    /// serialized for the whole round trip. On timeout the request is
    /// forgotten at once: the device accepts a new request immediately, and
    /// a reply arriving later is published as an event.
    pub fn execute_with_timeout(&self, request: &Request, timeout: Duration) -> Result<Response> {
        let _exchange = match self.shared.config.request_policy {
            RequestPolicy::SingleOutstanding => Some(lock(&self.exchange)),
            RequestPolicy::Concurrent => None,
        };
        self.exchange(request, timeout)
    }

    /// Like [`execute`](Self::execute), but fails with [`DeviceError::Busy`]
    /// instead of waiting when another request holds the link.
    pub fn try_execute(&self, request: &Request) -> Result<Response> {
        let _exchange = match self.shared.config.request_policy {
            RequestPolicy::SingleOutstanding => match self.exchange.try_lock() {
                Ok(guard) => Some(guard),
                Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => return Err(DeviceError::Busy),
            },
            RequestPolicy::Concurrent => None,
        };
        self.exchange(request, self.shared.config.response_timeout)
    }

    /// Send `request` with frame id 0, suppressing any reply, and return
    /// once it is written.
    pub fn execute_no_reply(&self, request: &Request) -> Result<()> {
        self.send_payload(&request.encode(0))
    }

    /// Receiver for unsolicited traffic.
    ///
    /// Every call returns a handle to the same channel; receivers compete
    /// for events rather than each seeing all of them.
    pub fn events(&self) -> Receiver<DeviceEvent> {
        self.events_rx.clone()
    }

    pub fn stats(&self) -> DeviceStats {
        let c = &self.shared.counters;
        DeviceStats {
            frames_sent: c.frames_sent.load(Ordering::Relaxed),
            frames_received: c.frames_received.load(Ordering::Relaxed),
            responses_matched: c.responses_matched.load(Ordering::Relaxed),
            events_emitted: c.events_emitted.load(Ordering::Relaxed),
            events_dropped: c.events_dropped.load(Ordering::Relaxed),
            late_responses: c.late_responses.load(Ordering::Relaxed),
            timeouts: c.timeouts.load(Ordering::Relaxed),
            reconnects: c.reconnects.load(Ordering::Relaxed),
            link: *lock(&self.shared.link_stats),
        }
    }

    /// Name of the underlying link.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True while the reader thread is running.
    pub fn is_running(&self) -> bool {
        lock(&self.reader)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the reader and fail pending requests with [`DeviceError::Closed`].
    ///
    /// The reader notices the stop request within one poll interval.
    /// Calling this more than once is harmless.
    pub fn shutdown(&self) {
        self.shared.stop.store(true, Ordering::Release);
        let handle = lock(&self.reader).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!(link = %self.name, "reader thread panicked");
            }
        }
        self.shared.coordinator.close();
    }

    fn exchange(&self, request: &Request, timeout: Duration) -> Result<Response> {
        if !request.expects_response() {
            return Err(ApiError::NoFrameId(request.api_id()).into());
        }

        let (frame_id, rx) = self.shared.coordinator.register()?;
        if let Err(err) = self.send_payload(&request.encode(frame_id)) {
            self.shared.coordinator.cancel(frame_id);
            return Err(err);
        }
        debug!(frame_id, api_id = request.api_id(), "request sent; awaiting response");

        match rx.recv_timeout(timeout) {
            Ok(response) => Ok(response),
            Err(RecvTimeoutError::Timeout) => {
                if self.shared.coordinator.abandon(frame_id) {
                    self.shared.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                    debug!(frame_id, ?timeout, "request timed out");
                    return Err(DeviceError::Timeout(timeout));
                }
                // Delivered between the timeout and the abandon.
                rx.try_recv().map_err(|_| DeviceError::Closed)
            }
            Err(RecvTimeoutError::Disconnected) => Err(DeviceError::Closed),
        }
    }

    fn send_payload(&self, payload: &[u8]) -> Result<()> {
        if self.shared.coordinator.is_closed() {
            return Err(DeviceError::Closed);
        }
        lock(&self.shared.writer).send(payload)?;
        self.shared
            .counters
            .frames_sent
            .fetch_add(1, Ordering::Relaxed);
        trace!(len = payload.len(), api_id = ?payload.first(), "frame written");
        Ok(())
    }
}

impl Drop for XBeeDevice {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for XBeeDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XBeeDevice")
            .field("name", &self.name)
            .field("policy", &self.shared.config.request_policy)
            .field("pending", &self.shared.coordinator.pending_count())
            .finish()
    }
}

fn resolve_mode(link: &mut XBeeLink, config: &DeviceConfig) -> Result<()> {
    let mode = match config.mode {
        ModeSelection::Fixed(mode) => mode,
        ModeSelection::Auto => {
            link.set_read_timeout(Some(config.poll_interval))?;
            detect_mode(link, &config.mode_detect)?
        }
    };

    match mode {
        LinkMode::Api => {
            if config.mode == ModeSelection::Auto {
                // Probe leftovers must not reach the reassembler.
                link.clear_input()?;
            }
            debug!(escape = ?config.escape, "using API mode");
            Ok(())
        }
        LinkMode::Transparent => {
            if config.mode == ModeSelection::Auto {
                // Leave the command mode the probe entered.
                exit_command_mode(link)?;
            }
            Err(DeviceError::TransparentMode)
        }
    }
}

fn reader_loop(shared: Arc<Shared>, mut reader: FrameReader<XBeeLink>) {
    let reason = loop {
        if shared.stop.load(Ordering::Acquire) {
            break "shutdown requested".to_string();
        }

        let result = reader.read_frame();
        *lock(&shared.link_stats) = reader.stats();

        match result {
            Ok(frame) => shared.handle_frame(frame),
            Err(FrameError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                continue;
            }
            Err(err) => {
                if shared.stop.load(Ordering::Acquire) {
                    break "shutdown requested".to_string();
                }
                warn!(error = %err, "link read failed");
                match shared.reconnect() {
                    Some(link) => {
                        reader.replace_inner(link);
                        continue;
                    }
                    None => break format!("link failed: {err}"),
                }
            }
        }
    };

    shared.coordinator.close();
    if reason != "shutdown requested" {
        warn!(%reason, "reader stopped");
    } else {
        debug!("reader stopped");
    }
    shared.emit(DeviceEvent::ReaderStopped { reason });
}

impl Shared {
    fn handle_frame(&self, frame: Frame) {
        self.counters.frames_received.fetch_add(1, Ordering::Relaxed);
        if frame.payload.is_empty() {
            debug!("dropping frame with empty payload");
            return;
        }

        let response = Response::decode(&frame.payload);
        trace!(api_id = response.api_id(), frame_id = ?response.frame_id(), "frame decoded");

        if let Response::ModemStatus(status) = response {
            info!(%status, "modem status");
            self.emit(DeviceEvent::ModemStatus(status));
            return;
        }

        match self.coordinator.dispatch(response) {
            Dispatch::Delivered => {
                self.counters
                    .responses_matched
                    .fetch_add(1, Ordering::Relaxed);
            }
            Dispatch::Late(response) => {
                self.counters.late_responses.fetch_add(1, Ordering::Relaxed);
                self.emit(DeviceEvent::Response(response));
            }
            Dispatch::Unsolicited(response) => self.emit(DeviceEvent::Response(response)),
        }
    }

    fn emit(&self, event: DeviceEvent) {
        match self.events_tx.try_send(event) {
            Ok(()) => {
                self.counters.events_emitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(event)) => {
                self.counters.events_dropped.fetch_add(1, Ordering::Relaxed);
                debug!(?event, "event channel full; dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Re-open the port per the reconnect policy. Returns the reader's new
    /// handle after swapping the writer's.
    fn reconnect(&self) -> Option<XBeeLink> {
        let ReconnectPolicy::Reopen { attempts, delay } = self.config.reconnect else {
            return None;
        };
        let Some(link_config) = &self.link_config else {
            debug!("link was not opened from a port; cannot reconnect");
            return None;
        };

        for attempt in 1..=attempts {
            if !self.sleep_unless_stopped(delay) {
                return None;
            }
            match self.reopen(link_config) {
                Ok(link) => {
                    self.counters.reconnects.fetch_add(1, Ordering::Relaxed);
                    info!(port = %link_config.port, attempt, "link re-opened");
                    self.emit(DeviceEvent::Reconnected);
                    return Some(link);
                }
                Err(err) => {
                    warn!(port = %link_config.port, attempt, attempts, error = %err, "reconnect failed");
                }
            }
        }
        None
    }

    fn reopen(&self, link_config: &LinkConfig) -> Result<XBeeLink> {
        let mut link = xbee_transport::open(link_config)?;
        let mut writer_link = link.try_clone()?;
        writer_link.set_write_timeout(Some(self.config.write_timeout))?;
        link.set_read_timeout(Some(self.config.poll_interval))?;
        lock(&self.writer).replace_inner(writer_link);
        Ok(link)
    }

    /// Sleep for `total`, waking early on a stop request. Returns false if stopped.
    fn sleep_unless_stopped(&self, total: Duration) -> bool {
        let deadline = Instant::now() + total;
        loop {
            if self.stop.load(Ordering::Acquire) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(self.config.poll_interval));
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use xbee_frame::FrameConfig;

    use super::*;

    fn api_config() -> DeviceConfig {
        DeviceConfig {
            mode: ModeSelection::Fixed(LinkMode::Api),
            poll_interval: Duration::from_millis(10),
            ..DeviceConfig::default()
        }
    }

    #[test]
    fn fixed_transparent_mode_is_rejected() {
        let (link, _radio) = XBeeLink::pair().unwrap();
        let cfg = DeviceConfig {
            mode: ModeSelection::Fixed(LinkMode::Transparent),
            ..api_config()
        };
        assert!(matches!(
            XBeeDevice::from_link(link, cfg),
            Err(DeviceError::TransparentMode)
        ));
    }

    #[test]
    fn auto_detect_silent_module_selects_api() {
        let (link, _radio) = XBeeLink::pair().unwrap();
        let mut cfg = DeviceConfig {
            mode: ModeSelection::Auto,
            ..api_config()
        };
        cfg.mode_detect.guard_time = Duration::from_millis(50);

        let device = XBeeDevice::from_link(link, cfg).unwrap();
        assert!(device.is_running());
    }

    #[test]
    fn request_without_frame_id_slot_cannot_be_executed() {
        let (link, _radio) = XBeeLink::pair().unwrap();
        let device = XBeeDevice::from_link(link, api_config()).unwrap();
        let err = device
            .execute(&Request::raw(0x24, None, vec![0x01u8]))
            .unwrap_err();
        assert!(matches!(err, DeviceError::Api(ApiError::NoFrameId(0x24))));
    }

    #[test]
    fn try_execute_reports_busy_while_exchange_is_held() {
        let (link, _radio) = XBeeLink::pair().unwrap();
        let device = XBeeDevice::from_link(link, api_config()).unwrap();

        let _held = lock(&device.exchange);
        let err = device.try_execute(&Request::at("NI").unwrap()).unwrap_err();
        assert!(matches!(err, DeviceError::Busy));
    }

    #[test]
    fn shutdown_is_idempotent_and_closes() {
        let (link, _radio) = XBeeLink::pair().unwrap();
        let device = XBeeDevice::from_link(link, api_config()).unwrap();
        device.shutdown();
        device.shutdown();
        assert!(!device.is_running());

        let err = device.execute(&Request::at("NI").unwrap()).unwrap_err();
        assert!(matches!(err, DeviceError::Closed));

        let events = device.events();
        assert!(matches!(
            events.try_recv(),
            Ok(DeviceEvent::ReaderStopped { reason }) if reason == "shutdown requested"
        ));
    }

    #[test]
    fn radio_hangup_stops_reader() {
        let (link, radio) = XBeeLink::pair().unwrap();
        let device = XBeeDevice::from_link(link, api_config()).unwrap();
        let events = device.events();
        drop(radio);

        let event = events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(event, DeviceEvent::ReaderStopped { reason } if reason.starts_with("link failed")));
        assert!(matches!(
            device.execute(&Request::at("NI").unwrap()),
            Err(DeviceError::Closed)
        ));
    }

    #[test]
    fn escaped_mode_round_trip() {
        let (link, radio) = XBeeLink::pair().unwrap();
        let cfg = DeviceConfig {
            escape: xbee_frame::EscapeMode::Escaped,
            ..api_config()
        };
        let device = XBeeDevice::from_link(link, cfg).unwrap();

        let frame_cfg = FrameConfig {
            escape: xbee_frame::EscapeMode::Escaped,
            ..FrameConfig::default()
        };
        let mut radio_writer =
            FrameWriter::with_config(radio.try_clone().unwrap(), frame_cfg.clone());
        let mut radio_reader = FrameReader::with_config(radio, frame_cfg);

        // The reply value holds reserved bytes that travel stuffed.
        let responder = thread::spawn(move || {
            let request = radio_reader.read_frame().unwrap();
            assert_eq!(request.payload[0], 0x08);
            let frame_id = request.payload[1];
            radio_writer
                .send(&[0x88, frame_id, b'N', b'I', 0x00, 0x7E, 0x13])
                .unwrap();
        });

        let response = device.execute(&Request::at("NI").unwrap()).unwrap();
        responder.join().unwrap();
        let Response::AtCommand(at) = response else {
            panic!("expected AT response");
        };
        assert_eq!(&at.value[..], &[0x7E, 0x13]);
    }
}
