//! End-to-end engine behavior against a simulated radio on a socket pair.
#![cfg(unix)]

use std::io::Read;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use xbee_api::{Address64, AtCommandStatus, ModemStatus, Request, Response};
use xbee_device::{
    DeviceConfig, DeviceError, DeviceEvent, ModeSelection, RequestPolicy, XBeeDevice,
};
use xbee_frame::{EscapeMode, Frame, FrameConfig, FrameReader, FrameWriter};
use xbee_transport::{LinkMode, XBeeLink};

const RADIO_TIMEOUT: Duration = Duration::from_secs(2);

struct Radio {
    reader: FrameReader<XBeeLink>,
    writer: FrameWriter<XBeeLink>,
}

impl Radio {
    fn new(link: XBeeLink) -> Self {
        let config = FrameConfig {
            read_timeout: Some(RADIO_TIMEOUT),
            ..FrameConfig::default()
        };
        let writer = FrameWriter::with_config_link(
            link.try_clone().expect("radio link should clone"),
            config.clone(),
        )
        .expect("radio writer should configure");
        let reader =
            FrameReader::with_config_link(link, config).expect("radio reader should configure");
        Self { reader, writer }
    }

    fn next_request(&mut self) -> Frame {
        self.reader
            .read_frame()
            .expect("radio should receive a request")
    }

    fn send(&mut self, payload: &[u8]) {
        self.writer.send(payload).expect("radio should send");
    }

    /// Reply OK to a local AT request with `value`.
    fn reply_at(&mut self, request: &Frame, value: &[u8]) {
        let mut payload = vec![0x88, request.payload[1], request.payload[2], request.payload[3]];
        payload.push(0x00);
        payload.extend_from_slice(value);
        self.send(&payload);
    }
}

fn config() -> DeviceConfig {
    DeviceConfig {
        mode: ModeSelection::Fixed(LinkMode::Api),
        poll_interval: Duration::from_millis(10),
        response_timeout: RADIO_TIMEOUT,
        ..DeviceConfig::default()
    }
}

fn start(config: DeviceConfig) -> (XBeeDevice, Radio) {
    let (link, radio) = XBeeLink::pair().expect("socket pair should be created");
    let device = XBeeDevice::from_link(link, config).expect("device should start");
    (device, Radio::new(radio))
}

fn next_event(device: &XBeeDevice) -> DeviceEvent {
    device
        .events()
        .recv_timeout(RADIO_TIMEOUT)
        .expect("an event should arrive")
}

#[test]
fn at_query_round_trip_matches_wire_format() {
    let (link, mut radio) = XBeeLink::pair().expect("socket pair should be created");
    radio
        .set_read_timeout(Some(RADIO_TIMEOUT))
        .expect("timeout should apply");
    let device = XBeeDevice::from_link(link, config()).expect("device should start");

    let responder = thread::spawn(move || {
        let mut wire = [0u8; 8];
        radio.read_exact(&mut wire).expect("request bytes should arrive");
        assert_eq!(wire, [0x7E, 0x00, 0x04, 0x08, 0x01, 0x4E, 0x49, 0x5F]);

        let mut radio = Radio::new(radio);
        radio.send(&[0x88, 0x01, b'N', b'I', 0x00, b'R', b'o', b'u', b't', b'e', b'r']);
    });

    let response = device
        .execute(&Request::at("NI").expect("valid command"))
        .expect("NI should succeed");
    responder.join().expect("radio thread should finish");

    let Response::AtCommand(at) = response else {
        panic!("expected AT response, got {response:?}");
    };
    assert_eq!(at.frame_id, 1);
    assert_eq!(at.command.to_string(), "NI");
    assert_eq!(at.status, AtCommandStatus::Ok);
    assert_eq!(&at.value[..], b"Router");

    let stats = device.stats();
    assert_eq!(stats.frames_sent, 1);
    assert_eq!(stats.responses_matched, 1);
}

#[test]
fn mismatched_reply_goes_to_event_channel() {
    let (device, mut radio) = start(config());

    let responder = thread::spawn(move || {
        let request = radio.next_request();
        radio.send(&[0x88, request.payload[1].wrapping_add(7), b'I', b'D', 0x00]);
        radio.reply_at(&request, &[0x12, 0x34]);
    });

    let response = device
        .execute(&Request::at("ID").expect("valid command"))
        .expect("ID should succeed");
    responder.join().expect("radio thread should finish");
    assert!(matches!(response, Response::AtCommand(ref at) if &at.value[..] == [0x12, 0x34]));

    match next_event(&device) {
        DeviceEvent::Response(Response::AtCommand(at)) => assert_eq!(at.command.to_string(), "ID"),
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn timeout_frees_link_and_late_reply_becomes_event() {
    let (device, mut radio) = start(config());
    let device = Arc::new(device);

    let first = radio_thread_request(&device, Duration::from_millis(100));
    let stale = radio.next_request();
    let err = first.join().expect("caller should finish").unwrap_err();
    assert!(matches!(err, DeviceError::Timeout(_)));

    // A new request proceeds immediately and is not confused by the stale reply.
    let second = radio_thread_request(&device, RADIO_TIMEOUT);
    let fresh = radio.next_request();
    assert_ne!(fresh.payload[1], stale.payload[1]);
    radio.reply_at(&stale, b"old");
    radio.reply_at(&fresh, b"new");

    let response = second
        .join()
        .expect("caller should finish")
        .expect("second request should succeed");
    assert!(matches!(response, Response::AtCommand(ref at) if &at.value[..] == b"new"));

    match next_event(&device) {
        DeviceEvent::Response(late) => assert_eq!(late.frame_id(), Some(stale.payload[1])),
        other => panic!("unexpected event {other:?}"),
    }
    let stats = device.stats();
    assert_eq!(stats.timeouts, 1);
    assert_eq!(stats.late_responses, 1);
}

fn radio_thread_request(
    device: &Arc<XBeeDevice>,
    timeout: Duration,
) -> thread::JoinHandle<xbee_device::Result<Response>> {
    let device = Arc::clone(device);
    thread::spawn(move || {
        device.execute_with_timeout(&Request::at("VR").expect("valid command"), timeout)
    })
}

#[test]
fn modem_status_is_published() {
    let (device, mut radio) = start(config());
    radio.send(&[0x8A, 0x02]);
    assert_eq!(
        next_event(&device),
        DeviceEvent::ModemStatus(ModemStatus::Associated)
    );
}

#[test]
fn received_data_is_published() {
    let (device, mut radio) = start(config());
    let mut payload = vec![0x90];
    payload.extend_from_slice(&[0x00, 0x13, 0xA2, 0x00, 0x40, 0x52, 0x2B, 0xAA]);
    payload.extend_from_slice(&[0x7D, 0x84, 0x01]);
    payload.extend_from_slice(b"temp=21");
    radio.send(&payload);

    match next_event(&device) {
        DeviceEvent::Response(Response::ZbRxPacket(rx)) => {
            assert_eq!(rx.source64, Address64::new(0x0013_A200_4052_2BAA));
            assert_eq!(rx.source16.value(), 0x7D84);
            assert_eq!(&rx.data[..], b"temp=21");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn received_data_shaped_like_a_frame_is_published_intact() {
    let (device, mut radio) = start(config());
    let data = [0x7E, 0x00, 0x00, 0xFF, 0x42, 0x43];
    let mut payload = vec![0x90];
    payload.extend_from_slice(&[0x00, 0x13, 0xA2, 0x00, 0x40, 0x52, 0x2B, 0xAA]);
    payload.extend_from_slice(&[0x7D, 0x84, 0x01]);
    payload.extend_from_slice(&data);
    radio.send(&payload);

    match next_event(&device) {
        DeviceEvent::Response(Response::ZbRxPacket(rx)) => {
            assert_eq!(rx.source64, Address64::new(0x0013_A200_4052_2BAA));
            assert_eq!(&rx.data[..], &data);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(device.stats().link.desyncs, 0);
}

#[test]
fn unknown_frame_type_is_published_raw() {
    let (device, mut radio) = start(config());
    radio.send(&[0xA5, 0x01, 0x02]);
    match next_event(&device) {
        DeviceEvent::Response(Response::Unknown { api_id, data }) => {
            assert_eq!(api_id, 0xA5);
            assert_eq!(&data[..], &[0x01, 0x02]);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn line_noise_is_skipped() {
    let (device, mut radio) = start(config());
    let mut raw = radio.writer.get_ref().try_clone().expect("link should clone");

    let responder = thread::spawn(move || {
        let request = radio.next_request();
        std::io::Write::write_all(&mut raw, &[0x00, 0x55, 0xAA]).expect("noise should send");
        radio.reply_at(&request, b"ok");
    });

    device
        .execute(&Request::at("AI").expect("valid command"))
        .expect("AI should succeed");
    responder.join().expect("radio thread should finish");
    assert!(device.stats().link.discarded_bytes >= 3);
}

#[test]
fn concurrent_policy_correlates_out_of_order_replies() {
    let (device, mut radio) = start(DeviceConfig {
        request_policy: RequestPolicy::Concurrent,
        ..config()
    });
    let device = Arc::new(device);

    let callers: Vec<_> = ["SH", "SL"]
        .into_iter()
        .map(|command| {
            let device = Arc::clone(&device);
            thread::spawn(move || {
                let response = device
                    .execute(&Request::at(command).expect("valid command"))
                    .expect("request should succeed");
                (command, response)
            })
        })
        .collect();

    let a = radio.next_request();
    let b = radio.next_request();
    assert_ne!(a.payload[1], b.payload[1]);
    radio.reply_at(&b, &b.payload[2..4]);
    radio.reply_at(&a, &a.payload[2..4]);

    for caller in callers {
        let (command, response) = caller.join().expect("caller should finish");
        let Response::AtCommand(at) = response else {
            panic!("expected AT response");
        };
        assert_eq!(at.command.to_string(), command);
        assert_eq!(&at.value[..], command.as_bytes());
    }
}

#[test]
fn single_outstanding_policy_reports_busy() {
    let (device, mut radio) = start(config());
    let device = Arc::new(device);

    let caller = radio_thread_request(&device, RADIO_TIMEOUT);
    let request = radio.next_request();

    let err = device
        .try_execute(&Request::at("NI").expect("valid command"))
        .unwrap_err();
    assert!(matches!(err, DeviceError::Busy));

    radio.reply_at(&request, b"1");
    caller
        .join()
        .expect("caller should finish")
        .expect("first request should succeed");
}

#[test]
fn shutdown_fails_pending_request() {
    let (device, mut radio) = start(config());
    let device = Arc::new(device);

    let caller = radio_thread_request(&device, Duration::from_secs(10));
    radio.next_request();
    device.shutdown();

    let err = caller.join().expect("caller should finish").unwrap_err();
    assert!(matches!(err, DeviceError::Closed));
    assert!(!device.is_running());
}

#[test]
fn no_reply_request_uses_frame_id_zero() {
    let (device, mut radio) = start(config());
    device
        .execute_no_reply(&Request::zb_transmit(Address64::BROADCAST, &b"hi"[..]))
        .expect("transmit should be written");

    let frame = radio.next_request();
    assert_eq!(frame.payload[0], 0x10);
    assert_eq!(frame.payload[1], 0x00);
    assert_eq!(&frame.payload[frame.payload.len() - 2..], b"hi");
}

#[test]
fn escaped_mode_stuffs_reserved_bytes() {
    let (link, radio) = XBeeLink::pair().expect("socket pair should be created");
    let device = XBeeDevice::from_link(
        link,
        DeviceConfig {
            escape: EscapeMode::Escaped,
            ..config()
        },
    )
    .expect("device should start");

    let mut raw = radio;
    raw.set_read_timeout(Some(RADIO_TIMEOUT))
        .expect("timeout should apply");
    device
        .execute_no_reply(&Request::at_with_param("ID", vec![0x7Eu8, 0x11]).expect("valid command"))
        .expect("request should be written");

    let mut wire = [0u8; 12];
    raw.read_exact(&mut wire).expect("request bytes should arrive");
    assert_eq!(
        wire,
        [0x7E, 0x00, 0x06, 0x08, 0x00, b'I', b'D', 0x7D, 0x5E, 0x7D, 0x31, 0xDB]
    );
}
