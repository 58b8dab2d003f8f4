//! End-to-end session scenarios against a capturing transport.
//!
//! `TestController` records every buffer the session writes; `drain` pumps
//! write completions back in, one at a time, the way a real transport would.
//! `Remote` plays the peer endpoint: its generator produces inbound frames
//! (with its own deflate context) and its parser decodes our outbound bytes.

use crate::error::SessionError;
use bytes::Buf;
use crate::frames::{
    ControlFrame, GoAway, Ping, RstStream, Setting, Settings, SettingsId, SynReply, SynStream,
    Version, FLAG_FIN,
};
use crate::generator::Generator;
use crate::headers::Headers;
use crate::parser::{Parser, ParserEvent};
use crate::session::Session;
use crate::status::{SessionStatus, StreamStatus};
use crate::stream::{CloseState, Stream};
use crate::traits::{Controller, SessionFrameListener, SessionListener, StreamFrameListener};
use crate::types::{DataInfo, ReplyInfo, SessionConfig, SynInfo};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

struct TestController {
    writes: Mutex<VecDeque<Bytes>>,
    closed: AtomicBool,
}

impl TestController {
    fn new() -> Arc<TestController> {
        Arc::new(TestController {
            writes: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
        })
    }

    fn take(&self) -> Option<Bytes> {
        self.writes.lock().pop_front()
    }

    fn pending(&self) -> usize {
        self.writes.lock().len()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Controller for TestController {
    fn write(&self, buffer: Bytes) {
        self.writes.lock().push_back(buffer);
    }

    fn close(&self, _graceful: bool) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Pump completions until the session has nothing left to write.
fn drain(session: &Session, controller: &TestController) -> Vec<Bytes> {
    let mut written = Vec::new();
    while let Some(buffer) = controller.take() {
        written.push(buffer);
        session.write_completed();
    }
    written
}

/// The fake peer endpoint: generates inbound frames and decodes our output.
struct Remote {
    generator: Generator,
    parser: Parser,
}

impl Remote {
    fn new() -> Remote {
        Remote {
            generator: Generator::new(),
            parser: Parser::new(),
        }
    }

    fn encode(&mut self, frame: &ControlFrame) -> Bytes {
        self.generator.control(frame).unwrap()
    }

    fn decode(&mut self, bytes: &Bytes) -> ParserEvent {
        let mut cursor = Cursor::new(bytes.as_ref());
        let event = self
            .parser
            .parse(&mut cursor)
            .unwrap()
            .expect("a complete frame");
        assert!(!cursor.has_remaining(), "unexpected trailing bytes");
        event
    }

    fn decode_control(&mut self, bytes: &Bytes) -> ControlFrame {
        match self.decode(bytes) {
            ParserEvent::Control(frame) => frame,
            other => panic!("expected a control frame, got {other:?}"),
        }
    }
}

fn split_data_frame(bytes: &Bytes) -> (u32, u8, &[u8]) {
    let stream_id =
        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) & 0x7FFF_FFFF;
    (stream_id, bytes[4], &bytes[8..])
}

#[derive(Default)]
struct LifecycleEvents {
    created: AtomicUsize,
    closed: AtomicUsize,
}

impl SessionListener for LifecycleEvents {
    fn on_stream_created(&self, _stream: &Arc<Stream>) {
        self.created.fetch_add(1, Ordering::SeqCst);
    }

    fn on_stream_closed(&self, _stream: &Arc<Stream>) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

type SynBehavior =
    Box<dyn Fn(&Arc<Stream>, &SynStream) -> Option<Arc<dyn StreamFrameListener>> + Send + Sync>;

#[derive(Default)]
struct FrameEvents {
    pings: Mutex<Vec<u32>>,
    rsts: Mutex<Vec<RstStream>>,
    go_aways: AtomicUsize,
    syn_behavior: Option<SynBehavior>,
}

impl SessionFrameListener for FrameEvents {
    fn on_syn(
        &self,
        stream: &Arc<Stream>,
        frame: &SynStream,
    ) -> Option<Arc<dyn StreamFrameListener>> {
        self.syn_behavior
            .as_ref()
            .and_then(|behavior| behavior(stream, frame))
    }

    fn on_rst(&self, frame: &RstStream) {
        self.rsts.lock().push(frame.clone());
    }

    fn on_ping(&self, frame: &Ping) {
        self.pings.lock().push(frame.ping_id);
    }

    fn on_go_away(&self, _frame: &GoAway) {
        self.go_aways.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct StreamEvents {
    replies: Mutex<Vec<SynReply>>,
    data: Mutex<Vec<(Vec<u8>, bool)>>,
}

impl StreamFrameListener for StreamEvents {
    fn on_reply(&self, _stream: &Arc<Stream>, frame: &SynReply) {
        self.replies.lock().push(frame.clone());
    }

    fn on_data(&self, _stream: &Arc<Stream>, data: &DataInfo) {
        self.data
            .lock()
            .push((data.bytes().to_vec(), data.is_close()));
    }
}

fn client_session(
    controller: Arc<TestController>,
    frame_listener: Option<Arc<dyn SessionFrameListener>>,
) -> Arc<Session> {
    Session::new(SessionConfig::client(), controller, frame_listener)
}

fn get_headers() -> Headers {
    let mut headers = Headers::new();
    headers.append(":method", "GET");
    headers
}

#[test]
fn client_opens_one_stream() {
    let controller = TestController::new();
    let session = client_session(controller.clone(), None);

    let stream = session
        .syn(Version::V2, SynInfo::new(get_headers(), false), None)
        .unwrap();

    let written = drain(&session, &controller);
    assert_eq!(written.len(), 1);
    match Remote::new().decode_control(&written[0]) {
        ControlFrame::SynStream(frame) => {
            assert_eq!(frame.version, Version::V2);
            assert_eq!(frame.stream_id, 1);
            assert_eq!(frame.flags, 0);
            assert_eq!(frame.headers.get(":method").unwrap(), ["GET"]);
        }
        other => panic!("expected SYN_STREAM, got {other:?}"),
    }

    let streams = session.streams();
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].id(), 1);
    assert_eq!(streams[0].close_state(), CloseState::Open);
    assert_eq!(stream.id(), 1);
}

#[test]
fn syn_stream_split_at_every_byte_boundary() {
    let mut remote = Remote::new();
    let mut headers = Headers::new();
    headers.append(":method", "GET");
    headers.append(":path", "/split");
    let bytes = remote.encode(&ControlFrame::SynStream(SynStream {
        version: Version::V3,
        stream_id: 2,
        associated_stream_id: 0,
        priority: 1,
        slot: 0,
        flags: 0,
        headers,
    }));

    let expected = match Remote::new().decode(&bytes) {
        ParserEvent::Control(frame) => frame,
        other => panic!("unexpected {other:?}"),
    };

    for split in 1..bytes.len() {
        let mut parser = Parser::new();
        let mut first = Cursor::new(&bytes[..split]);
        assert!(
            parser.parse(&mut first).unwrap().is_none(),
            "frame emitted early at split {split}"
        );
        let mut second = Cursor::new(&bytes[split..]);
        let event = parser
            .parse(&mut second)
            .unwrap()
            .unwrap_or_else(|| panic!("no frame after full delivery at split {split}"));
        match event {
            ParserEvent::Control(frame) => assert_eq!(frame, expected),
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[test]
fn duplicate_inbound_stream_id_resets_existing_stream() {
    let controller = TestController::new();
    let lifecycle = Arc::new(LifecycleEvents::default());
    let session = client_session(controller.clone(), Some(Arc::new(FrameEvents::default())));
    session.add_listener(lifecycle.clone());

    let mut remote = Remote::new();
    let syn = |remote: &mut Remote| {
        remote.encode(&ControlFrame::SynStream(SynStream {
            version: Version::V2,
            stream_id: 2,
            associated_stream_id: 0,
            priority: 0,
            slot: 0,
            flags: 0,
            headers: get_headers(),
        }))
    };

    session.process(&syn(&mut remote));
    assert_eq!(lifecycle.created.load(Ordering::SeqCst), 1);
    assert!(drain(&session, &controller).is_empty());

    session.process(&syn(&mut remote));
    assert_eq!(lifecycle.created.load(Ordering::SeqCst), 1);
    let written = drain(&session, &controller);
    assert_eq!(written.len(), 1);
    match remote.decode_control(&written[0]) {
        ControlFrame::RstStream(frame) => {
            assert_eq!(frame.stream_id, 2);
            assert_eq!(frame.status, StreamStatus::ProtocolError);
            assert_eq!(frame.version, Version::V2);
        }
        other => panic!("expected RST_STREAM, got {other:?}"),
    }
}

#[test]
fn data_on_unknown_stream_is_reset_with_invalid_stream() {
    let controller = TestController::new();
    let session = client_session(controller.clone(), None);

    let data = Generator::data_frame(99, false, &[0x01, 0x02, 0x03, 0x04, 0x05]);
    session.process(&data);

    let written = drain(&session, &controller);
    assert_eq!(written.len(), 1);
    match Remote::new().decode_control(&written[0]) {
        ControlFrame::RstStream(frame) => {
            assert_eq!(frame.stream_id, 99);
            assert_eq!(frame.status, StreamStatus::InvalidStream);
            // No version is discoverable without a known stream; the
            // session's configured default applies.
            assert_eq!(frame.version, Version::V2);
        }
        other => panic!("expected RST_STREAM, got {other:?}"),
    }
}

#[test]
fn flow_control_stall_and_resume() {
    let controller = TestController::new();
    let mut config = SessionConfig::client();
    config.initial_window_size = 10;
    let session = Session::new(config, controller.clone(), None);

    let stream = session
        .syn(Version::V3, SynInfo::new(get_headers(), false), None)
        .unwrap();
    let _syn = drain(&session, &controller);

    stream
        .data(DataInfo::new(Bytes::from(vec![0xAB; 30]), true))
        .unwrap();

    let written = drain(&session, &controller);
    assert_eq!(written.len(), 1, "only the window's worth may be emitted");
    let (stream_id, flags, payload) = split_data_frame(&written[0]);
    assert_eq!(stream_id, 1);
    assert_eq!(flags, 0, "FIN must wait for the final chunk");
    assert_eq!(payload.len(), 10);
    assert_eq!(stream.window(), 0);

    // Nothing more can flow until the peer grants window.
    assert!(drain(&session, &controller).is_empty());

    let mut remote = Remote::new();
    let update = remote.encode(&ControlFrame::WindowUpdate(crate::frames::WindowUpdate {
        version: Version::V3,
        stream_id: 1,
        delta: 20,
    }));
    session.process(&update);

    let written = drain(&session, &controller);
    assert_eq!(written.len(), 1);
    let (stream_id, flags, payload) = split_data_frame(&written[0]);
    assert_eq!(stream_id, 1);
    assert_eq!(payload.len(), 20);
    assert_eq!(flags, FLAG_FIN, "the closing chunk carries FIN");
    assert_eq!(stream.close_state(), CloseState::HalfClosedLocal);
}

#[test]
fn ping_echo_versus_reply() {
    let controller = TestController::new();
    let frame_events = Arc::new(FrameEvents::default());
    let session = client_session(controller.clone(), Some(frame_events.clone()));

    let mut remote = Remote::new();
    // Peer parity: echoed back verbatim.
    let ping = remote.encode(&ControlFrame::Ping(Ping {
        version: Version::V3,
        ping_id: 2,
    }));
    session.process(&ping);
    let written = drain(&session, &controller);
    assert_eq!(written.len(), 1);
    match remote.decode_control(&written[0]) {
        ControlFrame::Ping(frame) => assert_eq!(frame.ping_id, 2),
        other => panic!("expected PING, got {other:?}"),
    }
    assert!(frame_events.pings.lock().is_empty());

    // Local parity: delivered to the listener, nothing written.
    let ping = remote.encode(&ControlFrame::Ping(Ping {
        version: Version::V3,
        ping_id: 3,
    }));
    session.process(&ping);
    assert!(drain(&session, &controller).is_empty());
    assert_eq!(*frame_events.pings.lock(), vec![3]);
}

#[test]
fn go_away_is_suppressed_after_peer_go_away() {
    let controller = TestController::new();
    let frame_events = Arc::new(FrameEvents::default());
    let session = client_session(controller.clone(), Some(frame_events.clone()));

    let mut remote = Remote::new();
    let go_away = remote.encode(&ControlFrame::GoAway(GoAway {
        version: Version::V3,
        last_stream_id: 0,
        status: SessionStatus::Ok,
    }));
    session.process(&go_away);
    assert_eq!(frame_events.go_aways.load(Ordering::SeqCst), 1);

    session.go_away(Version::V3).unwrap();
    assert!(drain(&session, &controller).is_empty());
    assert!(session.is_closed());
}

#[test]
fn go_away_announces_last_peer_stream_and_closes_transport() {
    let controller = TestController::new();
    let session = client_session(controller.clone(), Some(Arc::new(FrameEvents::default())));

    let mut remote = Remote::new();
    // Peer opens stream 2 and finishes it with an empty closing data frame.
    let syn = remote.encode(&ControlFrame::SynStream(SynStream {
        version: Version::V3,
        stream_id: 2,
        associated_stream_id: 0,
        priority: 0,
        slot: 0,
        flags: FLAG_FIN,
        headers: get_headers(),
    }));
    session.process(&syn);
    let stream = session.stream(2).unwrap();
    stream
        .reply(ReplyInfo::new(get_headers(), true))
        .unwrap();
    let _reply = drain(&session, &controller);
    assert!(session.stream(2).is_none());

    session.go_away(Version::V3).unwrap();
    let written = drain(&session, &controller);
    assert_eq!(written.len(), 1);
    match remote.decode_control(&written[0]) {
        ControlFrame::GoAway(frame) => {
            assert_eq!(frame.last_stream_id, 2);
            assert_eq!(frame.status, SessionStatus::Ok);
        }
        other => panic!("expected GO_AWAY, got {other:?}"),
    }
    assert!(controller.is_closed());
}

#[test]
fn locally_allocated_ids_are_odd_and_strictly_increasing() {
    let controller = TestController::new();
    let session = client_session(controller.clone(), None);

    for _ in 0..3 {
        session
            .syn(Version::V3, SynInfo::new(get_headers(), false), None)
            .unwrap();
    }
    let written = drain(&session, &controller);
    assert_eq!(written.len(), 3);

    let mut remote = Remote::new();
    let mut previous = 0;
    for buffer in &written {
        match remote.decode_control(buffer) {
            ControlFrame::SynStream(frame) => {
                assert_eq!(frame.stream_id % 2, 1);
                assert!(frame.stream_id > previous);
                previous = frame.stream_id;
            }
            other => panic!("expected SYN_STREAM, got {other:?}"),
        }
    }
    assert_eq!(previous, 5);
}

#[test]
fn concurrent_syns_hit_the_wire_in_id_order() {
    let controller = TestController::new();
    let session = client_session(controller.clone(), None);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let session = &session;
            scope.spawn(move || {
                for _ in 0..8 {
                    session
                        .syn(Version::V3, SynInfo::new(get_headers(), false), None)
                        .unwrap();
                }
            });
        }
    });

    let written = drain(&session, &controller);
    assert_eq!(written.len(), 32);
    let mut remote = Remote::new();
    let mut previous = 0;
    for buffer in &written {
        match remote.decode_control(buffer) {
            ControlFrame::SynStream(frame) => {
                assert!(
                    frame.stream_id > previous,
                    "id {} emitted after {previous}",
                    frame.stream_id
                );
                previous = frame.stream_id;
            }
            other => panic!("expected SYN_STREAM, got {other:?}"),
        }
    }
}

#[test]
fn at_most_one_write_in_flight() {
    let controller = TestController::new();
    let session = client_session(controller.clone(), None);

    session.ping(Version::V3).unwrap();
    session.ping(Version::V3).unwrap();
    // Both frames are queued but only the first was submitted.
    assert_eq!(controller.pending(), 1);

    controller.take().unwrap();
    session.write_completed();
    assert_eq!(controller.pending(), 1);
}

#[test]
fn ping_ids_share_the_local_parity() {
    let controller = TestController::new();
    let session = client_session(controller.clone(), None);
    assert_eq!(session.ping(Version::V3).unwrap().ping_id, 1);
    assert_eq!(session.ping(Version::V3).unwrap().ping_id, 3);
}

#[test]
fn inbound_settings_adjust_live_stream_windows() {
    let controller = TestController::new();
    let session = client_session(controller.clone(), None);
    let stream = session
        .syn(Version::V3, SynInfo::new(get_headers(), false), None)
        .unwrap();
    assert_eq!(stream.window(), 65_536);

    let mut remote = Remote::new();
    let settings = remote.encode(&ControlFrame::Settings(Settings {
        version: Version::V3,
        flags: 0,
        settings: vec![Setting::new(SettingsId::InitialWindowSize, 100)],
    }));
    session.process(&settings);
    assert_eq!(stream.window(), 100);
}

#[test]
fn reply_and_fin_from_the_syn_listener_closes_immediately() {
    let controller = TestController::new();
    let lifecycle = Arc::new(LifecycleEvents::default());
    let frame_events = Arc::new(FrameEvents {
        syn_behavior: Some(Box::new(|stream, _frame| {
            let mut headers = Headers::new();
            headers.append(":status", "200");
            stream.reply(ReplyInfo::new(headers, true)).unwrap();
            None
        })),
        ..FrameEvents::default()
    });
    let session = client_session(controller.clone(), Some(frame_events));
    session.add_listener(lifecycle.clone());

    let mut remote = Remote::new();
    let syn = remote.encode(&ControlFrame::SynStream(SynStream {
        version: Version::V3,
        stream_id: 2,
        associated_stream_id: 0,
        priority: 0,
        slot: 0,
        flags: FLAG_FIN,
        headers: get_headers(),
    }));
    session.process(&syn);

    // Reply+FIN against the already half-closed-remote stream: gone at once.
    assert!(session.streams().is_empty());
    assert_eq!(lifecycle.created.load(Ordering::SeqCst), 1);
    assert_eq!(lifecycle.closed.load(Ordering::SeqCst), 1);

    let written = drain(&session, &controller);
    assert_eq!(written.len(), 1);
    match remote.decode_control(&written[0]) {
        ControlFrame::SynReply(frame) => {
            assert_eq!(frame.stream_id, 2);
            assert!(frame.is_fin());
        }
        other => panic!("expected SYN_REPLY, got {other:?}"),
    }
}

#[test]
fn data_after_remote_fin_is_a_protocol_error() {
    let controller = TestController::new();
    let session = client_session(controller.clone(), Some(Arc::new(FrameEvents::default())));

    let mut remote = Remote::new();
    let syn = remote.encode(&ControlFrame::SynStream(SynStream {
        version: Version::V3,
        stream_id: 2,
        associated_stream_id: 0,
        priority: 0,
        slot: 0,
        flags: FLAG_FIN,
        headers: get_headers(),
    }));
    session.process(&syn);
    assert!(drain(&session, &controller).is_empty());

    session.process(&Generator::data_frame(2, false, b"late"));
    let written = drain(&session, &controller);
    assert_eq!(written.len(), 1);
    match remote.decode_control(&written[0]) {
        ControlFrame::RstStream(frame) => {
            assert_eq!(frame.stream_id, 2);
            assert_eq!(frame.status, StreamStatus::ProtocolError);
        }
        other => panic!("expected RST_STREAM, got {other:?}"),
    }
    assert!(session.stream(2).is_none());
}

#[test]
fn inbound_rst_removes_the_stream() {
    let controller = TestController::new();
    let lifecycle = Arc::new(LifecycleEvents::default());
    let frame_events = Arc::new(FrameEvents::default());
    let session = client_session(controller.clone(), Some(frame_events.clone()));
    let stream_events = Arc::new(StreamEvents::default());

    let stream = session
        .syn(
            Version::V3,
            SynInfo::new(get_headers(), false),
            Some(stream_events.clone()),
        )
        .unwrap();
    session.add_listener(lifecycle.clone());
    let _syn = drain(&session, &controller);

    let mut remote = Remote::new();
    let rst = remote.encode(&ControlFrame::RstStream(RstStream {
        version: Version::V3,
        stream_id: 1,
        status: StreamStatus::CancelStream,
    }));
    session.process(&rst);

    assert!(stream.is_closed());
    assert!(session.streams().is_empty());
    assert_eq!(lifecycle.closed.load(Ordering::SeqCst), 1);
    assert_eq!(frame_events.rsts.lock().len(), 1);
    assert_eq!(frame_events.rsts.lock()[0].status, StreamStatus::CancelStream);
}

#[test]
fn reply_with_fin_closes_a_syn_fin_stream() {
    let controller = TestController::new();
    let frame_events = Arc::new(FrameEvents::default());
    let session = client_session(controller.clone(), Some(frame_events));
    let stream_events = Arc::new(StreamEvents::default());

    let stream = session
        .syn(
            Version::V3,
            SynInfo::new(get_headers(), true),
            Some(stream_events.clone()),
        )
        .unwrap();
    assert_eq!(stream.close_state(), CloseState::HalfClosedLocal);
    let _syn = drain(&session, &controller);

    let mut remote = Remote::new();
    let mut headers = Headers::new();
    headers.append(":status", "200");
    let reply = remote.encode(&ControlFrame::SynReply(SynReply {
        version: Version::V3,
        stream_id: 1,
        flags: FLAG_FIN,
        headers,
    }));
    session.process(&reply);

    assert!(stream.is_closed());
    assert!(session.streams().is_empty());
    let replies = stream_events.replies.lock();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].headers.value(":status"), Some("200"));
}

#[test]
fn duplicate_syn_reply_resets_the_stream() {
    let controller = TestController::new();
    let session = client_session(controller.clone(), None);
    let stream = session
        .syn(Version::V3, SynInfo::new(get_headers(), false), None)
        .unwrap();
    let _syn = drain(&session, &controller);

    let mut remote = Remote::new();
    let reply = |remote: &mut Remote| {
        remote.encode(&ControlFrame::SynReply(SynReply {
            version: Version::V3,
            stream_id: 1,
            flags: 0,
            headers: get_headers(),
        }))
    };
    session.process(&reply(&mut remote));
    assert!(drain(&session, &controller).is_empty());
    assert!(!stream.is_closed());

    session.process(&reply(&mut remote));
    let written = drain(&session, &controller);
    assert_eq!(written.len(), 1);
    match remote.decode_control(&written[0]) {
        ControlFrame::RstStream(frame) => {
            assert_eq!(frame.stream_id, 1);
            assert_eq!(frame.status, StreamStatus::ProtocolError);
        }
        other => panic!("expected RST_STREAM, got {other:?}"),
    }
    assert!(stream.is_closed());
}

#[test]
fn inbound_data_reaches_the_stream_listener() {
    let controller = TestController::new();
    let session = client_session(controller.clone(), None);
    let stream_events = Arc::new(StreamEvents::default());
    let stream = session
        .syn(
            Version::V3,
            SynInfo::new(get_headers(), true),
            Some(stream_events.clone()),
        )
        .unwrap();
    let _syn = drain(&session, &controller);

    let mut remote = Remote::new();
    let reply = remote.encode(&ControlFrame::SynReply(SynReply {
        version: Version::V3,
        stream_id: 1,
        flags: 0,
        headers: get_headers(),
    }));
    session.process(&reply);
    session.process(&Generator::data_frame(1, false, b"first"));
    session.process(&Generator::data_frame(1, true, b"second"));

    let data = stream_events.data.lock();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0], (b"first".to_vec(), false));
    assert_eq!(data[1], (b"second".to_vec(), true));
    drop(data);
    assert!(stream.is_closed());
    assert!(session.streams().is_empty());
}

#[test]
fn unidirectional_syn_is_rejected() {
    let controller = TestController::new();
    let session = client_session(controller.clone(), None);
    let info = SynInfo {
        unidirectional: true,
        ..SynInfo::new(get_headers(), false)
    };
    let error = session.syn(Version::V3, info, None).unwrap_err();
    assert!(matches!(error, SessionError { .. }));
    assert!(session.streams().is_empty());
    assert!(drain(&session, &controller).is_empty());
}

#[test]
fn syn_after_close_fails_and_registers_nothing() {
    let controller = TestController::new();
    let session = client_session(controller.clone(), None);
    session.go_away(Version::V3).unwrap();
    let _go_away = drain(&session, &controller);

    assert!(session
        .syn(Version::V3, SynInfo::new(get_headers(), false), None)
        .is_err());
    assert!(session.streams().is_empty());
    assert!(drain(&session, &controller).is_empty());
}

#[test]
fn corrupt_framing_emits_go_away_and_closes() {
    let controller = TestController::new();
    let session = client_session(controller.clone(), None);

    // Version 4 does not exist: unrecoverable framing.
    let bogus = [0x80, 0x04, 0x00, 0x06, 0x00, 0x00, 0x00, 0x04, 0, 0, 0, 1];
    session.process(&bogus);

    let written = drain(&session, &controller);
    assert_eq!(written.len(), 1);
    match Remote::new().decode_control(&written[0]) {
        ControlFrame::GoAway(frame) => {
            assert_eq!(frame.version, Version::V2);
            assert_eq!(frame.last_stream_id, 0);
        }
        other => panic!("expected GO_AWAY, got {other:?}"),
    }
    assert!(controller.is_closed());
    assert!(session.is_closed());
}

#[test]
fn panicking_listener_does_not_abort_the_session() {
    struct PanickingListener;

    impl SessionListener for PanickingListener {
        fn on_stream_created(&self, _stream: &Arc<Stream>) {
            panic!("listener bug");
        }
    }

    let controller = TestController::new();
    let session = client_session(controller.clone(), None);
    session.add_listener(Arc::new(PanickingListener));

    let stream = session
        .syn(Version::V3, SynInfo::new(get_headers(), false), None)
        .unwrap();
    assert_eq!(stream.id(), 1);
    assert_eq!(drain(&session, &controller).len(), 1);
}

#[test]
fn v2_streams_are_not_flow_controlled() {
    let controller = TestController::new();
    let mut config = SessionConfig::client();
    config.initial_window_size = 10;
    let session = Session::new(config, controller.clone(), None);

    let stream = session
        .syn(Version::V2, SynInfo::new(get_headers(), false), None)
        .unwrap();
    let _syn = drain(&session, &controller);

    stream
        .data(DataInfo::new(Bytes::from(vec![0x55; 30]), true))
        .unwrap();
    let written = drain(&session, &controller);
    assert_eq!(written.len(), 1, "v2 data is emitted in one frame");
    let (_, flags, payload) = split_data_frame(&written[0]);
    assert_eq!(payload.len(), 30);
    assert_eq!(flags, FLAG_FIN);
}
