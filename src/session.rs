//! The session multiplexer.
//!
//! A session owns one transport connection (through the [`Controller`]
//! boundary) and multiplexes every logical stream over it. It allocates
//! stream ids in a monotone sequence, serialises outgoing frames through a
//! single FIFO write queue with single-flight draining, dispatches incoming
//! frames to their streams and enforces session lifecycle (GO_AWAY in both
//! directions, close).
//!
//! Two mutexes partition the shared state. The session mutex — materialised
//! as the lock around the [`Generator`] — covers stream-id allocation,
//! header compression, stream registration and enqueueing for `syn`: ids
//! must appear on the wire in allocation order, and the deflate context is
//! stateful, so a block compressed later must never be enqueued earlier.
//! The queue mutex covers the write queue and the `flushing` flag. The
//! stream registry is read-mostly behind an `RwLock`; counters and lifecycle
//! flags are atomics.

use crate::error::{ParseError, SessionError, StreamError};
use crate::frames::{
    ControlFrame, DataFrame, GoAway, HeadersFrame, Ping, RstStream, Settings, SettingsId,
    SynReply, SynStream, Version, WindowUpdate, FLAG_CLEAR_PERSISTED, FLAG_FIN, MAX_FRAME_LENGTH,
};
use crate::generator::Generator;
use crate::parser::{Parser, ParserEvent};
use crate::status::{SessionStatus, StreamStatus};
use crate::stream::Stream;
use crate::traits::{Controller, SessionFrameListener, SessionListener, StreamFrameListener};
use crate::types::{DataInfo, PingInfo, RstInfo, SessionConfig, SettingsInfo, SynInfo};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

/// One unit in the write queue.
///
/// Control units carry a ready buffer; data units stay bound to their stream
/// and produce their buffer lazily at flush time, so the flow-control window
/// in force at that moment is the one observed.
enum FrameBytes {
    Control { buffer: Bytes, close_transport: bool },
    Data { stream: Arc<Stream>, info: DataInfo },
}

struct WriteQueue {
    queue: VecDeque<FrameBytes>,
    /// True while exactly one unit is in flight to the transport.
    flushing: bool,
}

pub struct Session {
    self_ref: Weak<Session>,
    controller: Arc<dyn Controller>,
    frame_listener: Option<Arc<dyn SessionFrameListener>>,
    listeners: RwLock<Vec<Arc<dyn SessionListener>>>,
    streams: RwLock<HashMap<u32, Arc<Stream>>>,
    initial_stream_id: u32,
    default_version: Version,
    stream_ids: AtomicU32,
    ping_ids: AtomicU32,
    /// Highest peer-initiated stream id fully processed; advertised in
    /// GO_AWAY. Maintained with a CAS max so concurrent closes cannot lose
    /// an update.
    last_stream_id: AtomicU32,
    closed: AtomicBool,
    /// Set when the peer's GO_AWAY has been observed; suppresses our own.
    rejected: AtomicBool,
    /// Session default for new streams' send windows (v3).
    window_size: AtomicI32,
    generator: Mutex<Generator>,
    parser: Mutex<Parser>,
    queue: Mutex<WriteQueue>,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        controller: Arc<dyn Controller>,
        frame_listener: Option<Arc<dyn SessionFrameListener>>,
    ) -> Arc<Session> {
        Arc::new_cyclic(|self_ref| Session {
            self_ref: self_ref.clone(),
            controller,
            frame_listener,
            listeners: RwLock::new(Vec::new()),
            streams: RwLock::new(HashMap::new()),
            initial_stream_id: config.initial_stream_id,
            default_version: config.default_version,
            stream_ids: AtomicU32::new(config.initial_stream_id),
            ping_ids: AtomicU32::new(config.initial_stream_id),
            last_stream_id: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            rejected: AtomicBool::new(false),
            window_size: AtomicI32::new(config.initial_window_size),
            generator: Mutex::new(Generator::new()),
            parser: Mutex::new(Parser::new()),
            queue: Mutex::new(WriteQueue {
                queue: VecDeque::new(),
                flushing: false,
            }),
        })
    }

    pub fn add_listener(&self, listener: Arc<dyn SessionListener>) {
        self.listeners.write().push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn SessionListener>) {
        self.listeners
            .write()
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    /// All currently live streams.
    pub fn streams(&self) -> Vec<Arc<Stream>> {
        self.streams.read().values().cloned().collect()
    }

    pub fn stream(&self, stream_id: u32) -> Option<Arc<Stream>> {
        self.streams.read().get(&stream_id).cloned()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Open a new locally initiated stream.
    pub fn syn(
        &self,
        version: Version,
        info: SynInfo,
        listener: Option<Arc<dyn StreamFrameListener>>,
    ) -> Result<Arc<Stream>, SessionError> {
        if info.unidirectional {
            return Err(SessionError::internal(
                "unidirectional streams are not supported",
            ));
        }
        if self.is_closed() {
            return Err(SessionError::internal("session is closed"));
        }
        let stream = {
            // Allocation, compression, registration and enqueue share one
            // critical section: ids must hit the wire in allocation order
            // and the deflate context must see blocks in that same order.
            let mut generator = self.generator.lock();
            let stream_id = self.stream_ids.fetch_add(2, Ordering::SeqCst);
            let frame = ControlFrame::SynStream(SynStream {
                version,
                stream_id,
                associated_stream_id: info.associated_stream_id,
                priority: info.priority,
                slot: 0,
                flags: if info.close { FLAG_FIN } else { 0 },
                headers: info.headers,
            });
            let buffer = generator.control(&frame)?;
            let stream = Arc::new(Stream::new(
                stream_id,
                version,
                info.priority,
                self.window_size.load(Ordering::SeqCst),
                self.self_ref.clone(),
            ));
            if let Some(listener) = listener {
                stream.set_listener(listener);
            }
            self.streams.write().insert(stream_id, stream.clone());
            stream.update_close_state(info.close, true);
            self.enqueue(FrameBytes::Control {
                buffer,
                close_transport: false,
            });
            stream
        };
        self.notify_stream_created(&stream);
        self.flush();
        Ok(stream)
    }

    /// Reset a stream.
    pub fn rst(&self, version: Version, info: RstInfo) -> Result<(), SessionError> {
        if self.is_closed() {
            tracing::debug!(stream = info.stream_id, "RST_STREAM dropped, session closed");
            return Ok(());
        }
        let frame = ControlFrame::RstStream(RstStream {
            version,
            stream_id: info.stream_id,
            status: info.status,
        });
        let buffer = self.generator.lock().control(&frame)?;
        if let Some(stream) = self.stream(info.stream_id) {
            stream.close();
            self.finish_stream(&stream);
        }
        self.enqueue(FrameBytes::Control {
            buffer,
            close_transport: false,
        });
        self.flush();
        Ok(())
    }

    /// Send a SETTINGS frame.
    pub fn settings(&self, version: Version, info: SettingsInfo) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::internal("session is closed"));
        }
        let frame = ControlFrame::Settings(Settings {
            version,
            flags: if info.clear_persisted {
                FLAG_CLEAR_PERSISTED
            } else {
                0
            },
            settings: info.settings,
        });
        let buffer = self.generator.lock().control(&frame)?;
        self.enqueue(FrameBytes::Control {
            buffer,
            close_transport: false,
        });
        self.flush();
        Ok(())
    }

    /// Send a PING and return the id the peer will echo.
    pub fn ping(&self, version: Version) -> Result<PingInfo, SessionError> {
        if self.is_closed() {
            return Err(SessionError::internal("session is closed"));
        }
        let ping_id = self.ping_ids.fetch_add(2, Ordering::SeqCst);
        let frame = ControlFrame::Ping(Ping { version, ping_id });
        let buffer = self.generator.lock().control(&frame)?;
        self.enqueue(FrameBytes::Control {
            buffer,
            close_transport: false,
        });
        self.flush();
        Ok(PingInfo { ping_id })
    }

    /// Begin graceful shutdown. The GO_AWAY's write completion closes the
    /// transport; if the peer already announced its own GO_AWAY, nothing is
    /// emitted.
    pub fn go_away(&self, version: Version) -> Result<(), SessionError> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            if self.rejected.load(Ordering::SeqCst) {
                tracing::debug!("GO_AWAY suppressed, peer already went away");
                return Ok(());
            }
            let frame = ControlFrame::GoAway(GoAway {
                version,
                last_stream_id: self.last_stream_id.load(Ordering::SeqCst),
                status: SessionStatus::Ok,
            });
            let buffer = self.generator.lock().control(&frame)?;
            self.enqueue(FrameBytes::Control {
                buffer,
                close_transport: true,
            });
            self.flush();
        }
        Ok(())
    }

    /// Feed inbound transport bytes through the parser and dispatch every
    /// completed frame. Stream errors reset the offending stream and
    /// processing continues; a session error stops it for good.
    pub fn process(&self, data: &[u8]) {
        let mut cursor = Cursor::new(data);
        loop {
            let parsed = self.parser.lock().parse(&mut cursor);
            match parsed {
                Ok(Some(event)) => self.dispatch(event),
                Ok(None) => return,
                Err(ParseError::Stream(error)) => self.handle_stream_error(error),
                Err(ParseError::Session(error)) => {
                    self.handle_session_error(error);
                    return;
                }
            }
        }
    }

    /// Called by the transport when a previously written buffer has been
    /// handed off; drains the next queued frame.
    pub fn write_completed(&self) {
        self.queue.lock().flushing = false;
        self.flush();
    }

    /// Drain at most one write unit into the transport.
    pub fn flush(&self) {
        loop {
            let unit = {
                let mut queue = self.queue.lock();
                if queue.flushing {
                    return;
                }
                let Some(unit) = queue.queue.pop_front() else {
                    return;
                };
                queue.flushing = true;
                unit
            };
            match unit {
                FrameBytes::Control {
                    buffer,
                    close_transport,
                } => {
                    self.controller.write(buffer);
                    if close_transport {
                        self.controller.close(false);
                    }
                    return;
                }
                FrameBytes::Data { stream, mut info } => {
                    if stream.is_closed() {
                        tracing::debug!(stream = stream.id(), "data unit dropped, stream closed");
                        self.queue.lock().flushing = false;
                        continue;
                    }
                    let flow_controlled = stream.version() == Version::V3;
                    if flow_controlled && stream.window() <= 0 {
                        // Stalled until the peer grants window. Requeued at
                        // the tail: later frames may legitimately overtake.
                        let mut queue = self.queue.lock();
                        queue.queue.push_back(FrameBytes::Data { stream, info });
                        queue.flushing = false;
                        return;
                    }
                    let mut chunk = info.available().min(MAX_FRAME_LENGTH);
                    if flow_controlled {
                        chunk = chunk.min(stream.window() as usize);
                    }
                    let payload = info.take(chunk);
                    let fin = info.is_close() && info.is_consumed();
                    if flow_controlled {
                        stream.update_window(-(payload.len() as i32));
                    }
                    let buffer = Generator::data_frame(stream.id(), fin, &payload);
                    if !info.is_consumed() {
                        self.queue.lock().queue.push_back(FrameBytes::Data {
                            stream: stream.clone(),
                            info,
                        });
                    } else if info.is_close() && stream.update_close_state(true, true) {
                        self.finish_stream(&stream);
                    }
                    self.controller.write(buffer);
                    return;
                }
            }
        }
    }

    fn dispatch(&self, event: ParserEvent) {
        match event {
            ParserEvent::Control(frame) => {
                tracing::debug!(frame_type = ?frame.frame_type(), "control frame received");
                match frame {
                    ControlFrame::SynStream(f) => self.on_syn_stream(f),
                    ControlFrame::SynReply(f) => self.on_syn_reply(f),
                    ControlFrame::RstStream(f) => self.on_rst_stream(f),
                    ControlFrame::Settings(f) => self.on_settings(f),
                    ControlFrame::Noop(_) => {}
                    ControlFrame::Ping(f) => self.on_ping(f),
                    ControlFrame::GoAway(f) => self.on_go_away(f),
                    ControlFrame::Headers(f) => self.on_headers(f),
                    ControlFrame::WindowUpdate(f) => self.on_window_update(f),
                }
            }
            ParserEvent::Data(frame) => self.on_data(frame),
        }
        self.flush();
    }

    fn on_syn_stream(&self, frame: SynStream) {
        if frame.is_unidirectional() {
            tracing::warn!(stream = frame.stream_id, "refusing unidirectional stream");
            self.try_rst(frame.version, frame.stream_id, StreamStatus::RefusedStream);
            return;
        }
        let stream = Arc::new(Stream::new(
            frame.stream_id,
            frame.version,
            frame.priority,
            self.window_size.load(Ordering::SeqCst),
            self.self_ref.clone(),
        ));
        let inserted = {
            let mut streams = self.streams.write();
            match streams.entry(frame.stream_id) {
                Entry::Occupied(_) => false,
                Entry::Vacant(entry) => {
                    entry.insert(stream.clone());
                    true
                }
            }
        };
        if !inserted {
            // The frame reusing the id is the illegitimate one; reset the
            // id it collided with.
            tracing::warn!(stream = frame.stream_id, "duplicate inbound stream id");
            self.try_rst(frame.version, frame.stream_id, StreamStatus::ProtocolError);
            return;
        }
        self.notify_stream_created(&stream);
        stream.update_close_state(frame.is_fin(), false);
        if let Some(listener) = &self.frame_listener {
            let installed = guarded("on_syn", || listener.on_syn(&stream, &frame)).flatten();
            if let Some(stream_listener) = installed {
                stream.set_listener(stream_listener);
            }
        }
        // The listener may have synchronously replied with FIN.
        if stream.is_closed() {
            self.finish_stream(&stream);
        }
    }

    fn on_syn_reply(&self, frame: SynReply) {
        let Some(stream) = self.stream(frame.stream_id) else {
            tracing::debug!(stream = frame.stream_id, "SYN_REPLY for unknown stream");
            self.try_rst(frame.version, frame.stream_id, StreamStatus::InvalidStream);
            return;
        };
        if let Err(error) = stream.accept_reply() {
            self.handle_stream_error(error);
            return;
        }
        if let Some(listener) = stream.listener() {
            guarded("on_reply", || listener.on_reply(&stream, &frame));
        }
        if stream.update_close_state(frame.is_fin(), false) {
            self.finish_stream(&stream);
        }
    }

    fn on_rst_stream(&self, frame: RstStream) {
        if let Some(stream) = self.stream(frame.stream_id) {
            stream.close();
            self.finish_stream(&stream);
        }
        if let Some(listener) = &self.frame_listener {
            guarded("on_rst", || listener.on_rst(&frame));
        }
    }

    fn on_settings(&self, frame: Settings) {
        if let Some(setting) = frame.get(SettingsId::InitialWindowSize) {
            let new = setting.value.min(i32::MAX as u32) as i32;
            let old = self.window_size.swap(new, Ordering::SeqCst);
            let delta = new - old;
            if delta != 0 {
                for stream in self.streams.read().values() {
                    stream.update_window(delta);
                }
            }
            tracing::debug!(old, new, "initial window size updated");
        }
        if let Some(listener) = &self.frame_listener {
            guarded("on_settings", || listener.on_settings(&frame));
        }
    }

    fn on_ping(&self, frame: Ping) {
        if frame.ping_id % 2 == self.initial_stream_id % 2 {
            // Our own parity: this is the reply to a ping we sent.
            if let Some(listener) = &self.frame_listener {
                guarded("on_ping", || listener.on_ping(&frame));
            }
        } else {
            // Peer-originated pings are echoed back verbatim.
            match self.generator.lock().control(&ControlFrame::Ping(frame)) {
                Ok(buffer) => self.enqueue(FrameBytes::Control {
                    buffer,
                    close_transport: false,
                }),
                Err(error) => tracing::warn!(error = %error, "failed to echo ping"),
            }
        }
    }

    fn on_go_away(&self, frame: GoAway) {
        tracing::debug!(
            last_stream = frame.last_stream_id,
            status = ?frame.status,
            "peer going away"
        );
        self.rejected.store(true, Ordering::SeqCst);
        if let Some(listener) = &self.frame_listener {
            guarded("on_go_away", || listener.on_go_away(&frame));
        }
    }

    fn on_headers(&self, frame: HeadersFrame) {
        let Some(stream) = self.stream(frame.stream_id) else {
            self.try_rst(frame.version, frame.stream_id, StreamStatus::InvalidStream);
            return;
        };
        if let Err(error) = stream.accept_remote_frame("HEADERS on remotely closed stream") {
            self.handle_stream_error(error);
            return;
        }
        if let Some(listener) = stream.listener() {
            guarded("on_headers", || listener.on_headers(&stream, &frame));
        }
        if stream.update_close_state(frame.is_fin(), false) {
            self.finish_stream(&stream);
        }
    }

    fn on_window_update(&self, frame: WindowUpdate) {
        if let Some(stream) = self.stream(frame.stream_id) {
            stream.update_window(frame.delta);
        }
        // The flush at the end of dispatch retries any stalled data unit.
    }

    fn on_data(&self, frame: DataFrame) {
        let Some(stream) = self.stream(frame.stream_id) else {
            tracing::debug!(stream = frame.stream_id, "DATA for unknown stream");
            self.try_rst(
                self.default_version,
                frame.stream_id,
                StreamStatus::InvalidStream,
            );
            return;
        };
        if let Err(error) = stream.accept_remote_frame("DATA frame on remotely closed stream") {
            self.handle_stream_error(error);
            return;
        }
        let info = DataInfo::new(frame.payload.clone(), frame.is_fin());
        if let Some(listener) = stream.listener() {
            guarded("on_data", || listener.on_data(&stream, &info));
        }
        if stream.update_close_state(frame.is_fin(), false) {
            self.finish_stream(&stream);
        }
    }

    /// Send a SYN_REPLY or HEADERS produced by a stream operation.
    pub(crate) fn control_for_stream(
        &self,
        stream_id: u32,
        frame: ControlFrame,
        fin: bool,
    ) -> Result<(), SessionError> {
        if self.is_closed() {
            tracing::debug!(stream = stream_id, "frame dropped, session closed");
            return Ok(());
        }
        let buffer = self.generator.lock().control(&frame)?;
        self.enqueue(FrameBytes::Control {
            buffer,
            close_transport: false,
        });
        if fin {
            if let Some(stream) = self.stream(stream_id) {
                if stream.update_close_state(true, true) {
                    self.finish_stream(&stream);
                }
            }
        }
        self.flush();
        Ok(())
    }

    pub(crate) fn enqueue_stream_data(
        &self,
        stream_id: u32,
        info: DataInfo,
    ) -> Result<(), SessionError> {
        if self.is_closed() {
            tracing::debug!(stream = stream_id, "data dropped, session closed");
            return Ok(());
        }
        let Some(stream) = self.stream(stream_id) else {
            return Err(SessionError::internal("stream not registered"));
        };
        self.enqueue(FrameBytes::Data { stream, info });
        self.flush();
        Ok(())
    }

    fn enqueue(&self, unit: FrameBytes) {
        self.queue.lock().queue.push_back(unit);
    }

    fn try_rst(&self, version: Version, stream_id: u32, status: StreamStatus) {
        if let Err(error) = self.rst(version, RstInfo::new(stream_id, status)) {
            tracing::warn!(stream = stream_id, error = %error, "failed to reset stream");
        }
    }

    fn handle_stream_error(&self, error: StreamError) {
        tracing::warn!(
            stream = error.stream_id,
            status = ?error.status,
            reason = error.reason,
            "stream error"
        );
        let version = self
            .stream(error.stream_id)
            .map(|stream| stream.version())
            .unwrap_or(self.default_version);
        self.try_rst(version, error.stream_id, error.status);
    }

    fn handle_session_error(&self, error: SessionError) {
        tracing::error!(status = ?error.status, reason = %error.reason, "session error");
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            && !self.rejected.load(Ordering::SeqCst)
        {
            let frame = ControlFrame::GoAway(GoAway {
                version: self.default_version,
                last_stream_id: self.last_stream_id.load(Ordering::SeqCst),
                status: error.status,
            });
            match self.generator.lock().control(&frame) {
                Ok(buffer) => {
                    self.enqueue(FrameBytes::Control {
                        buffer,
                        close_transport: true,
                    });
                    self.flush();
                    return;
                }
                Err(error) => tracing::warn!(error = %error, "failed to generate GO_AWAY"),
            }
        }
        self.controller.close(false);
    }

    /// Remove a stream that reached CLOSED. Exactly one caller wins, so
    /// closed notifications fire once per stream.
    fn finish_stream(&self, stream: &Arc<Stream>) {
        let removed = self.streams.write().remove(&stream.id()).is_some();
        if removed {
            self.update_last_stream_id(stream.id());
            tracing::debug!(stream = stream.id(), "stream removed");
            self.notify_stream_closed(stream);
        }
    }

    fn update_last_stream_id(&self, stream_id: u32) {
        // GO_AWAY advertises the last peer-initiated stream this endpoint
        // processed; locally allocated ids never qualify.
        if stream_id % 2 == self.initial_stream_id % 2 {
            return;
        }
        let mut current = self.last_stream_id.load(Ordering::SeqCst);
        while stream_id > current {
            match self.last_stream_id.compare_exchange(
                current,
                stream_id,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    fn notify_stream_created(&self, stream: &Arc<Stream>) {
        let listeners: Vec<_> = self.listeners.read().clone();
        for listener in listeners {
            guarded("on_stream_created", || listener.on_stream_created(stream));
        }
    }

    fn notify_stream_closed(&self, stream: &Arc<Stream>) {
        let listeners: Vec<_> = self.listeners.read().clone();
        for listener in listeners {
            guarded("on_stream_closed", || listener.on_stream_closed(stream));
        }
    }
}

/// Run a listener callback, containing any panic it raises.
fn guarded<R>(callback: &'static str, f: impl FnOnce() -> R) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(callback, "listener panicked");
            None
        }
    }
}
