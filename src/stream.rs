//! Per-stream state.
//!
//! A stream tracks its close state, its v3 flow-control window and the
//! listener installed for it. The close state is a small Mealy machine:
//!
//! | state              | event             | next               |
//! |--------------------|-------------------|--------------------|
//! | OPEN               | local FIN sent    | HALF_CLOSED_LOCAL  |
//! | OPEN               | remote FIN seen   | HALF_CLOSED_REMOTE |
//! | HALF_CLOSED_LOCAL  | remote FIN seen   | CLOSED             |
//! | HALF_CLOSED_REMOTE | local FIN sent    | CLOSED             |
//! | any                | RST sent/received | CLOSED             |

use crate::error::{SessionError, StreamError};
use crate::frames::{ControlFrame, HeadersFrame, SynReply, Version, FLAG_FIN};
use crate::session::Session;
use crate::traits::StreamFrameListener;
use crate::types::{DataInfo, HeadersInfo, ReplyInfo};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseState {
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    Closed,
}

pub struct Stream {
    id: u32,
    version: Version,
    priority: u8,
    session: Weak<Session>,
    close_state: Mutex<CloseState>,
    /// v3 send window; unused by v2 streams.
    window: AtomicI32,
    /// Whether a SYN_REPLY has been sent or received on this stream.
    replied: AtomicBool,
    listener: Mutex<Option<Arc<dyn StreamFrameListener>>>,
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("priority", &self.priority)
            .field("close_state", &*self.close_state.lock())
            .field("window", &self.window.load(Ordering::SeqCst))
            .field("replied", &self.replied.load(Ordering::SeqCst))
            .finish()
    }
}

impl Stream {
    pub(crate) fn new(
        id: u32,
        version: Version,
        priority: u8,
        window: i32,
        session: Weak<Session>,
    ) -> Stream {
        Stream {
            id,
            version,
            priority,
            session,
            close_state: Mutex::new(CloseState::Open),
            window: AtomicI32::new(window),
            replied: AtomicBool::new(false),
            listener: Mutex::new(None),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Current send window. Meaningful only on v3 streams.
    pub fn window(&self) -> i32 {
        self.window.load(Ordering::SeqCst)
    }

    pub fn close_state(&self) -> CloseState {
        *self.close_state.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.close_state() == CloseState::Closed
    }

    pub(crate) fn is_remote_closed(&self) -> bool {
        matches!(
            self.close_state(),
            CloseState::HalfClosedRemote | CloseState::Closed
        )
    }

    /// Answer a peer-initiated stream with SYN_REPLY. Valid once.
    pub fn reply(&self, info: ReplyInfo) -> Result<(), SessionError> {
        let session = self.session()?;
        if self.is_closed() {
            return Err(SessionError::internal("stream already closed"));
        }
        if self
            .replied
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SessionError::internal("stream already replied"));
        }
        let frame = ControlFrame::SynReply(SynReply {
            version: self.version,
            stream_id: self.id,
            flags: if info.close { FLAG_FIN } else { 0 },
            headers: info.headers,
        });
        session.control_for_stream(self.id, frame, info.close)
    }

    /// Send payload. The session drains it through the write queue, gated by
    /// this stream's window on v3.
    pub fn data(&self, info: DataInfo) -> Result<(), SessionError> {
        let session = self.session()?;
        if self.is_closed() {
            return Err(SessionError::internal("stream already closed"));
        }
        session.enqueue_stream_data(self.id, info)
    }

    /// Send trailing headers.
    pub fn headers(&self, info: HeadersInfo) -> Result<(), SessionError> {
        let session = self.session()?;
        if self.is_closed() {
            return Err(SessionError::internal("stream already closed"));
        }
        let frame = ControlFrame::Headers(HeadersFrame {
            version: self.version,
            stream_id: self.id,
            flags: if info.close { FLAG_FIN } else { 0 },
            headers: info.headers,
        });
        session.control_for_stream(self.id, frame, info.close)
    }

    fn session(&self) -> Result<Arc<Session>, SessionError> {
        self.session
            .upgrade()
            .ok_or_else(|| SessionError::internal("session has been dropped"))
    }

    pub(crate) fn set_listener(&self, listener: Arc<dyn StreamFrameListener>) {
        *self.listener.lock() = Some(listener);
    }

    pub(crate) fn listener(&self) -> Option<Arc<dyn StreamFrameListener>> {
        self.listener.lock().clone()
    }

    /// Advance the close state for a FIN seen on `local` or remote side.
    /// Returns true when the stream has just reached CLOSED.
    pub(crate) fn update_close_state(&self, fin: bool, local: bool) -> bool {
        if !fin {
            return false;
        }
        let mut state = self.close_state.lock();
        let next = match (*state, local) {
            (CloseState::Open, true) => CloseState::HalfClosedLocal,
            (CloseState::Open, false) => CloseState::HalfClosedRemote,
            (CloseState::HalfClosedLocal, false) | (CloseState::HalfClosedRemote, true) => {
                CloseState::Closed
            }
            (current, _) => current,
        };
        let just_closed = next == CloseState::Closed && *state != CloseState::Closed;
        *state = next;
        just_closed
    }

    /// Immediate close, used for RST in either direction.
    pub(crate) fn close(&self) {
        *self.close_state.lock() = CloseState::Closed;
    }

    pub(crate) fn update_window(&self, delta: i32) {
        let window = self.window.fetch_add(delta, Ordering::SeqCst) + delta;
        tracing::trace!(stream = self.id, window, delta, "window updated");
    }

    /// Record a SYN_REPLY arriving from the peer.
    pub(crate) fn accept_reply(&self) -> Result<(), StreamError> {
        if self.is_remote_closed() {
            return Err(StreamError::protocol(
                self.id,
                "SYN_REPLY on remotely closed stream",
            ));
        }
        if self
            .replied
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(StreamError::protocol(self.id, "duplicate SYN_REPLY"));
        }
        Ok(())
    }

    /// Validate an inbound frame against the remote half of the stream.
    pub(crate) fn accept_remote_frame(&self, reason: &'static str) -> Result<(), StreamError> {
        if self.is_remote_closed() {
            return Err(StreamError::protocol(self.id, reason));
        }
        Ok(())
    }
}
