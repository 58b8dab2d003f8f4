//! Error types shared across the codec and the session.
//!
//! Two kinds of protocol failure exist, mirroring the two recovery policies:
//! a [`StreamError`] aborts a single stream (the session resets it and keeps
//! going) while a [`SessionError`] is fatal to the whole connection (the
//! session emits GO_AWAY and closes the transport).

use crate::status::{SessionStatus, StreamStatus};
use thiserror::Error;

/// A failure scoped to one stream.
///
/// The session handles these by sending RST_STREAM with the carried status
/// for the offending stream and continuing to serve every other stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("stream {stream_id}: {status:?}: {reason}")]
pub struct StreamError {
    pub stream_id: u32,
    pub status: StreamStatus,
    pub reason: &'static str,
}

impl StreamError {
    pub(crate) fn protocol(stream_id: u32, reason: &'static str) -> Self {
        StreamError {
            stream_id,
            status: StreamStatus::ProtocolError,
            reason,
        }
    }
}

/// A failure that poisons the whole session.
///
/// The session handles these by emitting GO_AWAY with the carried status and
/// closing the transport ungracefully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("session: {status:?}: {reason}")]
pub struct SessionError {
    pub status: SessionStatus,
    pub reason: String,
}

impl SessionError {
    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        SessionError {
            status: SessionStatus::ProtocolError,
            reason: reason.into(),
        }
    }

    pub(crate) fn internal(reason: impl Into<String>) -> Self {
        SessionError {
            status: SessionStatus::InternalError,
            reason: reason.into(),
        }
    }
}

/// Error raised while parsing inbound bytes.
///
/// A `Stream` variant aborts only the frame being parsed; the parser is left
/// positioned at the next frame boundary and may keep being fed. A `Session`
/// variant means framing is broken beyond recovery.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
