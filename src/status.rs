//! Status codes carried by RST_STREAM and GO_AWAY frames.
//!
//! Stream status codes are looked up through a per-version table because the
//! numeric values diverged between SPDY v2 and v3: v2 assigns 6 to
//! FLOW_CONTROL_ERROR while v3 assigns 6 to INTERNAL_ERROR, and the v3-only
//! codes (INTERNAL_ERROR, STREAM_IN_USE, STREAM_ALREADY_CLOSED) have no v2
//! representation at all.

use crate::frames::Version;
use num_enum::TryFromPrimitive;

/// Per-stream status carried by RST_STREAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamStatus {
    ProtocolError,
    InvalidStream,
    RefusedStream,
    UnsupportedVersion,
    CancelStream,
    /// No v2 wire code; must not be sent to a v2 peer.
    InternalError,
    FlowControlError,
    /// v3 only.
    StreamInUse,
    /// v3 only.
    StreamAlreadyClosed,
}

impl StreamStatus {
    /// Wire code of this status for `version`, or `None` when the status is
    /// not representable in that version.
    pub fn code(self, version: Version) -> Option<u32> {
        match version {
            Version::V2 => match self {
                StreamStatus::ProtocolError => Some(1),
                StreamStatus::InvalidStream => Some(2),
                StreamStatus::RefusedStream => Some(3),
                StreamStatus::UnsupportedVersion => Some(4),
                StreamStatus::CancelStream => Some(5),
                StreamStatus::FlowControlError => Some(6),
                StreamStatus::InternalError
                | StreamStatus::StreamInUse
                | StreamStatus::StreamAlreadyClosed => None,
            },
            Version::V3 => match self {
                StreamStatus::ProtocolError => Some(1),
                StreamStatus::InvalidStream => Some(2),
                StreamStatus::RefusedStream => Some(3),
                StreamStatus::UnsupportedVersion => Some(4),
                StreamStatus::CancelStream => Some(5),
                StreamStatus::InternalError => Some(6),
                StreamStatus::FlowControlError => Some(7),
                StreamStatus::StreamInUse => Some(8),
                StreamStatus::StreamAlreadyClosed => Some(9),
            },
        }
    }

    /// Reverse lookup of a wire code for `version`.
    pub fn from_code(version: Version, code: u32) -> Option<StreamStatus> {
        match version {
            Version::V2 => match code {
                1 => Some(StreamStatus::ProtocolError),
                2 => Some(StreamStatus::InvalidStream),
                3 => Some(StreamStatus::RefusedStream),
                4 => Some(StreamStatus::UnsupportedVersion),
                5 => Some(StreamStatus::CancelStream),
                6 => Some(StreamStatus::FlowControlError),
                _ => None,
            },
            Version::V3 => match code {
                1 => Some(StreamStatus::ProtocolError),
                2 => Some(StreamStatus::InvalidStream),
                3 => Some(StreamStatus::RefusedStream),
                4 => Some(StreamStatus::UnsupportedVersion),
                5 => Some(StreamStatus::CancelStream),
                6 => Some(StreamStatus::InternalError),
                7 => Some(StreamStatus::FlowControlError),
                8 => Some(StreamStatus::StreamInUse),
                9 => Some(StreamStatus::StreamAlreadyClosed),
                _ => None,
            },
        }
    }
}

/// Session-wide status carried by GO_AWAY (v3) and SESSION-fatal errors.
///
/// These codes are identical in both versions, so a plain primitive mapping
/// is enough.
#[derive(TryFromPrimitive)]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Ok = 0,
    ProtocolError = 1,
    InternalError = 2,
}
