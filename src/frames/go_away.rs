//! GO_AWAY: graceful shutdown announcement.
//!
//! Carries the last peer-initiated stream id the sender will process. v3
//! appends a 32-bit session status; v2 has no status field and decodes as
//! [`SessionStatus::Ok`].

use crate::error::{ParseError, SessionError};
use crate::frames::{control_frame_buffer, ControlFrameType, Version, STREAM_ID_MASK};
use crate::status::SessionStatus;
use bytes::{Buf, BufMut, Bytes, BytesMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoAway {
    pub version: Version,
    pub last_stream_id: u32,
    pub status: SessionStatus,
}

impl GoAway {
    pub(crate) fn decode(version: Version, flags: u8, body: &Bytes) -> Result<Self, ParseError> {
        if flags != 0 {
            return Err(SessionError::protocol("invalid GO_AWAY flags").into());
        }
        let expected = match version {
            Version::V2 => 4,
            Version::V3 => 8,
        };
        if body.len() != expected {
            return Err(SessionError::protocol("GO_AWAY body length mismatch").into());
        }
        let mut src = &body[..];
        let last_stream_id = src.get_u32() & STREAM_ID_MASK;
        let status = match version {
            Version::V2 => SessionStatus::Ok,
            Version::V3 => {
                let code = src.get_u32();
                SessionStatus::try_from(code).map_err(|_| {
                    SessionError::protocol(format!("unknown GO_AWAY status {code}"))
                })?
            }
        };
        Ok(GoAway {
            version,
            last_stream_id,
            status,
        })
    }

    pub(crate) fn encode(&self) -> Result<Bytes, SessionError> {
        let mut body = BytesMut::with_capacity(8);
        body.put_u32(self.last_stream_id & STREAM_ID_MASK);
        if self.version == Version::V3 {
            body.put_u32(self.status as u32);
        }
        control_frame_buffer(self.version, ControlFrameType::GoAway, 0, &body)
    }
}
