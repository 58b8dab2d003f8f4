//! RST_STREAM: abnormal stream termination.

use crate::error::{ParseError, SessionError, StreamError};
use crate::frames::{control_frame_buffer, ControlFrameType, Version, STREAM_ID_MASK};
use crate::status::StreamStatus;
use bytes::{Buf, BufMut, Bytes, BytesMut};

#[derive(Debug, Clone, PartialEq)]
pub struct RstStream {
    pub version: Version,
    pub stream_id: u32,
    pub status: StreamStatus,
}

impl RstStream {
    pub(crate) fn decode(version: Version, flags: u8, body: &Bytes) -> Result<Self, ParseError> {
        if body.len() != 8 {
            return Err(SessionError::protocol("RST_STREAM body must be 8 octets").into());
        }
        let mut src = &body[..];
        let stream_id = src.get_u32() & STREAM_ID_MASK;
        if flags != 0 {
            return Err(StreamError::protocol(stream_id, "invalid RST_STREAM flags").into());
        }
        let code = src.get_u32();
        let status = StreamStatus::from_code(version, code).ok_or_else(|| {
            StreamError::protocol(stream_id, "unknown RST_STREAM status code")
        })?;
        Ok(RstStream {
            version,
            stream_id,
            status,
        })
    }

    pub(crate) fn encode(&self) -> Result<Bytes, SessionError> {
        let code = self.status.code(self.version).ok_or_else(|| {
            SessionError::internal(format!(
                "{:?} has no wire code in {:?}",
                self.status, self.version
            ))
        })?;
        let mut body = BytesMut::with_capacity(8);
        body.put_u32(self.stream_id & STREAM_ID_MASK);
        body.put_u32(code);
        control_frame_buffer(self.version, ControlFrameType::RstStream, 0, &body)
    }
}
