//! WINDOW_UPDATE: grants the peer more per-stream send window (v3 flow
//! control).

use crate::error::{ParseError, SessionError, StreamError};
use crate::frames::{control_frame_buffer, ControlFrameType, Version, STREAM_ID_MASK};
use bytes::{Buf, BufMut, Bytes, BytesMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowUpdate {
    pub version: Version,
    pub stream_id: u32,
    /// Window increment, 31 bits on the wire.
    pub delta: i32,
}

impl WindowUpdate {
    pub(crate) fn decode(version: Version, flags: u8, body: &Bytes) -> Result<Self, ParseError> {
        if body.len() != 8 {
            return Err(SessionError::protocol("WINDOW_UPDATE body must be 8 octets").into());
        }
        let mut src = &body[..];
        let stream_id = src.get_u32() & STREAM_ID_MASK;
        if flags != 0 {
            return Err(StreamError::protocol(stream_id, "invalid WINDOW_UPDATE flags").into());
        }
        let delta = (src.get_u32() & STREAM_ID_MASK) as i32;
        Ok(WindowUpdate {
            version,
            stream_id,
            delta,
        })
    }

    pub(crate) fn encode(&self) -> Result<Bytes, SessionError> {
        let mut body = BytesMut::with_capacity(8);
        body.put_u32(self.stream_id & STREAM_ID_MASK);
        body.put_u32(self.delta as u32 & STREAM_ID_MASK);
        control_frame_buffer(self.version, ControlFrameType::WindowUpdate, 0, &body)
    }
}
