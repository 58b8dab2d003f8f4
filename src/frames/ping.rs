//! PING: round-trip measurement and liveness probe.
//!
//! Ping ids share the parity scheme of stream ids: each endpoint only
//! originates ids of its own parity, which is how a received PING is told
//! apart as an echo of our own or a probe from the peer.

use crate::error::{ParseError, SessionError};
use crate::frames::{control_frame_buffer, ControlFrameType, Version};
use bytes::{Buf, BufMut, Bytes, BytesMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping {
    pub version: Version,
    pub ping_id: u32,
}

impl Ping {
    pub(crate) fn decode(version: Version, flags: u8, body: &Bytes) -> Result<Self, ParseError> {
        if flags != 0 {
            return Err(SessionError::protocol("invalid PING flags").into());
        }
        if body.len() != 4 {
            return Err(SessionError::protocol("PING body must be 4 octets").into());
        }
        let mut src = &body[..];
        Ok(Ping {
            version,
            ping_id: src.get_u32(),
        })
    }

    pub(crate) fn encode(&self) -> Result<Bytes, SessionError> {
        let mut body = BytesMut::with_capacity(4);
        body.put_u32(self.ping_id);
        control_frame_buffer(self.version, ControlFrameType::Ping, 0, &body)
    }
}
