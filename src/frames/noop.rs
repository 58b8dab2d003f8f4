//! NOOP: an empty v2 frame with no effect. Parsed for completeness and
//! ignored by the session.

use crate::error::{ParseError, SessionError};
use crate::frames::{control_frame_buffer, ControlFrameType, Version};
use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Noop {
    pub version: Version,
}

impl Noop {
    pub(crate) fn decode(version: Version, flags: u8, body: &Bytes) -> Result<Self, ParseError> {
        if flags != 0 {
            return Err(SessionError::protocol("invalid NOOP flags").into());
        }
        if !body.is_empty() {
            return Err(SessionError::protocol("NOOP carries no body").into());
        }
        Ok(Noop { version })
    }

    pub(crate) fn encode(&self) -> Result<Bytes, SessionError> {
        control_frame_buffer(self.version, ControlFrameType::Noop, 0, &[])
    }
}
