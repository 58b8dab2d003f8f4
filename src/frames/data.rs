//! DATA frames. Unlike control frames these have no version field; the
//! stream id in the prefix binds them to their stream.

use crate::error::{ParseError, StreamError};
use crate::frames::FLAG_FIN;
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    pub stream_id: u32,
    pub flags: u8,
    pub payload: Bytes,
}

impl DataFrame {
    pub fn is_fin(&self) -> bool {
        self.flags & FLAG_FIN != 0
    }

    /// Validate flags and wrap an accumulated payload. The prefix fields are
    /// already split out by the parser.
    pub(crate) fn decode(stream_id: u32, flags: u8, payload: Bytes) -> Result<Self, ParseError> {
        if flags & !FLAG_FIN != 0 {
            return Err(StreamError::protocol(stream_id, "invalid DATA flags").into());
        }
        Ok(DataFrame {
            stream_id,
            flags,
            payload,
        })
    }
}
