//! Frame serialisation.
//!
//! Control frames are generated into a single contiguous buffer. The
//! generator owns the session's deflate context: callers must serialise
//! access together with stream-id allocation (the session mutex does this),
//! because a compressed block emitted out of enqueue order would reference
//! dictionary state the peer has not seen yet.

use crate::compression::HeaderCompressor;
use crate::error::SessionError;
use crate::frames::{ControlFrame, FLAG_FIN, FRAME_PREFIX_SIZE, STREAM_ID_MASK};
use bytes::{BufMut, Bytes, BytesMut};

pub struct Generator {
    compressor: HeaderCompressor,
}

impl Generator {
    pub fn new() -> Self {
        Generator {
            compressor: HeaderCompressor::new(),
        }
    }

    /// Serialise a control frame, compressing its header block if it has one.
    pub fn control(&mut self, frame: &ControlFrame) -> Result<Bytes, SessionError> {
        frame.encode(&mut self.compressor)
    }

    /// Frame one data chunk. The caller has already sized `payload` against
    /// the stream's flow-control window; FIN is set only on the chunk that
    /// finishes the payload of a closing data unit.
    pub fn data_frame(stream_id: u32, fin: bool, payload: &[u8]) -> Bytes {
        debug_assert!(payload.len() <= crate::frames::MAX_FRAME_LENGTH);
        let mut buf = BytesMut::with_capacity(FRAME_PREFIX_SIZE + payload.len());
        buf.put_u32(stream_id & STREAM_ID_MASK);
        buf.put_u8(if fin { FLAG_FIN } else { 0 });
        buf.put_uint(payload.len() as u64, 3);
        buf.put_slice(payload);
        buf.freeze()
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}
