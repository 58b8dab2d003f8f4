//! SYN_REPLY: the response half of stream establishment.
//!
//! v2 carries 16 unused bits between the stream id and the header block;
//! v3 follows the stream id with the block directly.

use crate::compression::{HeaderCompressor, HeaderDecompressor};
use crate::error::{ParseError, SessionError, StreamError};
use crate::frames::{control_frame_buffer, ControlFrameType, Version, FLAG_FIN, STREAM_ID_MASK};
use crate::headers::Headers;
use bytes::{Buf, BufMut, Bytes, BytesMut};

#[derive(Debug, Clone, PartialEq)]
pub struct SynReply {
    pub version: Version,
    pub stream_id: u32,
    pub flags: u8,
    pub headers: Headers,
}

impl SynReply {
    pub fn is_fin(&self) -> bool {
        self.flags & FLAG_FIN != 0
    }

    pub(crate) fn decode(
        version: Version,
        flags: u8,
        body: &Bytes,
        decompressor: &mut HeaderDecompressor,
    ) -> Result<Self, ParseError> {
        let fixed = match version {
            Version::V2 => 6,
            Version::V3 => 4,
        };
        if body.len() < fixed {
            return Err(SessionError::protocol("SYN_REPLY body too short").into());
        }
        let mut src = &body[..];
        let stream_id = src.get_u32() & STREAM_ID_MASK;
        if flags & !FLAG_FIN != 0 {
            return Err(StreamError::protocol(stream_id, "invalid SYN_REPLY flags").into());
        }
        if version == Version::V2 {
            src.advance(2);
        }
        let block = decompressor.decompress(version, src)?;
        let headers = Headers::decode_block(version, stream_id, &block)?;
        Ok(SynReply {
            version,
            stream_id,
            flags,
            headers,
        })
    }

    pub(crate) fn encode(&self, compressor: &mut HeaderCompressor) -> Result<Bytes, SessionError> {
        let block = self.headers.encode_block(self.version)?;
        let compressed = compressor.compress(self.version, &block)?;
        let mut body = BytesMut::with_capacity(6 + compressed.len());
        body.put_u32(self.stream_id & STREAM_ID_MASK);
        if self.version == Version::V2 {
            body.put_u16(0);
        }
        body.extend_from_slice(&compressed);
        control_frame_buffer(self.version, ControlFrameType::SynReply, self.flags, &body)
    }
}
