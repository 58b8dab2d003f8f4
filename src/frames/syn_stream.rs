//! SYN_STREAM: opens a new stream and carries its compressed header block.
//!
//! Body layout: stream id (31 bits), associated stream id (31 bits), then
//! the priority field — v2 packs 2 bits of priority and 14 unused bits into
//! a 16-bit word, v3 packs 3 bits of priority, 5 unused bits and an 8-bit
//! credential slot — followed by the header block. The API priority range is
//! 0–7 for both versions; the v2 wire value drops the least significant bit.

use crate::compression::{HeaderCompressor, HeaderDecompressor};
use crate::error::{ParseError, SessionError, StreamError};
use crate::frames::{
    control_frame_buffer, ControlFrameType, Version, FLAG_FIN, FLAG_UNIDIRECTIONAL,
    STREAM_ID_MASK,
};
use crate::headers::Headers;
use bytes::{Buf, BufMut, Bytes, BytesMut};

#[derive(Debug, Clone, PartialEq)]
pub struct SynStream {
    pub version: Version,
    pub stream_id: u32,
    pub associated_stream_id: u32,
    /// 0 (highest) to 7 (lowest).
    pub priority: u8,
    /// v3 credential slot; 0 when unused and always 0 in v2.
    pub slot: u8,
    pub flags: u8,
    pub headers: Headers,
}

impl SynStream {
    pub fn is_fin(&self) -> bool {
        self.flags & FLAG_FIN != 0
    }

    pub fn is_unidirectional(&self) -> bool {
        self.flags & FLAG_UNIDIRECTIONAL != 0
    }

    pub(crate) fn decode(
        version: Version,
        flags: u8,
        body: &Bytes,
        decompressor: &mut HeaderDecompressor,
    ) -> Result<Self, ParseError> {
        if body.len() < 10 {
            return Err(SessionError::protocol("SYN_STREAM body too short").into());
        }
        let mut src = &body[..];
        let stream_id = src.get_u32() & STREAM_ID_MASK;
        let associated_stream_id = src.get_u32() & STREAM_ID_MASK;
        if flags & !(FLAG_FIN | FLAG_UNIDIRECTIONAL) != 0 {
            return Err(StreamError::protocol(stream_id, "invalid SYN_STREAM flags").into());
        }
        let (priority, slot) = match version {
            Version::V2 => (((src.get_u16() >> 14) as u8) << 1, 0),
            Version::V3 => {
                let priority = src.get_u8() >> 5;
                let slot = src.get_u8();
                (priority, slot)
            }
        };
        let block = decompressor.decompress(version, src)?;
        let headers = Headers::decode_block(version, stream_id, &block)?;
        Ok(SynStream {
            version,
            stream_id,
            associated_stream_id,
            priority,
            slot,
            flags,
            headers,
        })
    }

    pub(crate) fn encode(&self, compressor: &mut HeaderCompressor) -> Result<Bytes, SessionError> {
        let block = self.headers.encode_block(self.version)?;
        let compressed = compressor.compress(self.version, &block)?;
        let mut body = BytesMut::with_capacity(10 + compressed.len());
        body.put_u32(self.stream_id & STREAM_ID_MASK);
        body.put_u32(self.associated_stream_id & STREAM_ID_MASK);
        match self.version {
            Version::V2 => body.put_u16((u16::from(self.priority >> 1)) << 14),
            Version::V3 => {
                body.put_u8((self.priority & 0x07) << 5);
                body.put_u8(self.slot);
            }
        }
        body.extend_from_slice(&compressed);
        control_frame_buffer(self.version, ControlFrameType::SynStream, self.flags, &body)
    }
}
