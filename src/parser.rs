//! Resumable frame parser.
//!
//! The parser accepts arbitrary byte slices and advances an internal state
//! machine, emitting at most one completed frame per call (`Ok(None)` when
//! more bytes are needed). It owns the session's inflate context, so it must
//! only ever be fed from one side — the transport.
//!
//! A control frame's body is accumulated in full before it is decoded. For
//! frames carrying a header block this is mandatory: the block is deflated
//! with SYNC_FLUSH, which the inflate primitive cannot detect as
//! end-of-stream, so inflating a partial block would stall. A [`StreamError`]
//! aborts only the frame that produced it — the parser is already positioned
//! at the next frame boundary and may keep being fed. A
//! [`crate::error::SessionError`] means framing is unrecoverable.

use crate::compression::HeaderDecompressor;
use crate::error::{ParseError, SessionError};
use crate::frames::{
    ControlFrame, ControlFrameType, DataFrame, GoAway, HeadersFrame, Noop, Ping, RstStream,
    Settings, SynReply, SynStream, Version, WindowUpdate, FRAME_PREFIX_SIZE, STREAM_ID_MASK,
};
use bytes::{Buf, Bytes, BytesMut};
use std::io::Cursor;

/// A completed inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ParserEvent {
    Control(ControlFrame),
    Data(DataFrame),
}

#[derive(Debug, Clone, Copy)]
enum State {
    /// Collecting the 8-octet frame prefix.
    Prefix,
    /// Collecting the body of a recognised control frame.
    ControlBody {
        version: Version,
        kind: ControlFrameType,
        flags: u8,
        length: usize,
    },
    /// Collecting and discarding the body of an unknown control frame type.
    SkipBody { length: usize },
    /// Collecting a data frame payload.
    DataBody {
        stream_id: u32,
        flags: u8,
        length: usize,
    },
}

pub struct Parser {
    state: State,
    prefix: [u8; FRAME_PREFIX_SIZE],
    prefix_len: usize,
    body: BytesMut,
    decompressor: HeaderDecompressor,
}

impl Parser {
    pub fn new() -> Self {
        Parser {
            state: State::Prefix,
            prefix: [0; FRAME_PREFIX_SIZE],
            prefix_len: 0,
            body: BytesMut::new(),
            decompressor: HeaderDecompressor::new(),
        }
    }

    /// Consume bytes from `src` until one frame completes or `src` runs dry.
    pub fn parse(&mut self, src: &mut Cursor<&[u8]>) -> Result<Option<ParserEvent>, ParseError> {
        loop {
            match self.state {
                State::Prefix => {
                    while self.prefix_len < FRAME_PREFIX_SIZE && src.has_remaining() {
                        self.prefix[self.prefix_len] = src.get_u8();
                        self.prefix_len += 1;
                    }
                    if self.prefix_len < FRAME_PREFIX_SIZE {
                        return Ok(None);
                    }
                    self.prefix_len = 0;
                    self.on_prefix()?;
                }
                State::ControlBody {
                    version,
                    kind,
                    flags,
                    length,
                } => {
                    if !self.fill_body(src, length) {
                        return Ok(None);
                    }
                    let body = self.body.split().freeze();
                    self.state = State::Prefix;
                    let frame = self.decode_control(version, kind, flags, &body)?;
                    return Ok(Some(ParserEvent::Control(frame)));
                }
                State::SkipBody { length } => {
                    if !self.fill_body(src, length) {
                        return Ok(None);
                    }
                    self.body.clear();
                    self.state = State::Prefix;
                }
                State::DataBody {
                    stream_id,
                    flags,
                    length,
                } => {
                    if !self.fill_body(src, length) {
                        return Ok(None);
                    }
                    let payload = self.body.split().freeze();
                    self.state = State::Prefix;
                    let frame = DataFrame::decode(stream_id, flags, payload)?;
                    return Ok(Some(ParserEvent::Data(frame)));
                }
            }
        }
    }

    fn on_prefix(&mut self) -> Result<(), ParseError> {
        let word = u32::from_be_bytes([
            self.prefix[0],
            self.prefix[1],
            self.prefix[2],
            self.prefix[3],
        ]);
        let flags = self.prefix[4];
        let length =
            u32::from_be_bytes([0, self.prefix[5], self.prefix[6], self.prefix[7]]) as usize;
        self.body.clear();
        self.body.reserve(length);
        if word & 0x8000_0000 != 0 {
            let version_raw = ((word >> 16) & 0x7FFF) as u16;
            let type_raw = (word & 0xFFFF) as u16;
            let version = Version::try_from(version_raw).map_err(|_| {
                SessionError::protocol(format!("unsupported SPDY version {version_raw}"))
            })?;
            match ControlFrameType::try_from(type_raw) {
                Ok(kind) => {
                    self.state = State::ControlBody {
                        version,
                        kind,
                        flags,
                        length,
                    };
                }
                Err(_) => {
                    // Unknown control frame types are ignored.
                    tracing::debug!(frame_type = type_raw, "skipping unknown control frame");
                    self.state = State::SkipBody { length };
                }
            }
        } else {
            self.state = State::DataBody {
                stream_id: word & STREAM_ID_MASK,
                flags,
                length,
            };
        }
        Ok(())
    }

    /// Accumulate up to `length` body bytes; true once the body is complete.
    fn fill_body(&mut self, src: &mut Cursor<&[u8]>, length: usize) -> bool {
        let take = (length - self.body.len()).min(src.remaining());
        if take > 0 {
            let chunk = src.copy_to_bytes(take);
            self.body.extend_from_slice(&chunk);
        }
        self.body.len() == length
    }

    fn decode_control(
        &mut self,
        version: Version,
        kind: ControlFrameType,
        flags: u8,
        body: &Bytes,
    ) -> Result<ControlFrame, ParseError> {
        match kind {
            ControlFrameType::SynStream => {
                SynStream::decode(version, flags, body, &mut self.decompressor)
                    .map(ControlFrame::SynStream)
            }
            ControlFrameType::SynReply => {
                SynReply::decode(version, flags, body, &mut self.decompressor)
                    .map(ControlFrame::SynReply)
            }
            ControlFrameType::RstStream => {
                RstStream::decode(version, flags, body).map(ControlFrame::RstStream)
            }
            ControlFrameType::Settings => {
                Settings::decode(version, flags, body).map(ControlFrame::Settings)
            }
            ControlFrameType::Noop => Noop::decode(version, flags, body).map(ControlFrame::Noop),
            ControlFrameType::Ping => Ping::decode(version, flags, body).map(ControlFrame::Ping),
            ControlFrameType::GoAway => {
                GoAway::decode(version, flags, body).map(ControlFrame::GoAway)
            }
            ControlFrameType::Headers => {
                HeadersFrame::decode(version, flags, body, &mut self.decompressor)
                    .map(ControlFrame::Headers)
            }
            ControlFrameType::WindowUpdate => {
                WindowUpdate::decode(version, flags, body).map(ControlFrame::WindowUpdate)
            }
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}
