//! Typed SPDY frames and their wire encodings.
//!
//! Every frame shares the 8-octet prefix. Control frames set the top bit of
//! the first word and carry `version | type | flags | length`; data frames
//! clear it and carry `stream-id | flags | length`. Each control frame type
//! lives in its own file with its version-aware body codec.

mod data;
mod go_away;
mod headers_frame;
mod noop;
mod ping;
mod rst_stream;
mod settings;
mod syn_reply;
mod syn_stream;
mod window_update;

pub use data::DataFrame;
pub use go_away::GoAway;
pub use headers_frame::HeadersFrame;
pub use noop::Noop;
pub use ping::Ping;
pub use rst_stream::RstStream;
pub use settings::{Setting, Settings, SettingsId, FLAG_SETTINGS_PERSISTED, FLAG_SETTINGS_PERSIST_VALUE};
pub use syn_reply::SynReply;
pub use syn_stream::SynStream;
pub use window_update::WindowUpdate;

use crate::compression::HeaderCompressor;
use crate::error::SessionError;
use bytes::{BufMut, Bytes, BytesMut};
use num_enum::TryFromPrimitive;

/// FIN: the sender half-closes the stream with this frame.
pub const FLAG_FIN: u8 = 0x01;
/// SYN_STREAM only: the stream is unidirectional (server push).
pub const FLAG_UNIDIRECTIONAL: u8 = 0x02;
/// SETTINGS only: the peer should clear previously persisted settings.
pub const FLAG_CLEAR_PERSISTED: u8 = 0x01;

/// The top bit of every 31-bit stream identifier is reserved.
pub const STREAM_ID_MASK: u32 = 0x7FFF_FFFF;

/// Frame lengths are 24 bits on the wire.
pub(crate) const MAX_FRAME_LENGTH: usize = 0xFF_FFFF;

/// Size of the common frame prefix.
pub(crate) const FRAME_PREFIX_SIZE: usize = 8;

/// Protocol versions this endpoint speaks.
#[derive(TryFromPrimitive)]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    V2 = 2,
    V3 = 3,
}

/// Control frame type codes.
#[derive(TryFromPrimitive)]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlFrameType {
    SynStream = 1,
    SynReply = 2,
    RstStream = 3,
    Settings = 4,
    Noop = 5,
    Ping = 6,
    GoAway = 7,
    Headers = 8,
    WindowUpdate = 9,
}

/// A fully parsed control frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFrame {
    SynStream(SynStream),
    SynReply(SynReply),
    RstStream(RstStream),
    Settings(Settings),
    Noop(Noop),
    Ping(Ping),
    GoAway(GoAway),
    Headers(HeadersFrame),
    WindowUpdate(WindowUpdate),
}

impl ControlFrame {
    pub fn version(&self) -> Version {
        match self {
            ControlFrame::SynStream(f) => f.version,
            ControlFrame::SynReply(f) => f.version,
            ControlFrame::RstStream(f) => f.version,
            ControlFrame::Settings(f) => f.version,
            ControlFrame::Noop(f) => f.version,
            ControlFrame::Ping(f) => f.version,
            ControlFrame::GoAway(f) => f.version,
            ControlFrame::Headers(f) => f.version,
            ControlFrame::WindowUpdate(f) => f.version,
        }
    }

    pub fn frame_type(&self) -> ControlFrameType {
        match self {
            ControlFrame::SynStream(_) => ControlFrameType::SynStream,
            ControlFrame::SynReply(_) => ControlFrameType::SynReply,
            ControlFrame::RstStream(_) => ControlFrameType::RstStream,
            ControlFrame::Settings(_) => ControlFrameType::Settings,
            ControlFrame::Noop(_) => ControlFrameType::Noop,
            ControlFrame::Ping(_) => ControlFrameType::Ping,
            ControlFrame::GoAway(_) => ControlFrameType::GoAway,
            ControlFrame::Headers(_) => ControlFrameType::Headers,
            ControlFrame::WindowUpdate(_) => ControlFrameType::WindowUpdate,
        }
    }

    /// Serialise to wire octets. Frames carrying a header block deflate it
    /// through `compressor`, which is stateful for the whole session.
    pub(crate) fn encode(
        &self,
        compressor: &mut HeaderCompressor,
    ) -> Result<Bytes, SessionError> {
        match self {
            ControlFrame::SynStream(f) => f.encode(compressor),
            ControlFrame::SynReply(f) => f.encode(compressor),
            ControlFrame::RstStream(f) => f.encode(),
            ControlFrame::Settings(f) => f.encode(),
            ControlFrame::Noop(f) => f.encode(),
            ControlFrame::Ping(f) => f.encode(),
            ControlFrame::GoAway(f) => f.encode(),
            ControlFrame::Headers(f) => f.encode(compressor),
            ControlFrame::WindowUpdate(f) => f.encode(),
        }
    }
}

/// Prepend the control prefix to a finished body.
pub(crate) fn control_frame_buffer(
    version: Version,
    kind: ControlFrameType,
    flags: u8,
    body: &[u8],
) -> Result<Bytes, SessionError> {
    if body.len() > MAX_FRAME_LENGTH {
        return Err(SessionError::internal(format!(
            "{kind:?} body of {} bytes exceeds the 24-bit frame length",
            body.len()
        )));
    }
    let mut buf = BytesMut::with_capacity(FRAME_PREFIX_SIZE + body.len());
    buf.put_u16(0x8000 | version as u16);
    buf.put_u16(kind as u16);
    buf.put_u8(flags);
    buf.put_uint(body.len() as u64, 3);
    buf.put_slice(body);
    Ok(buf.freeze())
}
