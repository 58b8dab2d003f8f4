//! Value types used at the session API boundary.

use crate::frames::Version;
use crate::headers::Headers;
use crate::status::StreamStatus;
use bytes::Bytes;

/// Arguments for opening a stream with [`crate::session::Session::syn`].
#[derive(Debug, Clone)]
pub struct SynInfo {
    pub headers: Headers,
    /// Half-close the local side with the SYN_STREAM itself.
    pub close: bool,
    /// 0 (highest) to 7 (lowest).
    pub priority: u8,
    pub associated_stream_id: u32,
    /// Server push is not supported; a true value is rejected.
    pub unidirectional: bool,
}

impl SynInfo {
    pub fn new(headers: Headers, close: bool) -> Self {
        SynInfo {
            headers,
            close,
            priority: 0,
            associated_stream_id: 0,
            unidirectional: false,
        }
    }
}

/// Arguments for answering a stream with [`crate::stream::Stream::reply`].
#[derive(Debug, Clone)]
pub struct ReplyInfo {
    pub headers: Headers,
    pub close: bool,
}

impl ReplyInfo {
    pub fn new(headers: Headers, close: bool) -> Self {
        ReplyInfo { headers, close }
    }
}

/// Arguments for sending trailing headers on an established stream.
#[derive(Debug, Clone)]
pub struct HeadersInfo {
    pub headers: Headers,
    pub close: bool,
}

impl HeadersInfo {
    pub fn new(headers: Headers, close: bool) -> Self {
        HeadersInfo { headers, close }
    }
}

/// Arguments for resetting a stream.
#[derive(Debug, Clone, Copy)]
pub struct RstInfo {
    pub stream_id: u32,
    pub status: StreamStatus,
}

impl RstInfo {
    pub fn new(stream_id: u32, status: StreamStatus) -> Self {
        RstInfo { stream_id, status }
    }
}

/// Arguments for a SETTINGS frame.
#[derive(Debug, Clone, Default)]
pub struct SettingsInfo {
    pub clear_persisted: bool,
    pub settings: Vec<crate::frames::Setting>,
}

/// Result of [`crate::session::Session::ping`]: the id that will come back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingInfo {
    pub ping_id: u32,
}

/// A chunk of stream payload.
///
/// Outbound, the session drains it against the stream's flow-control window,
/// possibly across several data frames; `close` half-closes the stream with
/// the final chunk. Inbound, one `DataInfo` wraps one received data frame.
#[derive(Debug, Clone)]
pub struct DataInfo {
    data: Bytes,
    close: bool,
}

impl DataInfo {
    pub fn new(data: impl Into<Bytes>, close: bool) -> Self {
        DataInfo {
            data: data.into(),
            close,
        }
    }

    /// Bytes not yet framed.
    pub fn available(&self) -> usize {
        self.data.len()
    }

    pub fn is_close(&self) -> bool {
        self.close
    }

    pub fn is_consumed(&self) -> bool {
        self.data.is_empty()
    }

    /// The remaining payload.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// Split off the next `n` bytes for framing.
    pub(crate) fn take(&mut self, n: usize) -> Bytes {
        self.data.split_to(n)
    }
}

/// Session construction parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// First locally allocated stream id; its parity is the endpoint role
    /// (odd = client, even = server) and also seeds the ping-id counter.
    pub initial_stream_id: u32,
    /// Per-stream send window before the peer's SETTINGS says otherwise.
    pub initial_window_size: i32,
    /// Version used for frames that must be emitted without any stream
    /// context, such as resets for unknown stream ids.
    pub default_version: Version,
}

impl SessionConfig {
    pub fn client() -> Self {
        SessionConfig {
            initial_stream_id: 1,
            initial_window_size: 65_536,
            default_version: Version::V2,
        }
    }

    pub fn server() -> Self {
        SessionConfig {
            initial_stream_id: 2,
            ..Self::client()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::client()
    }
}
