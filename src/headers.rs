//! The name/value multimap carried by SYN_STREAM, SYN_REPLY and HEADERS
//! frames, plus its plaintext wire form.
//!
//! Names are stored with the case the application supplied and matched
//! case-insensitively. Insertion order is preserved, as is the order of
//! values under one name. On the wire every string is ISO-8859-1 and the
//! values of a repeated name are joined with NUL.

use crate::error::{ParseError, SessionError, StreamError};
use crate::frames::Version;
use bytes::{Buf, BufMut};

/// Ordered, case-preserving multimap of header names to values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` under `name`, keeping any values already present.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entry_mut(&name) {
            Some(values) => values.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// Replace all values of `name` with the single `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entry_mut(&name) {
            Some(values) => {
                values.clear();
                values.push(value);
            }
            None => self.entries.push((name, vec![value])),
        }
    }

    /// All values of `name`, in insertion order.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    /// First value of `name`.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|values| values.first()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_mut(&mut self, name: &str) -> Option<&mut Vec<String>> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, values)| values)
    }

    /// Encode to the uncompressed header-block layout: a pair count (16-bit
    /// in v2, 32-bit in v3) followed by length-prefixed name and value
    /// strings, values of a repeated name joined with NUL.
    pub(crate) fn encode_block(&self, version: Version) -> Result<Vec<u8>, SessionError> {
        let mut out = Vec::with_capacity(64);
        match version {
            Version::V2 => {
                let count = u16::try_from(self.entries.len())
                    .map_err(|_| SessionError::internal("too many headers for a v2 block"))?;
                out.put_u16(count);
            }
            Version::V3 => out.put_u32(self.entries.len() as u32),
        }
        for (name, values) in &self.entries {
            put_string(&mut out, version, name)?;
            let joined = values.join("\0");
            put_string(&mut out, version, &joined)?;
        }
        Ok(out)
    }

    /// Decode the uncompressed header-block layout. `stream_id` attributes
    /// malformed content to the stream that carried the block.
    pub(crate) fn decode_block(
        version: Version,
        stream_id: u32,
        block: &[u8],
    ) -> Result<Headers, ParseError> {
        let mut src = block;
        let count = match version {
            Version::V2 => {
                if src.remaining() < 2 {
                    return Err(truncated(stream_id).into());
                }
                src.get_u16() as usize
            }
            Version::V3 => {
                if src.remaining() < 4 {
                    return Err(truncated(stream_id).into());
                }
                src.get_u32() as usize
            }
        };
        let mut headers = Headers::new();
        for _ in 0..count {
            let name = get_string(&mut src, version, stream_id)?;
            if name.is_empty() {
                return Err(StreamError::protocol(stream_id, "empty header name").into());
            }
            let value = get_string(&mut src, version, stream_id)?;
            if value.is_empty() {
                return Err(StreamError::protocol(stream_id, "empty header value").into());
            }
            for part in value.split('\0') {
                if part.is_empty() {
                    return Err(
                        StreamError::protocol(stream_id, "empty part in header value").into()
                    );
                }
                headers.append(&name, part);
            }
        }
        Ok(headers)
    }
}

fn truncated(stream_id: u32) -> StreamError {
    StreamError::protocol(stream_id, "truncated header block")
}

fn put_string(out: &mut Vec<u8>, version: Version, value: &str) -> Result<(), SessionError> {
    let bytes = to_iso8859_1(value)?;
    match version {
        Version::V2 => {
            let len = u16::try_from(bytes.len())
                .map_err(|_| SessionError::internal("header string too long for a v2 block"))?;
            out.put_u16(len);
        }
        Version::V3 => out.put_u32(bytes.len() as u32),
    }
    out.extend_from_slice(&bytes);
    Ok(())
}

fn get_string(src: &mut &[u8], version: Version, stream_id: u32) -> Result<String, ParseError> {
    let len = match version {
        Version::V2 => {
            if src.remaining() < 2 {
                return Err(truncated(stream_id).into());
            }
            src.get_u16() as usize
        }
        Version::V3 => {
            if src.remaining() < 4 {
                return Err(truncated(stream_id).into());
            }
            src.get_u32() as usize
        }
    };
    if src.remaining() < len {
        return Err(truncated(stream_id).into());
    }
    let bytes = src.copy_to_bytes(len);
    Ok(from_iso8859_1(&bytes))
}

/// ISO-8859-1 maps code points 0x00..=0xFF one-to-one onto octets; anything
/// above is unrepresentable.
fn to_iso8859_1(value: &str) -> Result<Vec<u8>, SessionError> {
    value
        .chars()
        .map(|c| {
            let cp = c as u32;
            if cp <= 0xFF {
                Ok(cp as u8)
            } else {
                Err(SessionError::internal(format!(
                    "header char {c:?} not representable in ISO-8859-1"
                )))
            }
        })
        .collect()
}

fn from_iso8859_1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
