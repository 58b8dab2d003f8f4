//! SETTINGS: a batch of id/value configuration pairs.
//!
//! Each entry is a 32-bit `flags(8) | id(24)` word and a 32-bit value. In v2
//! that word is carried little-endian on the wire (the historical quirk the
//! rest of the protocol family later corrected), so the codec byte-swaps the
//! whole word for v2 and uses it verbatim for v3.

use crate::error::{ParseError, SessionError};
use crate::frames::{control_frame_buffer, ControlFrameType, Version, FLAG_CLEAR_PERSISTED};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_enum::TryFromPrimitive;

/// Per-entry flag: the receiver should persist this value.
pub const FLAG_SETTINGS_PERSIST_VALUE: u8 = 0x01;
/// Per-entry flag: this value was previously persisted by the sender.
pub const FLAG_SETTINGS_PERSISTED: u8 = 0x02;

/// Well-known setting identifiers.
#[derive(TryFromPrimitive)]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsId {
    UploadBandwidth = 1,
    DownloadBandwidth = 2,
    RoundTripTime = 3,
    MaxConcurrentStreams = 4,
    CurrentCwnd = 5,
    DownloadRetransRate = 6,
    InitialWindowSize = 7,
    ClientCertificateVectorSize = 8,
}

/// One settings entry. The id is kept raw so unknown identifiers survive a
/// round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    pub id: u32,
    pub flags: u8,
    pub value: u32,
}

impl Setting {
    pub fn new(id: SettingsId, value: u32) -> Self {
        Setting {
            id: id as u32,
            flags: 0,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub version: Version,
    pub flags: u8,
    pub settings: Vec<Setting>,
}

impl Settings {
    pub fn is_clear_persisted(&self) -> bool {
        self.flags & FLAG_CLEAR_PERSISTED != 0
    }

    /// Look up a well-known setting.
    pub fn get(&self, id: SettingsId) -> Option<&Setting> {
        self.settings.iter().find(|s| s.id == id as u32)
    }

    pub(crate) fn decode(version: Version, flags: u8, body: &Bytes) -> Result<Self, ParseError> {
        if flags & !FLAG_CLEAR_PERSISTED != 0 {
            return Err(SessionError::protocol("invalid SETTINGS flags").into());
        }
        if body.len() < 4 {
            return Err(SessionError::protocol("SETTINGS body too short").into());
        }
        let mut src = &body[..];
        let count = src.get_u32() as usize;
        if body.len() != 4 + count * 8 {
            return Err(SessionError::protocol("SETTINGS body length mismatch").into());
        }
        let mut settings = Vec::with_capacity(count);
        for _ in 0..count {
            let word = match version {
                Version::V2 => src.get_u32().swap_bytes(),
                Version::V3 => src.get_u32(),
            };
            settings.push(Setting {
                id: word & 0x00FF_FFFF,
                flags: (word >> 24) as u8,
                value: src.get_u32(),
            });
        }
        Ok(Settings {
            version,
            flags,
            settings,
        })
    }

    pub(crate) fn encode(&self) -> Result<Bytes, SessionError> {
        let mut body = BytesMut::with_capacity(4 + self.settings.len() * 8);
        body.put_u32(self.settings.len() as u32);
        for setting in &self.settings {
            let word = (u32::from(setting.flags) << 24) | (setting.id & 0x00FF_FFFF);
            body.put_u32(match self.version {
                Version::V2 => word.swap_bytes(),
                Version::V3 => word,
            });
            body.put_u32(setting.value);
        }
        control_frame_buffer(self.version, ControlFrameType::Settings, self.flags, &body)
    }
}
