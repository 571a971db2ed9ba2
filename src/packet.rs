// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Application packets carried as Information payloads.
//!
//! ```plain
//! Control: TYPE(2=start|3=end) { FIELD_ID LEN VALUE }*
//!          field 0 = file size (big-endian, LEN bytes), field 1 = file name
//! Data:    TYPE(1) LEN_HI LEN_LO DATA[LEN]
//! ```

use crate::error::PacketError;

pub const PKT_DATA: u8 = 1;
pub const PKT_START: u8 = 2;
pub const PKT_END: u8 = 3;

pub const FIELD_FILE_SIZE: u8 = 0;
pub const FIELD_FILE_NAME: u8 = 1;

/// Bytes a data packet adds in front of its data
pub const DATA_HEADER_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPacket {
    pub kind: ControlKind,
    pub file_size: u64,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Control(ControlPacket),
    Data(Vec<u8>),
}

impl ControlPacket {
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let name = self.file_name.as_bytes();
        if name.len() > u8::MAX as usize {
            return Err(PacketError::NameTooLong(name.len()));
        }
        let size = size_bytes(self.file_size);

        let mut out = Vec::with_capacity(5 + size.len() + name.len());
        out.push(match self.kind {
            ControlKind::Start => PKT_START,
            ControlKind::End => PKT_END,
        });
        out.extend_from_slice(&[FIELD_FILE_SIZE, size.len() as u8]);
        out.extend_from_slice(&size);
        out.extend_from_slice(&[FIELD_FILE_NAME, name.len() as u8]);
        out.extend_from_slice(name);
        Ok(out)
    }

    fn decode(kind: ControlKind, mut fields: &[u8]) -> Result<Self, PacketError> {
        let mut file_size = None;
        let mut file_name = None;

        while !fields.is_empty() {
            if fields.len() < 2 {
                return Err(PacketError::Truncated { needed: 2, available: fields.len() });
            }
            let (id, len) = (fields[0], fields[1] as usize);
            let value = fields
                .get(2..2 + len)
                .ok_or(PacketError::Truncated { needed: 2 + len, available: fields.len() })?;

            match id {
                FIELD_FILE_SIZE => {
                    if len > 8 {
                        return Err(PacketError::SizeOverflow(len));
                    }
                    file_size = Some(value.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64));
                }
                FIELD_FILE_NAME => {
                    file_name = Some(String::from_utf8_lossy(value).into_owned());
                }
                _ => {}
            }
            fields = &fields[2 + len..];
        }

        Ok(ControlPacket {
            kind,
            file_size: file_size.ok_or(PacketError::MissingField("file size"))?,
            file_name: file_name.ok_or(PacketError::MissingField("file name"))?,
        })
    }
}

/// Big-endian bytes of `size` without leading zeros, at least one byte.
fn size_bytes(size: u64) -> Vec<u8> {
    let bytes = size.to_be_bytes();
    let skip = (size.leading_zeros() / 8).min(7) as usize;
    bytes[skip..].to_vec()
}

pub fn encode_data(data: &[u8]) -> Result<Vec<u8>, PacketError> {
    let len = u16::try_from(data.len()).map_err(|_| PacketError::DataTooLong(data.len()))?;
    let mut out = Vec::with_capacity(DATA_HEADER_LEN + data.len());
    out.push(PKT_DATA);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(data);
    Ok(out)
}

impl Packet {
    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        let (&kind, rest) = bytes.split_first().ok_or(PacketError::Empty)?;
        match kind {
            PKT_DATA => {
                if rest.len() < 2 {
                    return Err(PacketError::Truncated { needed: DATA_HEADER_LEN, available: bytes.len() });
                }
                let len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
                let data = rest
                    .get(2..2 + len)
                    .ok_or(PacketError::Truncated { needed: DATA_HEADER_LEN + len, available: bytes.len() })?;
                Ok(Packet::Data(data.to_vec()))
            }
            PKT_START => Ok(Packet::Control(ControlPacket::decode(ControlKind::Start, rest)?)),
            PKT_END => Ok(Packet::Control(ControlPacket::decode(ControlKind::End, rest)?)),
            other => Err(PacketError::UnknownType(other)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
