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

//! Byte stuffing of the protected region (payload and payload checksum).
//!
//! `FLAG` becomes `ESC 0x5E` and `ESC` becomes `ESC 0x5D`; every other byte
//! passes through unchanged.

use crate::error::FramingError;
use crate::protocol::{ESC, ESC_MASK, FLAG};

/// Append the stuffed form of `data` to `out`.
pub fn stuff_into(data: &[u8], out: &mut Vec<u8>) {
    out.reserve(data.len());
    for &byte in data {
        match byte {
            FLAG | ESC => {
                out.push(ESC);
                out.push(byte ^ ESC_MASK);
            }
            _ => out.push(byte),
        }
    }
}

/// Stuff `data` into a new buffer sized for the worst case.
pub fn stuff(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 2);
    stuff_into(data, &mut out);
    out
}

/// Incremental destuffer, fed one byte at a time.
#[derive(Debug, Default, Clone)]
pub struct Destuffer {
    escaped: bool,
}

impl Destuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one byte of the protected region. Returns the original byte
    /// once it is complete, or `None` if `byte` was an escape.
    pub fn feed(&mut self, byte: u8) -> Option<u8> {
        if self.escaped {
            self.escaped = false;
            Some(byte ^ ESC_MASK)
        } else if byte == ESC {
            self.escaped = true;
            None
        } else {
            Some(byte)
        }
    }

    /// True while an escape byte is waiting for its partner
    pub fn is_pending(&self) -> bool {
        self.escaped
    }

    /// Check the region ended cleanly and reset for the next frame.
    pub fn finish(&mut self) -> Result<(), FramingError> {
        let pending = std::mem::take(&mut self.escaped);
        if pending {
            Err(FramingError::TrailingEscape)
        } else {
            Ok(())
        }
    }

    pub fn reset(&mut self) {
        self.escaped = false;
    }
}

/// Destuff a complete protected region.
pub fn destuff(data: &[u8]) -> Result<Vec<u8>, FramingError> {
    let mut destuffer = Destuffer::new();
    let mut out = Vec::with_capacity(data.len());
    for &byte in data {
        if let Some(b) = destuffer.feed(byte) {
            out.push(b);
        }
    }
    destuffer.finish()?;
    Ok(out)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stuff_reserved_bytes() {
        assert_eq!(stuff(&[FLAG]), vec![ESC, 0x5E]);
        assert_eq!(stuff(&[ESC]), vec![ESC, 0x5D]);
        assert_eq!(
            stuff(&[0x01, FLAG, 0x02, ESC, 0x03]),
            vec![0x01, ESC, 0x5E, 0x02, ESC, 0x5D, 0x03]
        );
    }

    #[test]
    fn test_stuff_passthrough() {
        let data = b"plain text without reserved bytes";
        assert_eq!(stuff(data), data.to_vec());
        assert!(stuff(&[]).is_empty());
    }

    #[test]
    fn test_destuff_every_byte_value() {
        let data: Vec<u8> = (0..=255u8).collect();
        let stuffed = stuff(&data);
        assert_eq!(stuffed.len(), 256 + 2);
        assert!(!stuffed.contains(&FLAG));
        assert_eq!(destuff(&stuffed).unwrap(), data);
    }

    #[test]
    fn test_destuff_trailing_escape() {
        assert_eq!(destuff(&[0x01, ESC]), Err(FramingError::TrailingEscape));
    }

    #[test]
    fn test_destuffer_incremental() {
        let mut d = Destuffer::new();
        assert_eq!(d.feed(0x41), Some(0x41));
        assert_eq!(d.feed(ESC), None);
        assert!(d.is_pending());
        assert_eq!(d.feed(0x5E), Some(FLAG));
        assert!(!d.is_pending());
        assert_eq!(d.finish(), Ok(()));

        d.feed(ESC);
        assert_eq!(d.finish(), Err(FramingError::TrailingEscape));
        assert!(!d.is_pending(), "finish resets the escape state");
    }
}
