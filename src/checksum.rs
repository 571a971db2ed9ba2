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

//! Block check characters.

/// BCC1: header checksum over address and control
pub fn header_checksum(address: u8, control: u8) -> u8 {
    address ^ control
}

/// BCC2: XOR of every payload byte, 0 for an empty payload
pub fn payload_checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc ^ b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_checksum() {
        assert_eq!(header_checksum(0x03, 0x03), 0x00);
        assert_eq!(header_checksum(0x01, 0x07), 0x06);
        assert_eq!(header_checksum(0x03, 0x0B), 0x08);
    }

    #[test]
    fn test_payload_checksum() {
        assert_eq!(payload_checksum(&[]), 0);
        assert_eq!(payload_checksum(b"AB"), 0x41 ^ 0x42);
        assert_eq!(payload_checksum(&[0xFF, 0xFF]), 0);
    }

    #[test]
    fn test_single_bit_flip_detected() {
        let payload: Vec<u8> = (0..64u8).map(|i| i.wrapping_mul(37)).collect();
        let good = payload_checksum(&payload);
        for i in 0..payload.len() {
            for bit in 0..8 {
                let mut damaged = payload.clone();
                damaged[i] ^= 1 << bit;
                assert_ne!(payload_checksum(&damaged), good, "byte {} bit {}", i, bit);
            }
        }

        for bit in 0..8 {
            assert_ne!(header_checksum(0x03 ^ (1 << bit), 0x40), header_checksum(0x03, 0x40));
            assert_ne!(header_checksum(0x03, 0x40 ^ (1 << bit)), header_checksum(0x03, 0x40));
        }
    }
}
