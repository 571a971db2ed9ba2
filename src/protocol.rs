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

//! Link protocol constants

use std::time::Duration;

/// Frame delimiter - opens and closes every frame
pub const FLAG: u8 = 0x7E;

/// Escape - next byte inside the protected region was XORed with `ESC_MASK`
pub const ESC: u8 = 0x7D;

/// Mask applied to an escaped byte
pub const ESC_MASK: u8 = 0x20;

/// Address carried by every frame the initiator sends
pub const ADDR_INITIATOR: u8 = 0x03;

/// Address carried by every frame the responder sends
pub const ADDR_RESPONDER: u8 = 0x01;

/// Set up - initiator requests a connection
pub const C_SET: u8 = 0x03;

/// Unnumbered acknowledgment - answers SET, and closes the DISC exchange
pub const C_UA: u8 = 0x07;

/// Disconnect - either side tears the link down
pub const C_DISC: u8 = 0x0B;

/// Information frame, sequence 0
pub const C_I0: u8 = 0x00;

/// Information frame, sequence 1
pub const C_I1: u8 = 0x40;

/// Receiver ready, expecting sequence 0
pub const C_RR0: u8 = 0x05;

/// Receiver ready, expecting sequence 1
pub const C_RR1: u8 = 0x85;

/// Reject, expecting sequence 0
pub const C_REJ0: u8 = 0x01;

/// Reject, expecting sequence 1
pub const C_REJ1: u8 = 0x81;

/// Supervisory frame length on the wire: FLAG A C BCC1 FLAG
pub const SUPERVISORY_FRAME_LEN: usize = 5;

/// Default largest Information payload, before stuffing
pub const MAX_PAYLOAD_SIZE: usize = 1000;

/// Largest configurable payload: one full data packet, 16-bit length plus its header
pub const MAX_PAYLOAD_LIMIT: usize = u16::MAX as usize + 3;

/// Shortest retransmission timeout; a zero deadline would expire before any read
pub const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Default number of transmissions of a frame before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default retransmission timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
