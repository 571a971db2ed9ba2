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

//! Error types for the link engine and the file transfer layer.

use thiserror::Error;

use crate::session::ConnectionPhase;

/// Malformed byte sequence on the wire. Never fatal: the decoder drops the
/// frame in progress and resumes scanning for the next flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FramingError {
    /// An escape byte was the last byte before the closing flag
    #[error("escape byte at end of frame")]
    TrailingEscape,

    /// The protected region grew beyond the configured limit
    #[error("frame exceeds {limit} byte payload limit")]
    Oversized { limit: usize },

    /// An Information frame closed before its payload checksum arrived
    #[error("information frame without payload checksum")]
    MissingChecksum,
}

/// Errors surfaced by [`LinkSession`](crate::session::LinkSession).
#[derive(Debug, Error)]
pub enum LinkError {
    /// Transport failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The SET/UA handshake exhausted its retry budget
    #[error("connection failed after {attempts} attempts")]
    ConnectionFailed { attempts: u32 },

    /// The peer never answered DISC
    #[error("disconnect failed after {attempts} attempts")]
    DisconnectFailed { attempts: u32 },

    /// An Information frame was never acknowledged
    #[error("transmit failed after {attempts} attempts")]
    TransmitFailed { attempts: u32 },

    /// Payload larger than the session's configured maximum
    #[error("payload of {len} bytes exceeds maximum of {max}")]
    PayloadTooLarge { len: usize, max: usize },

    /// Data operation attempted outside the Open phase
    #[error("link is not open (phase: {phase:?})")]
    NotOpen { phase: ConnectionPhase },
}

impl LinkError {
    /// Annotate a transport error with the phase it happened in
    pub(crate) fn io_in(e: std::io::Error, phase: ConnectionPhase) -> Self {
        LinkError::Io(std::io::Error::new(
            e.kind(),
            format!("{} (in phase: {:?})", e, phase),
        ))
    }
}

/// Malformed application-layer packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,

    #[error("unknown packet type {0:#04x}")]
    UnknownType(u8),

    #[error("packet truncated: needed {needed} bytes, had {available}")]
    Truncated { needed: usize, available: usize },

    #[error("file size field of {0} bytes does not fit in 64 bits")]
    SizeOverflow(usize),

    #[error("control packet missing {0} field")]
    MissingField(&'static str),

    #[error("data packet of {0} bytes exceeds 16-bit length field")]
    DataTooLong(usize),

    #[error("file name of {0} bytes exceeds 255-byte field")]
    NameTooLong(usize),
}

/// Errors of the file transfer state machines.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer disconnected before the transfer finished
    #[error("peer closed the link during {0}")]
    PeerClosed(&'static str),

    /// A packet arrived that makes no sense in the current state
    #[error("unexpected packet during {0}")]
    UnexpectedPacket(&'static str),

    /// File name too long to announce within the link's payload limit
    #[error("control packet of {len} bytes exceeds payload limit of {max}")]
    ControlPacketTooLarge { len: usize, max: usize },

    /// End packet disagreed with what was received
    #[error("file size mismatch: announced {announced}, received {received}")]
    SizeMismatch { announced: u64, received: u64 },
}

/// Result type for link operations
pub type Result<T> = std::result::Result<T, LinkError>;
