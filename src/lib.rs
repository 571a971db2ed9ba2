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

//! Reliable point-to-point data link over a serial line.
//!
//! Frames are HDLC-style (flag delimited, byte stuffed, XOR checked) and
//! carried with stop-and-wait ARQ. [`LinkSession`] is the entry point; the
//! `sender` and `receiver` state machines move a file across an open link.

pub mod protocol;
pub mod stuffing;
pub mod checksum;
pub mod frame;
pub mod timer;
pub mod config;
pub mod error;
pub mod serial;
pub mod session;
mod connection;
mod arq;
pub mod packet;
pub mod sender;
pub mod receiver;

pub use config::{LinkConfig, RetryBudget, Role};
pub use error::{FramingError, LinkError, PacketError, TransferError};
pub use frame::{ControlField, Frame, FrameDecoder, Sequence};
pub use serial::{RealSerialPort, SerialPort};
pub use session::{ConnectionPhase, LinkSession, LinkStats};
