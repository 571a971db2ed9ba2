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

use std::marker::PhantomData;
use std::fs::File;
use std::path::PathBuf;
use std::io::Read;
use tracing::{debug, info, warn};
use crate::error::TransferError;
use crate::packet::{encode_data, ControlKind, ControlPacket, DATA_HEADER_LEN};
use crate::session::{LinkSession, LinkStats};

// ============================================================================
// States
// ============================================================================

pub struct SendStart;
pub struct SendData;
pub struct SendEnd;
pub struct Disconnect;

// ============================================================================
// FSM Structure
// ============================================================================

pub struct SenderFsm<'a, State> {
    state: PhantomData<State>,
    session: LinkSession<'a>,
    path: PathBuf,
    current_file: Option<File>,
    file_name: String,
    file_size: u64,
    buffer: Vec<u8>,
    bytes_sent: u64,
}

// ============================================================================
// Trait
// ============================================================================

pub enum Step<'a> {
    Next(Box<dyn SenderState<'a> + 'a>),
    Complete(LinkStats),
}

pub trait SenderState<'a>: Send {
    fn step(self: Box<Self>) -> Result<Step<'a>, TransferError>;
}

// ============================================================================
// Helper to transition states
// ============================================================================

impl<'a, S> SenderFsm<'a, S> {
    fn transition<T>(self) -> Box<SenderFsm<'a, T>> {
        Box::new(SenderFsm {
            state: PhantomData,
            session: self.session,
            path: self.path,
            current_file: self.current_file,
            file_name: self.file_name,
            file_size: self.file_size,
            buffer: self.buffer,
            bytes_sent: self.bytes_sent,
        })
    }

    fn state_name() -> &'static str {
        let type_name = std::any::type_name::<S>();
        type_name.split("::").last().unwrap_or(type_name)
    }

    fn io_error(&self, e: std::io::Error) -> TransferError {
        TransferError::Io(std::io::Error::new(
            e.kind(),
            format!("{} (in state: {}, file: {})", e, Self::state_name(), self.path.display())
        ))
    }

    fn control_packet(&self, kind: ControlKind) -> Result<Vec<u8>, TransferError> {
        let packet = ControlPacket {
            kind,
            file_size: self.file_size,
            file_name: self.file_name.clone(),
        }
        .encode()?;

        let max = self.session.config().max_payload;
        if packet.len() > max {
            return Err(TransferError::ControlPacketTooLarge { len: packet.len(), max });
        }
        Ok(packet)
    }

    fn send_control(&mut self, kind: ControlKind) -> Result<(), TransferError> {
        let packet = self.control_packet(kind)?;
        self.session.send(&packet)?;
        debug!("Sent: {:?} packet for '{}' ({} bytes)", kind, self.file_name, self.file_size);
        Ok(())
    }

    /// Tear the link down after a failure so the peer is not left waiting,
    /// then report the original error.
    fn abort(self, error: TransferError) -> Result<Step<'a>, TransferError> {
        warn!("Transfer failed in {}: {}", Self::state_name(), error);
        if let Err(close_error) = self.session.close() {
            warn!("Closing after failure: {}", close_error);
        }
        Err(error)
    }
}

impl<'a> SenderFsm<'a, SendStart> {
    /// Open the file and announce it. The End packet has the same length as
    /// the Start packet, so checking it here covers both.
    fn announce(&mut self) -> Result<(), TransferError> {
        let file = File::open(&self.path).map_err(|e| self.io_error(e))?;
        self.file_size = file.metadata().map_err(|e| self.io_error(e))?.len();
        self.file_name = self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.current_file = Some(file);

        self.send_control(ControlKind::Start)?;
        info!("Sending '{}' ({} bytes)", self.file_name, self.file_size);
        Ok(())
    }
}

impl SenderFsm<'_, SendData> {
    /// Send the next chunk. Returns the number of file bytes sent, 0 at end of file.
    fn send_chunk(&mut self) -> Result<usize, TransferError> {
        let bytes_read = match self.current_file {
            Some(ref mut file) => file.read(&mut self.buffer),
            None => Ok(0),
        };
        let bytes_read = bytes_read.map_err(|e| self.io_error(e))?;
        if bytes_read == 0 {
            return Ok(0);
        }

        let packet = encode_data(&self.buffer[..bytes_read])?;
        self.session.send(&packet)?;
        self.bytes_sent += bytes_read as u64;
        debug!("Sent: data packet ({} bytes, {}/{})", bytes_read, self.bytes_sent, self.file_size);
        Ok(bytes_read)
    }
}

// ============================================================================
// State Implementations
// ============================================================================

impl<'a> SenderState<'a> for SenderFsm<'a, SendStart> {
    fn step(self: Box<Self>) -> Result<Step<'a>, TransferError> {
        let mut fsm = *self;
        match fsm.announce() {
            Ok(()) => Ok(Step::Next(fsm.transition::<SendData>())),
            Err(e) => fsm.abort(e),
        }
    }
}

impl<'a> SenderState<'a> for SenderFsm<'a, SendData> {
    fn step(self: Box<Self>) -> Result<Step<'a>, TransferError> {
        let mut fsm = *self;
        match fsm.send_chunk() {
            Ok(0) => {
                fsm.current_file = None;
                Ok(Step::Next(fsm.transition::<SendEnd>()))
            }
            Ok(_) => Ok(Step::Next(Box::new(fsm))),
            Err(e) => fsm.abort(e),
        }
    }
}

impl<'a> SenderState<'a> for SenderFsm<'a, SendEnd> {
    fn step(self: Box<Self>) -> Result<Step<'a>, TransferError> {
        let mut fsm = *self;
        match fsm.send_control(ControlKind::End) {
            Ok(()) => {
                info!("Sent '{}' ({} bytes)", fsm.file_name, fsm.bytes_sent);
                Ok(Step::Next(fsm.transition::<Disconnect>()))
            }
            Err(e) => fsm.abort(e),
        }
    }
}

impl<'a> SenderState<'a> for SenderFsm<'a, Disconnect> {
    fn step(self: Box<Self>) -> Result<Step<'a>, TransferError> {
        let fsm = *self;
        let stats = fsm.session.close()?;
        Ok(Step::Complete(stats))
    }
}

// ============================================================================
// Constructor & Runner
// ============================================================================

impl<'a> SenderFsm<'a, SendStart> {
    /// Build a sender over an open initiator session.
    pub fn new(session: LinkSession<'a>, path: PathBuf) -> Box<dyn SenderState<'a> + 'a> {
        let chunk = session
            .config()
            .max_payload
            .saturating_sub(DATA_HEADER_LEN)
            .clamp(1, u16::MAX as usize);

        Box::new(SenderFsm {
            state: PhantomData::<SendStart>,
            session,
            path,
            current_file: None,
            file_name: String::new(),
            file_size: 0,
            buffer: vec![0; chunk],
            bytes_sent: 0,
        })
    }
}

/// Send one file and close the link.
pub fn send_file(session: LinkSession<'_>, path: PathBuf) -> Result<LinkStats, TransferError> {
    let mut state = SenderFsm::<SendStart>::new(session, path);
    loop {
        match state.step()? {
            Step::Next(next) => state = next,
            Step::Complete(stats) => return Ok(stats),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
