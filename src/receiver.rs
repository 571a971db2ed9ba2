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
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use crate::error::TransferError;
use crate::packet::{ControlKind, Packet};
use crate::session::{LinkSession, LinkStats};

/// Used when the announced name has no usable final component
const FALLBACK_FILE_NAME: &str = "received.bin";

// ============================================================================
// States
// ============================================================================

pub struct AwaitStart;
pub struct ReceiveData;
pub struct Disconnect;

// ============================================================================
// FSM Structure
// ============================================================================

pub struct ReceiverFsm<'a, State> {
    state: PhantomData<State>,
    session: LinkSession<'a>,
    output_dir: PathBuf,
    current_file: Option<File>,
    output_path: PathBuf,
    announced_size: u64,
    bytes_received: u64,
}

// ============================================================================
// Trait
// ============================================================================

pub enum Step<'a> {
    Next(Box<dyn ReceiverState<'a> + 'a>),
    Complete(LinkStats),
}

pub trait ReceiverState<'a>: Send {
    fn step(self: Box<Self>) -> Result<Step<'a>, TransferError>;
}

// ============================================================================
// Helper to transition states
// ============================================================================

impl<'a, S> ReceiverFsm<'a, S> {
    fn transition<T>(self) -> Box<ReceiverFsm<'a, T>> {
        Box::new(ReceiverFsm {
            state: PhantomData,
            session: self.session,
            output_dir: self.output_dir,
            current_file: self.current_file,
            output_path: self.output_path,
            announced_size: self.announced_size,
            bytes_received: self.bytes_received,
        })
    }

    fn state_name() -> &'static str {
        let type_name = std::any::type_name::<S>();
        type_name.split("::").last().unwrap_or(type_name)
    }

    fn io_error(&self, e: std::io::Error) -> TransferError {
        TransferError::Io(std::io::Error::new(
            e.kind(),
            format!("{} (in state: {}, file: {})", e, Self::state_name(), self.output_path.display())
        ))
    }

    /// Tear the link down after a failure so the peer is not left waiting,
    /// then report the original error. Also finishes a teardown the peer started.
    fn abort(self, error: TransferError) -> Result<Step<'a>, TransferError> {
        warn!("Transfer failed in {}: {}", Self::state_name(), error);
        if let Err(close_error) = self.session.close() {
            warn!("Closing after failure: {}", close_error);
        }
        Err(error)
    }

    /// Next packet from the peer, or `PeerClosed` once it has disconnected
    fn next_packet(&mut self) -> Result<Packet, TransferError> {
        match self.session.receive()? {
            Some(bytes) => Ok(Packet::decode(&bytes)?),
            None => Err(TransferError::PeerClosed(Self::state_name())),
        }
    }
}

/// Final path component of `name`, so a peer cannot write outside the output directory.
fn local_file_name(name: &str) -> &str {
    Path::new(name)
        .file_name()
        .and_then(|base| base.to_str())
        .unwrap_or(FALLBACK_FILE_NAME)
}

impl ReceiverFsm<'_, AwaitStart> {
    /// Returns true once a Start packet has opened the output file.
    fn await_start(&mut self) -> Result<bool, TransferError> {
        match self.next_packet()? {
            Packet::Control(start) if start.kind == ControlKind::Start => {
                self.output_path = self.output_dir.join(local_file_name(&start.file_name));
                let file = File::create(&self.output_path).map_err(|e| self.io_error(e))?;
                self.current_file = Some(file);
                self.announced_size = start.file_size;
                self.bytes_received = 0;

                info!("Receiving '{}' ({} bytes) into {}", start.file_name, start.file_size, self.output_path.display());
                Ok(true)
            }
            Packet::Control(_) => Err(TransferError::UnexpectedPacket("AwaitStart")),
            Packet::Data(data) => {
                debug!("Ignoring {} byte data packet before start", data.len());
                Ok(false)
            }
        }
    }
}

impl ReceiverFsm<'_, ReceiveData> {
    /// Returns true once the End packet has been checked and the file flushed.
    fn receive_data(&mut self) -> Result<bool, TransferError> {
        match self.next_packet()? {
            Packet::Data(data) => {
                let written = match self.current_file {
                    Some(ref mut file) => file.write_all(&data),
                    None => Ok(()),
                };
                written.map_err(|e| self.io_error(e))?;
                self.bytes_received += data.len() as u64;
                debug!("Received: data packet ({} bytes, {}/{})", data.len(), self.bytes_received, self.announced_size);
                Ok(false)
            }
            Packet::Control(end) if end.kind == ControlKind::End => {
                if end.file_size != self.announced_size {
                    warn!("End packet announces {} bytes, start announced {}", end.file_size, self.announced_size);
                }
                if self.bytes_received != end.file_size {
                    return Err(TransferError::SizeMismatch {
                        announced: end.file_size,
                        received: self.bytes_received,
                    });
                }

                let flushed = match self.current_file.take() {
                    Some(mut file) => file.flush(),
                    None => Ok(()),
                };
                flushed.map_err(|e| self.io_error(e))?;

                info!("Received '{}' ({} bytes)", self.output_path.display(), self.bytes_received);
                Ok(true)
            }
            Packet::Control(_) => Err(TransferError::UnexpectedPacket("ReceiveData")),
        }
    }
}

// ============================================================================
// State Implementations
// ============================================================================

impl<'a> ReceiverState<'a> for ReceiverFsm<'a, AwaitStart> {
    fn step(self: Box<Self>) -> Result<Step<'a>, TransferError> {
        let mut fsm = *self;
        match fsm.await_start() {
            Ok(true) => Ok(Step::Next(fsm.transition::<ReceiveData>())),
            Ok(false) => Ok(Step::Next(Box::new(fsm))),
            Err(e) => fsm.abort(e),
        }
    }
}

impl<'a> ReceiverState<'a> for ReceiverFsm<'a, ReceiveData> {
    fn step(self: Box<Self>) -> Result<Step<'a>, TransferError> {
        let mut fsm = *self;
        match fsm.receive_data() {
            Ok(true) => Ok(Step::Next(fsm.transition::<Disconnect>())),
            Ok(false) => Ok(Step::Next(Box::new(fsm))),
            Err(e) => fsm.abort(e),
        }
    }
}

impl<'a> ReceiverState<'a> for ReceiverFsm<'a, Disconnect> {
    fn step(self: Box<Self>) -> Result<Step<'a>, TransferError> {
        let mut fsm = *self;

        match fsm.session.receive() {
            Ok(Some(bytes)) => {
                debug!("Ignoring {} byte packet after end of file", bytes.len());
                Ok(Step::Next(Box::new(fsm)))
            }
            Ok(None) => {
                let stats = fsm.session.close()?;
                Ok(Step::Complete(stats))
            }
            Err(e) => fsm.abort(e.into()),
        }
    }
}

// ============================================================================
// Constructor & Runner
// ============================================================================

impl<'a> ReceiverFsm<'a, AwaitStart> {
    /// Build a receiver over an open responder session.
    pub fn new(session: LinkSession<'a>, output_dir: PathBuf) -> Box<dyn ReceiverState<'a> + 'a> {
        Box::new(ReceiverFsm {
            state: PhantomData::<AwaitStart>,
            session,
            output_dir,
            current_file: None,
            output_path: PathBuf::new(),
            announced_size: 0,
            bytes_received: 0,
        })
    }
}

/// Receive one file into `output_dir` and finish the peer's teardown.
pub fn receive_file(session: LinkSession<'_>, output_dir: PathBuf) -> Result<LinkStats, TransferError> {
    let mut state = ReceiverFsm::<AwaitStart>::new(session, output_dir);
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
