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

//! Link session: the object the application talks to.
//!
//! A session borrows the transport for its whole life. It is created by
//! [`LinkSession::open`], which runs the SET/UA handshake, and consumed by
//! [`LinkSession::close`], which runs the DISC/DISC/UA teardown. Dropping a
//! session without closing it leaves the peer waiting.
//!
//! The handshakes live in `connection.rs` and the stop-and-wait data path in
//! `arq.rs`; this file holds the state they share and the frame I/O.

use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::config::{LinkConfig, Role};
use crate::error::{LinkError, Result};
use crate::frame::{ControlField, DecodedFrame, Frame, FrameDecoder, Sequence};
use crate::protocol::MIN_TIMEOUT;
use crate::serial::SerialPort;
use crate::timer::Deadline;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Closed,
    Establishing,
    Open,
    /// Teardown started, locally or by the peer's DISC
    Closing,
}

/// Counters reported when the link is closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub retransmissions: u64,
    pub timeouts: u64,
    pub rejects_sent: u64,
    pub rejects_received: u64,
    pub duplicates: u64,
    /// Frames carrying our own address (line echo)
    pub ignored_frames: u64,
    /// Frames dropped for a bad header checksum
    pub header_errors: u64,
    pub framing_errors: u64,
}

// ============================================================================
// Session
// ============================================================================

pub struct LinkSession<'a> {
    pub(crate) serial: &'a mut dyn SerialPort,
    pub(crate) config: LinkConfig,
    pub(crate) phase: ConnectionPhase,
    /// Sequence of the next Information frame we send
    pub(crate) send_seq: Sequence,
    /// Sequence we expect on the next Information frame from the peer
    pub(crate) recv_seq: Sequence,
    pub(crate) peer_disconnected: bool,
    pub(crate) stats: LinkStats,
    decoder: FrameDecoder,
}

impl<'a> LinkSession<'a> {
    /// Establish the link over `serial`.
    ///
    /// An initiator retries SET within its retry budget and fails with
    /// [`LinkError::ConnectionFailed`]; a responder waits for SET without a
    /// deadline. On failure the transport is simply handed back to the caller.
    pub fn open(serial: &'a mut dyn SerialPort, config: LinkConfig) -> Result<Self> {
        let decoder = FrameDecoder::new(config.max_payload);
        let mut session = LinkSession {
            serial,
            config,
            phase: ConnectionPhase::Closed,
            send_seq: Sequence::Zero,
            recv_seq: Sequence::Zero,
            peer_disconnected: false,
            stats: LinkStats::default(),
            decoder,
        };
        session.establish()?;
        Ok(session)
    }

    /// Send one payload, blocking until the peer acknowledges it.
    ///
    /// Returns the number of payload bytes delivered. A
    /// [`LinkError::TransmitFailed`] leaves the session open.
    pub fn send(&mut self, payload: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        if payload.len() > self.config.max_payload {
            return Err(LinkError::PayloadTooLarge {
                len: payload.len(),
                max: self.config.max_payload,
            });
        }
        self.transmit_information(payload)
    }

    /// Block until the next in-order payload arrives.
    ///
    /// Returns `Ok(None)` once the peer has sent DISC; call [`close`](Self::close)
    /// to finish the teardown.
    pub fn receive(&mut self) -> Result<Option<Vec<u8>>> {
        if self.peer_disconnected {
            return Ok(None);
        }
        self.ensure_open()?;
        self.await_information()
    }

    /// Run the teardown handshake and release the transport.
    pub fn close(mut self) -> Result<LinkStats> {
        self.terminate()?;
        Ok(self.stats())
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn send_sequence(&self) -> Sequence {
        self.send_seq
    }

    pub fn receive_sequence(&self) -> Sequence {
        self.recv_seq
    }

    pub fn stats(&self) -> LinkStats {
        LinkStats {
            header_errors: self.decoder.header_errors(),
            ..self.stats.clone()
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.phase == ConnectionPhase::Open {
            Ok(())
        } else {
            Err(LinkError::NotOpen { phase: self.phase })
        }
    }

    // ========================================================================
    // Frame I/O
    // ========================================================================

    /// Write already encoded frame bytes.
    pub(crate) fn transmit(&mut self, bytes: &[u8]) -> Result<()> {
        self.serial
            .write_all(bytes)
            .map_err(|e| LinkError::io_in(e, self.phase))?;
        self.stats.frames_sent += 1;
        Ok(())
    }

    pub(crate) fn send_supervisory(&mut self, control: ControlField) -> Result<()> {
        let frame = Frame::supervisory(self.config.role.address(), control);
        self.transmit(&frame.encode())?;
        debug!("Sent: {:?}", control);
        Ok(())
    }

    /// Read bytes until a frame from the peer completes.
    ///
    /// With a deadline, returns `Ok(None)` once it passes. Without one, waits
    /// indefinitely, polling the transport once per retry timeout.
    pub(crate) fn next_frame(&mut self, deadline: Option<Deadline>) -> Result<Option<DecodedFrame>> {
        let mut buf = [0u8; 1];
        loop {
            let wait = match deadline {
                Some(d) => match d.remaining() {
                    Some(left) => left,
                    None => return Ok(None),
                },
                None => self.poll_interval(),
            };

            match self.serial.read_timeout(&mut buf, wait) {
                Ok(0) => continue,
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    if deadline.is_some() {
                        return Ok(None);
                    }
                    trace!("Line idle");
                    continue;
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(LinkError::io_in(e, self.phase)),
            }

            match self.decoder.push(buf[0]) {
                Ok(Some(decoded)) => {
                    if decoded.frame.address != self.config.role.peer_address() {
                        trace!("Ignoring {:?} carrying our own address", decoded.frame.control);
                        self.stats.ignored_frames += 1;
                        continue;
                    }
                    self.stats.frames_received += 1;
                    debug!(
                        "Received: {:?} ({} bytes, valid: {})",
                        decoded.frame.control,
                        decoded.frame.payload.len(),
                        decoded.valid
                    );
                    return Ok(Some(decoded));
                }
                Ok(None) => {}
                Err(e) => {
                    self.stats.framing_errors += 1;
                    warn!("Discarding frame: {}", e);
                }
            }
        }
    }

    fn poll_interval(&self) -> Duration {
        self.config.retry.timeout.max(MIN_TIMEOUT)
    }
}

// ============================================================================
// Tests
// ============================================================================
