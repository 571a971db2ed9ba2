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

//! Connection establishment and teardown.
//!
//! ```plain
//! open:   Initiator --SET-->  Responder      close:  Initiator --DISC--> Responder
//!         Initiator <--UA---  Responder              Initiator <--DISC-- Responder
//!                                                    Initiator --UA----> Responder
//! ```
//!
//! The initiator retransmits on timeout within its retry budget. The final
//! UA of the close is never acknowledged.

use tracing::{debug, info, warn};

use crate::config::Role;
use crate::error::{LinkError, Result};
use crate::frame::ControlField;
use crate::session::{ConnectionPhase, LinkSession};
use crate::timer::Deadline;

/// Outcome of one timed wait for a reply
enum Reply {
    Expected,
    /// The peer repeated its previous frame, ours was probably lost
    Repeat,
    Timeout,
}

impl LinkSession<'_> {
    pub(crate) fn establish(&mut self) -> Result<()> {
        self.phase = ConnectionPhase::Establishing;
        info!("Establishing link as {:?}", self.config.role);

        match self.config.role {
            Role::Initiator => self.establish_initiator()?,
            Role::Responder => self.establish_responder()?,
        }

        self.phase = ConnectionPhase::Open;
        info!("Link established");
        Ok(())
    }

    fn establish_initiator(&mut self) -> Result<()> {
        let budget = self.config.retry;
        for attempt in 1..=budget.max_attempts {
            if attempt > 1 {
                self.stats.retransmissions += 1;
                warn!("No UA, resending SET (attempt {}/{})", attempt, budget.max_attempts);
            }
            self.send_supervisory(ControlField::Set)?;

            match self.await_reply(ControlField::UnnumberedAck, None)? {
                Reply::Expected => return Ok(()),
                _ => self.stats.timeouts += 1,
            }
        }

        self.phase = ConnectionPhase::Closed;
        Err(LinkError::ConnectionFailed { attempts: budget.max_attempts })
    }

    fn establish_responder(&mut self) -> Result<()> {
        loop {
            let Some(decoded) = self.next_frame(None)? else {
                continue;
            };
            if decoded.frame.control == ControlField::Set {
                return self.send_supervisory(ControlField::UnnumberedAck);
            }
            debug!("Waiting for SET, ignoring {:?}", decoded.frame.control);
        }
    }

    pub(crate) fn terminate(&mut self) -> Result<()> {
        if self.phase == ConnectionPhase::Closed {
            return Ok(());
        }
        self.phase = ConnectionPhase::Closing;
        info!("Closing link");

        let result = match self.config.role {
            Role::Initiator => self.terminate_initiator(),
            Role::Responder => self.terminate_responder(),
        };

        self.phase = ConnectionPhase::Closed;
        if result.is_ok() {
            info!("Link closed");
        }
        result
    }

    fn terminate_initiator(&mut self) -> Result<()> {
        let budget = self.config.retry;
        for attempt in 1..=budget.max_attempts {
            if attempt > 1 {
                self.stats.retransmissions += 1;
                warn!("No DISC, resending DISC (attempt {}/{})", attempt, budget.max_attempts);
            }
            self.send_supervisory(ControlField::Disconnect)?;

            match self.await_reply(ControlField::Disconnect, None)? {
                Reply::Expected => {
                    self.peer_disconnected = true;
                    return self.send_supervisory(ControlField::UnnumberedAck);
                }
                _ => self.stats.timeouts += 1,
            }
        }

        Err(LinkError::DisconnectFailed { attempts: budget.max_attempts })
    }

    fn terminate_responder(&mut self) -> Result<()> {
        while !self.peer_disconnected {
            let Some(decoded) = self.next_frame(None)? else {
                continue;
            };
            if decoded.frame.control == ControlField::Disconnect {
                self.peer_disconnected = true;
            } else {
                debug!("Waiting for DISC, ignoring {:?}", decoded.frame.control);
            }
        }

        let budget = self.config.retry;
        for attempt in 1..=budget.max_attempts {
            if attempt > 1 {
                self.stats.retransmissions += 1;
            }
            self.send_supervisory(ControlField::Disconnect)?;

            match self.await_reply(ControlField::UnnumberedAck, Some(ControlField::Disconnect))? {
                Reply::Expected => return Ok(()),
                Reply::Repeat => debug!("Peer repeated DISC"),
                Reply::Timeout => self.stats.timeouts += 1,
            }
        }

        // The initiator leaves right after its UA, so a lost UA is not worth failing over
        warn!("No final UA after {} attempts, closing anyway", budget.max_attempts);
        Ok(())
    }

    /// Wait one retry timeout for `expected`, ignoring everything else except
    /// `repeat`.
    fn await_reply(&mut self, expected: ControlField, repeat: Option<ControlField>) -> Result<Reply> {
        let deadline = Deadline::after(self.config.retry.timeout);
        while let Some(decoded) = self.next_frame(Some(deadline))? {
            let control = decoded.frame.control;
            if control == expected {
                return Ok(Reply::Expected);
            }
            if Some(control) == repeat {
                return Ok(Reply::Repeat);
            }
            debug!("Waiting for {:?}, ignoring {:?}", expected, control);
        }
        Ok(Reply::Timeout)
    }
}

// ============================================================================
// Tests
// ============================================================================
