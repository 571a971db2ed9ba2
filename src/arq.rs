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

//! Stop-and-wait ARQ with a single alternating sequence bit per direction.
//!
//! Sender: transmit `I(n)` and wait for `RR(n+1)`. `REJ(n)` triggers an
//! immediate retransmission, a timeout a delayed one; both spend one attempt.
//!
//! Receiver: `I(expected)` is delivered and acknowledged with the new
//! expected bit. `I(expected-1)` is a duplicate caused by a lost RR and is
//! only re-acknowledged. A payload checksum failure is answered with
//! `REJ(expected)`.

use tracing::{debug, trace, warn};

use crate::error::{LinkError, Result};
use crate::frame::{ControlField, Frame};
use crate::session::{ConnectionPhase, LinkSession};
use crate::timer::Deadline;

impl LinkSession<'_> {
    pub(crate) fn transmit_information(&mut self, payload: &[u8]) -> Result<usize> {
        let seq = self.send_seq;
        let encoded = Frame::information(self.config.role.address(), seq, payload).encode();
        let budget = self.config.retry;

        'attempts: for attempt in 1..=budget.max_attempts {
            if attempt > 1 {
                self.stats.retransmissions += 1;
            }
            self.transmit(&encoded)?;
            debug!("Sent: I{} ({} bytes, attempt {}/{})", seq, payload.len(), attempt, budget.max_attempts);

            let deadline = Deadline::after(budget.timeout);
            loop {
                let Some(decoded) = self.next_frame(Some(deadline))? else {
                    self.stats.timeouts += 1;
                    warn!("Timeout waiting for RR{}", seq.next());
                    continue 'attempts;
                };

                match decoded.frame.control {
                    ControlField::ReceiveReady(n) if n == seq.next() => {
                        self.send_seq = seq.next();
                        return Ok(payload.len());
                    }
                    ControlField::Reject(n) if n == seq => {
                        self.stats.rejects_received += 1;
                        warn!("Peer rejected I{}, retransmitting", seq);
                        continue 'attempts;
                    }
                    other => trace!("Waiting for RR{}, ignoring {:?}", seq.next(), other),
                }
            }
        }

        Err(LinkError::TransmitFailed { attempts: budget.max_attempts })
    }

    pub(crate) fn await_information(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            let Some(decoded) = self.next_frame(None)? else {
                continue;
            };

            match decoded.frame.control {
                ControlField::Information(seq) if !decoded.valid => {
                    self.stats.rejects_sent += 1;
                    warn!("BCC2 mismatch on I{}, rejecting", seq);
                    self.send_supervisory(ControlField::Reject(self.recv_seq))?;
                }
                ControlField::Information(seq) if seq == self.recv_seq => {
                    self.recv_seq = seq.next();
                    self.send_supervisory(ControlField::ReceiveReady(self.recv_seq))?;
                    return Ok(Some(decoded.frame.payload));
                }
                ControlField::Information(seq) => {
                    self.stats.duplicates += 1;
                    debug!("Duplicate I{}, acknowledging again", seq);
                    self.send_supervisory(ControlField::ReceiveReady(self.recv_seq))?;
                }
                ControlField::Disconnect => {
                    debug!("Peer disconnected");
                    self.peer_disconnected = true;
                    self.phase = ConnectionPhase::Closing;
                    return Ok(None);
                }
                ControlField::Set => {
                    debug!("Peer repeated SET, our UA was lost");
                    self.send_supervisory(ControlField::UnnumberedAck)?;
                }
                other => trace!("Waiting for data, ignoring {:?}", other),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::config::{LinkConfig, Role};
    use crate::error::LinkError;
    use crate::frame::{ControlField, Frame, Sequence};
    use crate::serial::MockSerialPort;
    use crate::session::{ConnectionPhase, LinkSession};

    fn config(role: Role) -> LinkConfig {
        LinkConfig::new(role).retry(3, Duration::from_secs(1))
    }

    fn supervisory(role: Role, control: ControlField) -> Vec<u8> {
        Frame::supervisory(role.address(), control).encode()
    }

    fn information(role: Role, seq: Sequence, payload: &[u8]) -> Vec<u8> {
        Frame::information(role.address(), seq, payload).encode()
    }

    fn bytes(data: &[u8]) -> Vec<Option<u8>> {
        data.iter().map(|&b| Some(b)).collect()
    }

    #[test]
    fn test_send_alternates_sequence() {
        let mut responses = supervisory(Role::Responder, ControlField::UnnumberedAck);
        responses.extend(supervisory(Role::Responder, ControlField::ReceiveReady(Sequence::One)));
        responses.extend(supervisory(Role::Responder, ControlField::ReceiveReady(Sequence::Zero)));
        responses.extend(supervisory(Role::Responder, ControlField::ReceiveReady(Sequence::One)));

        let mut expected = supervisory(Role::Initiator, ControlField::Set);
        expected.extend([0x7E, 0x03, 0x00, 0x03, 0x41, 0x42, 0x03, 0x7E]);
        expected.extend([0x7E, 0x03, 0x40, 0x43, 0x43, 0x44, 0x07, 0x7E]);
        expected.extend(information(Role::Initiator, Sequence::Zero, b"EF"));

        let mut serial = MockSerialPort::from_bytes(&responses, expected);
        let mut session = LinkSession::open(&mut serial, config(Role::Initiator)).unwrap();

        assert_eq!(session.send(b"AB").unwrap(), 2);
        assert_eq!(session.send_sequence(), Sequence::One);
        assert_eq!(session.send(b"CD").unwrap(), 2);
        assert_eq!(session.send_sequence(), Sequence::Zero);
        assert_eq!(session.send(b"EF").unwrap(), 2);
        assert_eq!(session.send_sequence(), Sequence::One);
    }

    #[test]
    fn test_send_gives_up_after_max_attempts() {
        let mut responses = bytes(&supervisory(Role::Responder, ControlField::UnnumberedAck));
        responses.extend([None, None, None]);

        let mut expected = supervisory(Role::Initiator, ControlField::Set);
        expected.extend(information(Role::Initiator, Sequence::Zero, b"lost").repeat(3));

        let mut serial = MockSerialPort::new(responses, expected);
        let mut session = LinkSession::open(&mut serial, config(Role::Initiator)).unwrap();

        match session.send(b"lost") {
            Err(LinkError::TransmitFailed { attempts }) => assert_eq!(attempts, 3),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(session.phase(), ConnectionPhase::Open);
        assert_eq!(session.send_sequence(), Sequence::Zero);
        assert_eq!(session.stats().retransmissions, 2);
        assert_eq!(session.stats().timeouts, 3);
    }

    #[test]
    fn test_send_retransmits_on_reject() {
        let mut responses = supervisory(Role::Responder, ControlField::UnnumberedAck);
        responses.extend(supervisory(Role::Responder, ControlField::Reject(Sequence::Zero)));
        responses.extend(supervisory(Role::Responder, ControlField::ReceiveReady(Sequence::One)));

        let mut expected = supervisory(Role::Initiator, ControlField::Set);
        expected.extend(information(Role::Initiator, Sequence::Zero, b"data").repeat(2));

        let mut serial = MockSerialPort::from_bytes(&responses, expected);
        let mut session = LinkSession::open(&mut serial, config(Role::Initiator)).unwrap();

        session.send(b"data").unwrap();
        assert_eq!(session.stats().rejects_received, 1);
        assert_eq!(session.stats().timeouts, 0);
    }

    #[test]
    fn test_send_ignores_stale_ack() {
        let mut responses = supervisory(Role::Responder, ControlField::UnnumberedAck);
        responses.extend(supervisory(Role::Responder, ControlField::ReceiveReady(Sequence::Zero)));
        responses.extend(supervisory(Role::Responder, ControlField::Reject(Sequence::One)));
        responses.extend(supervisory(Role::Responder, ControlField::ReceiveReady(Sequence::One)));

        let mut expected = supervisory(Role::Initiator, ControlField::Set);
        expected.extend(information(Role::Initiator, Sequence::Zero, b"once"));

        let mut serial = MockSerialPort::from_bytes(&responses, expected);
        let mut session = LinkSession::open(&mut serial, config(Role::Initiator)).unwrap();

        session.send(b"once").unwrap();
        assert_eq!(session.stats().retransmissions, 0);
    }

    #[test]
    fn test_send_rejects_oversized_payload() {
        let responses = supervisory(Role::Responder, ControlField::UnnumberedAck);
        let expected = supervisory(Role::Initiator, ControlField::Set);

        let mut serial = MockSerialPort::from_bytes(&responses, expected);
        let mut session =
            LinkSession::open(&mut serial, config(Role::Initiator).max_payload(4)).unwrap();

        match session.send(b"12345") {
            Err(LinkError::PayloadTooLarge { len, max }) => {
                assert_eq!(len, 5);
                assert_eq!(max, 4);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_receive_acknowledges_with_next_sequence() {
        let mut responses = supervisory(Role::Initiator, ControlField::Set);
        responses.extend(information(Role::Initiator, Sequence::Zero, b"AB"));
        responses.extend(information(Role::Initiator, Sequence::One, b"CD"));

        let mut expected = supervisory(Role::Responder, ControlField::UnnumberedAck);
        expected.extend([0x7E, 0x01, 0x85, 0x84, 0x7E]);
        expected.extend([0x7E, 0x01, 0x05, 0x04, 0x7E]);

        let mut serial = MockSerialPort::from_bytes(&responses, expected);
        let mut session = LinkSession::open(&mut serial, config(Role::Responder)).unwrap();

        assert_eq!(session.receive().unwrap(), Some(b"AB".to_vec()));
        assert_eq!(session.receive_sequence(), Sequence::One);
        assert_eq!(session.receive().unwrap(), Some(b"CD".to_vec()));
        assert_eq!(session.receive_sequence(), Sequence::Zero);
    }

    #[test]
    fn test_receive_suppresses_duplicate() {
        let mut responses = supervisory(Role::Initiator, ControlField::Set);
        responses.extend(information(Role::Initiator, Sequence::Zero, b"AB"));
        responses.extend(information(Role::Initiator, Sequence::Zero, b"AB"));
        responses.extend(information(Role::Initiator, Sequence::One, b"CD"));

        let mut expected = supervisory(Role::Responder, ControlField::UnnumberedAck);
        expected.extend(supervisory(Role::Responder, ControlField::ReceiveReady(Sequence::One)).repeat(2));
        expected.extend(supervisory(Role::Responder, ControlField::ReceiveReady(Sequence::Zero)));

        let mut serial = MockSerialPort::from_bytes(&responses, expected);
        let mut session = LinkSession::open(&mut serial, config(Role::Responder)).unwrap();

        assert_eq!(session.receive().unwrap(), Some(b"AB".to_vec()));
        assert_eq!(session.receive().unwrap(), Some(b"CD".to_vec()));
        assert_eq!(session.stats().duplicates, 1);
    }

    #[test]
    fn test_receive_rejects_bad_checksum() {
        let mut corrupted = information(Role::Initiator, Sequence::Zero, b"data");
        corrupted[5] ^= 0x10;

        let mut responses = supervisory(Role::Initiator, ControlField::Set);
        responses.extend(corrupted);
        responses.extend(information(Role::Initiator, Sequence::Zero, b"data"));

        let mut expected = supervisory(Role::Responder, ControlField::UnnumberedAck);
        expected.extend([0x7E, 0x01, 0x01, 0x00, 0x7E]);
        expected.extend(supervisory(Role::Responder, ControlField::ReceiveReady(Sequence::One)));

        let mut serial = MockSerialPort::from_bytes(&responses, expected);
        let mut session = LinkSession::open(&mut serial, config(Role::Responder)).unwrap();

        assert_eq!(session.receive().unwrap(), Some(b"data".to_vec()));
        assert_eq!(session.stats().rejects_sent, 1);
    }

    #[test]
    fn test_receive_answers_repeated_set() {
        let mut responses = supervisory(Role::Initiator, ControlField::Set);
        responses.extend(supervisory(Role::Initiator, ControlField::Set));
        responses.extend(information(Role::Initiator, Sequence::Zero, b"x"));

        let mut expected = supervisory(Role::Responder, ControlField::UnnumberedAck).repeat(2);
        expected.extend(supervisory(Role::Responder, ControlField::ReceiveReady(Sequence::One)));

        let mut serial = MockSerialPort::from_bytes(&responses, expected);
        let mut session = LinkSession::open(&mut serial, config(Role::Responder)).unwrap();

        assert_eq!(session.receive().unwrap(), Some(b"x".to_vec()));
    }

    #[test]
    fn test_receive_reports_peer_closed() {
        let mut responses = supervisory(Role::Initiator, ControlField::Set);
        responses.extend(supervisory(Role::Initiator, ControlField::Disconnect));
        responses.extend(supervisory(Role::Initiator, ControlField::UnnumberedAck));

        let mut expected = supervisory(Role::Responder, ControlField::UnnumberedAck);
        expected.extend(supervisory(Role::Responder, ControlField::Disconnect));

        let mut serial = MockSerialPort::from_bytes(&responses, expected);
        let mut session = LinkSession::open(&mut serial, config(Role::Responder)).unwrap();

        assert_eq!(session.receive().unwrap(), None);
        assert_eq!(session.receive().unwrap(), None);
        assert_eq!(session.phase(), ConnectionPhase::Closing);
        assert!(matches!(session.send(b"late"), Err(LinkError::NotOpen { .. })));

        let stats = session.close().unwrap();
        assert_eq!(stats.frames_sent, 2);
    }
}
