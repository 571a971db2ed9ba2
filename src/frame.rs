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

//! Frame codec.
//!
//! ```plain
//! +------+---------+---------+------+----------------------------+------+
//! | FLAG | ADDRESS | CONTROL | BCC1 | stuffed(PAYLOAD ++ [BCC2]) | FLAG |
//! +------+---------+---------+------+----------------------------+------+
//! ```
//!
//! Supervisory frames stop after BCC1. Decoding is a byte-at-a-time state
//! machine so framing resynchronises after line noise or a mid-stream start.

use std::fmt;

use tracing::trace;

use crate::checksum::{header_checksum, payload_checksum};
use crate::error::FramingError;
use crate::protocol::*;
use crate::stuffing::{stuff_into, Destuffer};

// ============================================================================
// Frame Fields
// ============================================================================

/// Alternating sequence bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sequence {
    #[default]
    Zero,
    One,
}

impl Sequence {
    pub fn next(self) -> Self {
        match self {
            Sequence::Zero => Sequence::One,
            Sequence::One => Sequence::Zero,
        }
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sequence::Zero => write!(f, "0"),
            Sequence::One => write!(f, "1"),
        }
    }
}

/// Address byte. Every frame carries the address of the side that sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    /// Command address, used by the initiator
    Command,
    /// Response address, used by the responder
    Response,
}

impl Address {
    pub fn to_byte(self) -> u8 {
        match self {
            Address::Command => ADDR_INITIATOR,
            Address::Response => ADDR_RESPONDER,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            ADDR_INITIATOR => Some(Address::Command),
            ADDR_RESPONDER => Some(Address::Response),
            _ => None,
        }
    }
}

/// Control field.
///
/// `ReceiveReady(n)` and `Reject(n)` name the sequence the receiver expects
/// next; `Information(n)` names the sequence of the frame itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlField {
    Set,
    Disconnect,
    UnnumberedAck,
    ReceiveReady(Sequence),
    Reject(Sequence),
    Information(Sequence),
}

impl ControlField {
    pub fn to_byte(self) -> u8 {
        match self {
            ControlField::Set => C_SET,
            ControlField::Disconnect => C_DISC,
            ControlField::UnnumberedAck => C_UA,
            ControlField::ReceiveReady(Sequence::Zero) => C_RR0,
            ControlField::ReceiveReady(Sequence::One) => C_RR1,
            ControlField::Reject(Sequence::Zero) => C_REJ0,
            ControlField::Reject(Sequence::One) => C_REJ1,
            ControlField::Information(Sequence::Zero) => C_I0,
            ControlField::Information(Sequence::One) => C_I1,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            C_SET => Some(ControlField::Set),
            C_DISC => Some(ControlField::Disconnect),
            C_UA => Some(ControlField::UnnumberedAck),
            C_RR0 => Some(ControlField::ReceiveReady(Sequence::Zero)),
            C_RR1 => Some(ControlField::ReceiveReady(Sequence::One)),
            C_REJ0 => Some(ControlField::Reject(Sequence::Zero)),
            C_REJ1 => Some(ControlField::Reject(Sequence::One)),
            C_I0 => Some(ControlField::Information(Sequence::Zero)),
            C_I1 => Some(ControlField::Information(Sequence::One)),
            _ => None,
        }
    }

    pub fn is_information(self) -> bool {
        matches!(self, ControlField::Information(_))
    }
}

// ============================================================================
// Frame
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub address: Address,
    pub control: ControlField,
    /// Always empty for supervisory frames
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn supervisory(address: Address, control: ControlField) -> Self {
        debug_assert!(!control.is_information());
        Frame { address, control, payload: Vec::new() }
    }

    pub fn information(address: Address, seq: Sequence, payload: &[u8]) -> Self {
        Frame {
            address,
            control: ControlField::Information(seq),
            payload: payload.to_vec(),
        }
    }

    /// Serialise the frame, stuffing the protected region.
    pub fn encode(&self) -> Vec<u8> {
        let address = self.address.to_byte();
        let control = self.control.to_byte();

        if !self.control.is_information() {
            return vec![FLAG, address, control, header_checksum(address, control), FLAG];
        }

        // Worst case every byte of payload and BCC2 is escaped
        let mut out = Vec::with_capacity(SUPERVISORY_FRAME_LEN + 2 * (self.payload.len() + 1));
        out.extend_from_slice(&[FLAG, address, control, header_checksum(address, control)]);
        stuff_into(&self.payload, &mut out);
        stuff_into(&[payload_checksum(&self.payload)], &mut out);
        out.push(FLAG);
        out
    }
}

/// A frame closed by the decoder. `valid` is false when the payload
/// checksum did not match; the header is always trustworthy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub frame: Frame,
    pub valid: bool,
}

// ============================================================================
// Decoder
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    Idle,
    FlagSeen,
    AddressSeen { address: Address },
    /// Waiting for BCC1
    ControlSeen { address: Address, control: ControlField },
    /// Supervisory header checked, waiting for the closing flag
    HeaderOk { address: Address, control: ControlField },
    InPayload { address: Address, control: ControlField },
}

/// Byte-at-a-time frame decoder.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecoderState,
    buffer: Vec<u8>,
    destuffer: Destuffer,
    max_payload: usize,
    header_errors: u64,
}

impl FrameDecoder {
    pub fn new(max_payload: usize) -> Self {
        FrameDecoder {
            state: DecoderState::Idle,
            buffer: Vec::with_capacity(max_payload.min(MAX_PAYLOAD_SIZE).saturating_add(1)),
            destuffer: Destuffer::new(),
            max_payload,
            header_errors: 0,
        }
    }

    /// Frames silently dropped because BCC1 did not match
    pub fn header_errors(&self) -> u64 {
        self.header_errors
    }

    /// Drop any partial frame and go back to scanning for a flag.
    pub fn reset(&mut self) {
        self.state = DecoderState::Idle;
        self.buffer.clear();
        self.destuffer.reset();
    }

    /// Consume one byte. `Ok(None)` means more input is needed.
    pub fn push(&mut self, byte: u8) -> Result<Option<DecodedFrame>, FramingError> {
        match self.state {
            DecoderState::Idle => {
                if byte == FLAG {
                    self.state = DecoderState::FlagSeen;
                }
            }
            DecoderState::FlagSeen => {
                if byte != FLAG {
                    self.state = match Address::from_byte(byte) {
                        Some(address) => DecoderState::AddressSeen { address },
                        None => DecoderState::Idle,
                    };
                }
            }
            DecoderState::AddressSeen { address } => {
                self.state = if byte == FLAG {
                    DecoderState::FlagSeen
                } else {
                    match ControlField::from_byte(byte) {
                        Some(control) => DecoderState::ControlSeen { address, control },
                        None => {
                            trace!("Unknown control byte 0x{:02X}", byte);
                            DecoderState::Idle
                        }
                    }
                };
            }
            DecoderState::ControlSeen { address, control } => {
                if byte == header_checksum(address.to_byte(), control.to_byte()) {
                    if control.is_information() {
                        self.buffer.clear();
                        self.destuffer.reset();
                        self.state = DecoderState::InPayload { address, control };
                    } else {
                        self.state = DecoderState::HeaderOk { address, control };
                    }
                } else {
                    self.header_errors += 1;
                    trace!("BCC1 mismatch for {:?}, dropping frame", control);
                    self.state = if byte == FLAG {
                        DecoderState::FlagSeen
                    } else {
                        DecoderState::Idle
                    };
                }
            }
            DecoderState::HeaderOk { address, control } => {
                self.state = DecoderState::Idle;
                if byte == FLAG {
                    return Ok(Some(DecodedFrame {
                        frame: Frame::supervisory(address, control),
                        valid: true,
                    }));
                }
            }
            DecoderState::InPayload { address, control } => {
                if byte == FLAG {
                    return self.close_information(address, control);
                }
                if let Some(b) = self.destuffer.feed(byte) {
                    // Payload plus the trailing BCC2
                    if self.buffer.len() > self.max_payload {
                        self.reset();
                        return Err(FramingError::Oversized { limit: self.max_payload });
                    }
                    self.buffer.push(b);
                }
            }
        }
        Ok(None)
    }

    fn close_information(
        &mut self,
        address: Address,
        control: ControlField,
    ) -> Result<Option<DecodedFrame>, FramingError> {
        self.state = DecoderState::Idle;
        self.destuffer.finish()?;

        let Some(received_bcc2) = self.buffer.pop() else {
            return Err(FramingError::MissingChecksum);
        };
        let payload = std::mem::take(&mut self.buffer);
        let valid = payload_checksum(&payload) == received_bcc2;

        Ok(Some(DecodedFrame {
            frame: Frame { address, control, payload },
            valid,
        }))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(decoder: &mut FrameDecoder, bytes: &[u8]) -> Vec<Result<DecodedFrame, FramingError>> {
        bytes
            .iter()
            .filter_map(|&b| decoder.push(b).transpose())
            .collect()
    }

    #[test]
    fn test_supervisory_wire_bytes() {
        assert_eq!(
            Frame::supervisory(Address::Command, ControlField::Set).encode(),
            vec![0x7E, 0x03, 0x03, 0x00, 0x7E]
        );
        assert_eq!(
            Frame::supervisory(Address::Response, ControlField::UnnumberedAck).encode(),
            vec![0x7E, 0x01, 0x07, 0x06, 0x7E]
        );
        assert_eq!(
            Frame::supervisory(Address::Response, ControlField::ReceiveReady(Sequence::One)).encode(),
            vec![0x7E, 0x01, 0x85, 0x84, 0x7E]
        );
    }

    #[test]
    fn test_information_wire_bytes() {
        let encoded = Frame::information(Address::Command, Sequence::One, b"AB").encode();
        assert_eq!(encoded, vec![0x7E, 0x03, 0x40, 0x43, 0x41, 0x42, 0x03, 0x7E]);
    }

    #[test]
    fn test_checksum_byte_is_stuffed() {
        // BCC2 of [0x7E] is 0x7E itself
        let encoded = Frame::information(Address::Command, Sequence::Zero, &[0x7E]).encode();
        assert_eq!(encoded, vec![0x7E, 0x03, 0x00, 0x03, 0x7D, 0x5E, 0x7D, 0x5E, 0x7E]);

        let mut decoder = FrameDecoder::new(MAX_PAYLOAD_SIZE);
        let frames = decode_all(&mut decoder, &encoded);
        assert_eq!(frames.len(), 1);
        let decoded = frames[0].clone().unwrap();
        assert!(decoded.valid);
        assert_eq!(decoded.frame.payload, vec![0x7E]);
    }

    #[test]
    fn test_round_trip_lengths_and_byte_values() {
        let mut decoder = FrameDecoder::new(512);
        let all_values: Vec<u8> = (0..=255u8).collect();

        for len in [0usize, 1, 2, 7, 128, 256, 512] {
            let payload: Vec<u8> = all_values.iter().cycle().take(len).copied().collect();
            let frame = Frame::information(Address::Response, Sequence::Zero, &payload);
            let frames = decode_all(&mut decoder, &frame.encode());
            assert_eq!(frames, vec![Ok(DecodedFrame { frame, valid: true })], "length {}", len);
        }
    }

    #[test]
    fn test_resync_after_garbage() {
        let mut decoder = FrameDecoder::new(MAX_PAYLOAD_SIZE);
        let mut stream = vec![0x00, 0x55, 0x03, 0x40, 0x7D, 0xFF];
        stream.extend(Frame::supervisory(Address::Command, ControlField::Disconnect).encode());

        let frames = decode_all(&mut decoder, &stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].clone().unwrap().frame.control, ControlField::Disconnect);
    }

    #[test]
    fn test_repeated_flags_and_back_to_back_frames() {
        let mut decoder = FrameDecoder::new(MAX_PAYLOAD_SIZE);
        let mut stream = vec![FLAG, FLAG, FLAG];
        stream.extend(Frame::supervisory(Address::Command, ControlField::Set).encode());
        stream.extend(Frame::information(Address::Command, Sequence::Zero, b"hi").encode());

        let frames = decode_all(&mut decoder, &stream);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].clone().unwrap().frame.control, ControlField::Set);
        assert_eq!(frames[1].clone().unwrap().frame.payload, b"hi".to_vec());
    }

    #[test]
    fn test_header_corruption_dropped_silently() {
        let mut decoder = FrameDecoder::new(MAX_PAYLOAD_SIZE);
        let mut encoded = Frame::supervisory(Address::Response, ControlField::UnnumberedAck).encode();
        encoded[3] ^= 0x01;

        assert!(decode_all(&mut decoder, &encoded).is_empty());
        assert_eq!(decoder.header_errors(), 1);
    }

    #[test]
    fn test_unknown_control_resets() {
        let mut decoder = FrameDecoder::new(MAX_PAYLOAD_SIZE);
        let bogus = [FLAG, 0x03, 0x22, 0x21, FLAG];
        assert!(decode_all(&mut decoder, &bogus).is_empty());
    }

    #[test]
    fn test_payload_corruption_marked_invalid() {
        let mut decoder = FrameDecoder::new(MAX_PAYLOAD_SIZE);
        let mut encoded = Frame::information(Address::Command, Sequence::One, b"Hello").encode();
        encoded[5] ^= 0x04;

        let frames = decode_all(&mut decoder, &encoded);
        assert_eq!(frames.len(), 1);
        let decoded = frames[0].clone().unwrap();
        assert!(!decoded.valid);
        assert_eq!(decoded.frame.control, ControlField::Information(Sequence::One));
    }

    #[test]
    fn test_single_bit_flips_never_yield_valid_frame() {
        let encoded = Frame::information(Address::Command, Sequence::Zero, b"Hello").encode();

        for pos in 1..encoded.len() - 1 {
            for bit in 0..8 {
                let mut damaged = encoded.clone();
                damaged[pos] ^= 1 << bit;

                let mut decoder = FrameDecoder::new(MAX_PAYLOAD_SIZE);
                for result in decode_all(&mut decoder, &damaged) {
                    if let Ok(decoded) = result {
                        assert!(!decoded.valid, "flip at byte {} bit {} went undetected", pos, bit);
                    }
                }
            }
        }
    }

    #[test]
    fn test_trailing_escape_is_framing_error() {
        let mut decoder = FrameDecoder::new(MAX_PAYLOAD_SIZE);
        let stream = [FLAG, 0x03, 0x00, 0x03, 0x41, ESC, FLAG];
        let frames = decode_all(&mut decoder, &stream);
        assert_eq!(frames, vec![Err(FramingError::TrailingEscape)]);

        // Decoder keeps working afterwards
        let good = Frame::supervisory(Address::Command, ControlField::Set).encode();
        assert_eq!(decode_all(&mut decoder, &good).len(), 1);
    }

    #[test]
    fn test_missing_checksum() {
        let mut decoder = FrameDecoder::new(MAX_PAYLOAD_SIZE);
        let stream = [FLAG, 0x03, 0x00, 0x03, FLAG];
        assert_eq!(decode_all(&mut decoder, &stream), vec![Err(FramingError::MissingChecksum)]);
    }

    #[test]
    fn test_oversized_payload() {
        let mut decoder = FrameDecoder::new(4);
        let at_limit = Frame::information(Address::Command, Sequence::Zero, b"1234").encode();
        assert!(decode_all(&mut decoder, &at_limit)[0].as_ref().unwrap().valid);

        let too_big = Frame::information(Address::Command, Sequence::Zero, b"12345").encode();
        let frames = decode_all(&mut decoder, &too_big);
        assert_eq!(frames, vec![Err(FramingError::Oversized { limit: 4 })]);

        let good = Frame::supervisory(Address::Response, ControlField::Disconnect).encode();
        assert_eq!(decode_all(&mut decoder, &good).len(), 1);
    }

    #[test]
    fn test_unbounded_limit_does_not_overflow() {
        let mut decoder = FrameDecoder::new(usize::MAX);
        let frame = Frame::information(Address::Command, Sequence::One, b"payload");
        assert_eq!(decode_all(&mut decoder, &frame.encode()), vec![Ok(DecodedFrame { frame, valid: true })]);
    }
}
