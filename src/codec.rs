// ABOUTME: On-wire Frame representation and CRC-32/IEEE codec for the serial bridge protocol.
// ABOUTME: A Frame is the only datagram type this protocol ever exchanges: length, command, payload, CRC.

use crate::error::CodecError;
use bytes::{BufMut, BytesMut};
use crc::{Crc, CRC_32_ISO_HDLC};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// CRC-32/IEEE (a.k.a. CRC-32/ISO-HDLC): the exact parameters the peer's firmware uses.
static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Low 7 bits of the wire `command` byte; bit 7 carries the sequence flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Command {
    Connect = 0,
    Connack = 1,
    Disconnect = 2,
    Publish = 3,
    Acknowledge = 4,
}

const SEQ_FLAG_BIT: u8 = 0x80;
const COMMAND_MASK: u8 = 0x7F;
// The wire `length` byte counts everything after itself: command + payload + crc.
// It does not count its own byte, so a zero-payload control frame has length 5,
// not 6.
const COMMAND_LEN: usize = 1;
const CRC_LEN: usize = 4;

/// The smallest legal value of the wire length byte: command + CRC, zero payload.
pub const MIN_FRAME_LEN: u8 = (COMMAND_LEN + CRC_LEN) as u8;

/// Largest payload a single frame can carry (the length byte is a `u8`).
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize - COMMAND_LEN - CRC_LEN;

/// A single on-wire datagram: `[length, command|seq_flag, payload.., crc32_le]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub seq_flag: bool,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(command: Command, seq_flag: bool, payload: Vec<u8>) -> Self {
        Self { command, seq_flag, payload }
    }

    /// A frame with no payload and the sequence flag clear, e.g. CONNACK or DISCONNECT.
    pub fn control(command: Command) -> Self {
        Self::new(command, false, Vec::new())
    }

    pub fn acknowledge(seq_flag: bool) -> Self {
        Self::new(Command::Acknowledge, seq_flag, Vec::new())
    }

    fn command_byte(&self) -> u8 {
        let code: u8 = self.command.into();
        code | if self.seq_flag { SEQ_FLAG_BIT } else { 0 }
    }

    /// The value of the wire length byte for this frame's current payload.
    pub fn length(&self) -> u8 {
        (COMMAND_LEN + self.payload.len() + CRC_LEN) as u8
    }

    /// CRC-32/IEEE over `[length, command|seq_flag, payload..]`, the exact bytes
    /// that precede the CRC on the wire.
    pub fn compute_crc(&self) -> u32 {
        let mut digest = CRC32.digest();
        digest.update(&[self.length(), self.command_byte()]);
        digest.update(&self.payload);
        digest.finalize()
    }

    /// Serialise to the exact bytes written to the wire.
    #[tracing::instrument(level = "trace", skip(self), fields(command = ?self.command, len = self.payload.len()))]
    pub fn serialize(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.length() as usize);
        buf.put_u8(self.length());
        buf.put_u8(self.command_byte());
        buf.put_slice(&self.payload);
        buf.put_u32_le(self.compute_crc());
        buf
    }

    /// Reassemble a frame from its already-collected wire parts, validating the CRC.
    ///
    /// The parser is responsible for enforcing `length >= MIN_FRAME_LEN` before it
    /// ever reads a payload, so this only re-validates the invariant defensively.
    #[tracing::instrument(level = "trace", skip(payload))]
    pub fn from_wire(length: u8, command_byte: u8, payload: Vec<u8>, crc: u32) -> Result<Frame, CodecError> {
        if length < MIN_FRAME_LEN {
            return Err(CodecError::LengthTooSmall(length));
        }
        let code = command_byte & COMMAND_MASK;
        let command = Command::try_from(code).map_err(|_| CodecError::UnknownCommand(code))?;
        let seq_flag = command_byte & SEQ_FLAG_BIT != 0;
        let frame = Frame { command, seq_flag, payload };
        let computed = frame.compute_crc();
        if computed != crc {
            return Err(CodecError::CrcMismatch { computed, received: crc });
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_publish_frame() {
        let frame = Frame::new(Command::Publish, true, vec![1, 2, 3, 4]);
        let wire = frame.serialize();
        assert_eq!(wire[0], frame.length());
        assert_eq!(wire[1], 0x80 | 3);

        let crc = u32::from_le_bytes(wire[wire.len() - 4..].try_into().unwrap());
        let payload = wire[2..wire.len() - 4].to_vec();
        let decoded = Frame::from_wire(wire[0], wire[1], payload, crc).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn control_frame_has_no_payload_and_minimum_length() {
        let frame = Frame::control(Command::Connack);
        assert_eq!(frame.length(), MIN_FRAME_LEN);
        assert!(frame.payload.is_empty());
        assert!(!frame.seq_flag);
    }

    #[test]
    fn rejects_length_below_minimum() {
        let err = Frame::from_wire(4, 0, Vec::new(), 0).unwrap_err();
        assert!(matches!(err, CodecError::LengthTooSmall(4)));
    }

    #[test]
    fn rejects_unknown_command() {
        let frame = Frame::new(Command::Publish, false, vec![9]);
        let wire = frame.serialize();
        let err = Frame::from_wire(wire[0], 0x7F, vec![9], 0).unwrap_err();
        assert!(matches!(err, CodecError::UnknownCommand(0x7F)));
    }

    #[test]
    fn rejects_bad_crc() {
        let frame = Frame::new(Command::Acknowledge, true, Vec::new());
        let wire = frame.serialize();
        let err = Frame::from_wire(wire[0], wire[1], Vec::new(), 0xDEADBEEF).unwrap_err();
        assert!(matches!(err, CodecError::CrcMismatch { .. }));
    }

    #[test]
    fn seq_flag_survives_round_trip_for_every_command() {
        for command in [Command::Connect, Command::Connack, Command::Disconnect, Command::Publish, Command::Acknowledge]
        {
            for seq_flag in [false, true] {
                let frame = Frame::new(command, seq_flag, vec![0xAB]);
                let wire = frame.serialize();
                let crc = u32::from_le_bytes(wire[wire.len() - 4..].try_into().unwrap());
                let payload = wire[2..wire.len() - 4].to_vec();
                let decoded = Frame::from_wire(wire[0], wire[1], payload, crc).unwrap();
                assert_eq!(decoded.seq_flag, seq_flag);
                assert_eq!(decoded.command, command);
            }
        }
    }
}
