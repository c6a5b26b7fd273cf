//! Byte layouts of the BEBE bootloader protocol.
//!
//! Everything on the wire is big-endian and unpadded. A command starts with a
//! single [`Tag`] byte followed by its header:
//!
//! ```text
//!   Read  : 'R' | length: u32 | address: u64
//!   Write : 'W' | length: u32 | address: u64 | payload: [u8; length]
//!   Jump  : 'J' | address: u64
//! ```
//!
//! Writes and jumps are answered with a single [`Response`] byte. Reads are
//! answered with exactly `length` bytes of memory content and nothing else.
//!
//! Before any command, the host greets the bootloader by sending
//! [`NOCK_MAGIC`] once the DUT has advertised itself with [`READY`].
//!
//! This module does no I/O.

use std::{convert::TryFrom, convert::TryInto, fmt};

use crate::Error;

/// Sent repeatedly by the DUT while it waits for the host, and for a little
/// while after the magic has been received.
pub const READY: u8 = b'A';

/// Sent once by the host to open a session.
pub const NOCK_MAGIC: [u8; 8] = *b"GOBEARS!";

pub const ACK: u8 = b'Y';

/// Never treated differently from any other non-acknowledgment.
pub const NACK: u8 = b'N';

/// Largest payload carried by one write frame.
pub const MAX_CHUNK: usize = 0xF_FFFF;

pub const RW_HEADER_LEN: usize = 12;
pub const JUMP_HEADER_LEN: usize = 8;

/// First byte of every command frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum Tag {
    Read = b'R',
    Write = b'W',
    Jump = b'J',
}

/// The DUT's single byte answer to a write, a jump or the nock.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Response {
    Ack,
    Nack,
    Other(u8),
}
impl From<u8> for Response {
    fn from(byte: u8) -> Self {
        match byte {
            ACK => Response::Ack,
            NACK => Response::Nack,
            other => Response::Other(other),
        }
    }
}
impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ack => write!(f, "ACK ({:?})", ACK as char),
            Response::Nack => write!(f, "NACK ({:?})", NACK as char),
            Response::Other(byte) => write!(f, "{:#04x}", byte),
        }
    }
}

// RwHeader ====================================================================

/// Header shared by read and write commands.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RwHeader {
    pub length: u32,
    pub address: u64,
}
impl RwHeader {
    pub fn to_bytes(self) -> [u8; RW_HEADER_LEN] {
        let mut bytes = [0; RW_HEADER_LEN];
        bytes[..4].copy_from_slice(&self.length.to_be_bytes());
        bytes[4..].copy_from_slice(&self.address.to_be_bytes());
        bytes
    }

    /// Decodes a header from the first [`RW_HEADER_LEN`] bytes, or `None` if
    /// there are not enough of them.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let length = bytes.get(..4)?.try_into().ok()?;
        let address = bytes.get(4..RW_HEADER_LEN)?.try_into().ok()?;
        Some(RwHeader {
            length: u32::from_be_bytes(length),
            address: u64::from_be_bytes(address),
        })
    }
}

// JumpHeader ==================================================================

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct JumpHeader {
    pub address: u64,
}
impl JumpHeader {
    pub fn to_bytes(self) -> [u8; JUMP_HEADER_LEN] {
        self.address.to_be_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let address = bytes.get(..JUMP_HEADER_LEN)?.try_into().ok()?;
        Some(JumpHeader {
            address: u64::from_be_bytes(address),
        })
    }
}

// Frame =======================================================================

/// An outbound command, borrowing the payload of writes.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Frame<'a> {
    Read(RwHeader),
    Write(RwHeader, &'a [u8]),
    Jump(JumpHeader),
}
impl<'a> Frame<'a> {
    pub fn read(length: u32, address: u64) -> Self {
        Frame::Read(RwHeader { length, address })
    }

    /// A write of `payload` declared as `length` bytes long. The two must
    /// agree exactly, the payload is never truncated or padded.
    pub fn write(length: u32, address: u64, payload: &'a [u8]) -> Result<Self, Error> {
        if usize::try_from(length).ok() != Some(payload.len()) {
            return Err(Error::LengthMismatch {
                declared: length,
                actual: payload.len(),
            });
        }
        Ok(Frame::Write(RwHeader { length, address }, payload))
    }

    /// A write whose declared length is taken from the payload itself.
    pub fn write_payload(address: u64, payload: &'a [u8]) -> Result<Self, Error> {
        let length =
            u32::try_from(payload.len()).map_err(|_| Error::PayloadTooLarge(payload.len()))?;
        Self::write(length, address, payload)
    }

    pub fn jump(address: u64) -> Self {
        Frame::Jump(JumpHeader { address })
    }

    pub fn tag(&self) -> Tag {
        match self {
            Frame::Read(_) => Tag::Read,
            Frame::Write(..) => Tag::Write,
            Frame::Jump(_) => Tag::Jump,
        }
    }

    /// Tag, header and payload laid out contiguously, ready to be sent as one
    /// logical write.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + RW_HEADER_LEN + self.payload().len());
        bytes.push(self.tag() as u8);
        match self {
            Frame::Read(header) => bytes.extend_from_slice(&header.to_bytes()),
            Frame::Write(header, payload) => {
                bytes.extend_from_slice(&header.to_bytes());
                bytes.extend_from_slice(payload);
            }
            Frame::Jump(header) => bytes.extend_from_slice(&header.to_bytes()),
        }
        bytes
    }

    pub fn payload(&self) -> &'a [u8] {
        match self {
            Frame::Write(_, payload) => *payload,
            _ => &[],
        }
    }
}

/// The low-order `length` bytes of the big-endian representation of `value`.
///
/// Only 1 to 8 bytes can be written this way; anything else is rejected and
/// nothing should be sent.
pub fn immediate_payload(value: u64, length: usize) -> Result<Vec<u8>, Error> {
    if !(1..=8).contains(&length) {
        return Err(Error::ImmediateLength(length));
    }
    let bytes = value.to_be_bytes();
    Ok(bytes[bytes.len() - length..].to_vec())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_read_frame() {
        let bytes = Frame::read(16, 0x8000).encode();
        assert_eq!(
            bytes,
            vec![b'R', 0, 0, 0, 16, 0, 0, 0, 0, 0, 0, 0x80, 0x00]
        );
    }

    #[test]
    fn encodes_write_frame_with_payload() {
        let payload = [0xde, 0xad];
        let bytes = Frame::write(2, 0x1000, &payload).unwrap().encode();
        assert_eq!(
            bytes,
            vec![b'W', 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0x10, 0x00, 0xde, 0xad]
        );
    }

    #[test]
    fn encodes_jump_frame() {
        let bytes = Frame::jump(0x8000_0000).encode();
        assert_eq!(bytes, vec![b'J', 0, 0, 0, 0, 0x80, 0, 0, 0]);
    }

    #[test]
    fn write_rejects_length_mismatch() {
        let payload = [1, 2, 3];
        match Frame::write(4, 0, &payload) {
            Err(Error::LengthMismatch {
                declared: 4,
                actual: 3,
            }) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(Frame::write(2, 0, &payload).is_err());
    }

    #[test]
    fn headers_survive_a_round_trip() {
        for &(length, address) in &[
            (0, 0),
            (1, 0x1000),
            (0xF_FFFF, 0x8000_0000),
            (u32::MAX, u64::MAX),
            (0x8000_0000, 0x8000_0000_0000_0000),
        ] {
            let header = RwHeader { length, address };
            assert_eq!(RwHeader::from_bytes(&header.to_bytes()), Some(header));
            let jump = JumpHeader { address };
            assert_eq!(JumpHeader::from_bytes(&jump.to_bytes()), Some(jump));
        }
    }

    #[test]
    fn short_header_does_not_decode() {
        assert_eq!(RwHeader::from_bytes(&[0; RW_HEADER_LEN - 1]), None);
        assert_eq!(JumpHeader::from_bytes(&[0; 3]), None);
    }

    #[test]
    fn decodes_header_from_encoded_frame() {
        let bytes = Frame::read(0x1234, 0xfeed_f00d_0000_0001).encode();
        assert_eq!(bytes[0], Tag::Read as u8);
        let header = RwHeader::from_bytes(&bytes[1..]).unwrap();
        assert_eq!(header.length, 0x1234);
        assert_eq!(header.address, 0xfeed_f00d_0000_0001);
    }

    #[test]
    fn immediate_payload_keeps_low_order_bytes() {
        let values = [0, 1, 0xff, 0x0123_4567_89ab_cdef, u64::MAX, 1 << 63];
        for &value in &values {
            let full = value.to_be_bytes();
            for length in 1..=8 {
                let payload = immediate_payload(value, length).unwrap();
                assert_eq!(payload.len(), length);
                assert_eq!(&payload[..], &full[8 - length..]);
            }
        }
        assert_eq!(
            immediate_payload(0x0123_4567_89ab_cdef, 2).unwrap(),
            vec![0xcd, 0xef]
        );
    }

    #[test]
    fn immediate_payload_rejects_bad_lengths() {
        assert!(matches!(
            immediate_payload(1, 9),
            Err(Error::ImmediateLength(9))
        ));
        assert!(matches!(
            immediate_payload(1, 0),
            Err(Error::ImmediateLength(0))
        ));
    }

    #[test]
    fn classifies_responses() {
        assert_eq!(Response::from(b'Y'), Response::Ack);
        assert_eq!(Response::from(b'N'), Response::Nack);
        assert_eq!(Response::from(READY), Response::Other(b'A'));
        assert_eq!(Response::Nack.to_string(), "NACK ('N')");
    }

    #[test]
    fn markers_are_distinct() {
        assert_ne!(READY, ACK);
        assert_ne!(READY, NACK);
        assert_ne!(ACK, NACK);
        assert_eq!(&NOCK_MAGIC, b"GOBEARS!");
    }
}
