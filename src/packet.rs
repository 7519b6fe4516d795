//! Wire-format definitions for motor-link frames.
//!
//! Every datagram exchanged between the controller and the motors node is a
//! [`Frame`].  This module is responsible for:
//! - Defining the on-wire binary layout (five header fields, payload).
//! - Serialising a [`Frame`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Frame`], returning an error
//!   for truncated input.
//!
//! No I/O happens here.  No flag validation happens here either: a frame with
//! both direction flags set decodes fine and is rejected later by
//! [`Frame::direction`].
//!
//! # Wire format
//!
//! All header fields are 16-bit signed integers, **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |          is_command           |            is_ack             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           sequence            |           clockwise           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |       counter_clockwise       |          Payload ...          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 10 bytes.  The payload has no length
//! field; it is whatever follows the header in the datagram.

use thiserror::Error;

use crate::command::{Direction, InvalidCommand};
use crate::sequence::Sequence;

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 10;

/// Largest datagram either side sends or reads.
pub const MAX_DATAGRAM: usize = 1024;

/// Largest payload that fits in one datagram.
pub const MAX_PAYLOAD: usize = MAX_DATAGRAM - HEADER_LEN;

// Byte offsets of each field within the serialised header.
const OFF_IS_COMMAND: usize = 0;
const OFF_IS_ACK: usize = 2;
const OFF_SEQUENCE: usize = 4;
const OFF_CLOCKWISE: usize = 6;
const OFF_COUNTER_CLOCKWISE: usize = 8;

/// Fixed-size protocol header, in host representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// The frame carries a new command.
    pub is_command: bool,
    /// The frame acknowledges a command.
    pub is_ack: bool,
    /// Alternating-bit sequence of the command (echoed in its ACK).
    pub sequence: Sequence,
    pub clockwise: bool,
    pub counter_clockwise: bool,
}

/// A complete protocol datagram: header + payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: Header,
    pub payload: Vec<u8>,
}

/// The payload does not fit in one datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("payload of {len} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Buffer shorter than the fixed header size.
    #[error("datagram of {len} bytes is shorter than the {HEADER_LEN}-byte header")]
    Truncated { len: usize },
}

impl Frame {
    /// Build a command frame for `direction`.
    pub fn command(sequence: Sequence, direction: Direction, payload: Vec<u8>) -> Self {
        let (clockwise, counter_clockwise) = direction.flags();
        Frame {
            header: Header {
                is_command: true,
                is_ack: false,
                sequence,
                clockwise,
                counter_clockwise,
            },
            payload,
        }
    }

    /// Build an acknowledgment for the command carrying `sequence`.
    pub fn ack(sequence: Sequence, payload: Vec<u8>) -> Self {
        Frame {
            header: Header {
                is_command: false,
                is_ack: true,
                sequence,
                clockwise: false,
                counter_clockwise: false,
            },
            payload,
        }
    }

    /// `true` for a command that is not also flagged as an ACK.
    pub fn is_pure_command(&self) -> bool {
        self.header.is_command && !self.header.is_ack
    }

    /// `true` when this frame acknowledges `sequence`.
    pub fn acknowledges(&self, sequence: Sequence) -> bool {
        self.header.is_ack && self.header.sequence == sequence
    }

    /// Decode the direction flags.
    pub fn direction(&self) -> Result<Direction, InvalidCommand> {
        Direction::from_flags(self.header.clockwise, self.header.counter_clockwise)
    }

    /// Serialise this frame into a newly allocated byte vector.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        if self.payload.len() > MAX_PAYLOAD {
            return Err(EncodeError::PayloadTooLarge {
                len: self.payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        let h = &self.header;
        let mut buf = vec![0u8; HEADER_LEN + self.payload.len()];
        put_field(&mut buf, OFF_IS_COMMAND, i16::from(h.is_command));
        put_field(&mut buf, OFF_IS_ACK, i16::from(h.is_ack));
        put_field(&mut buf, OFF_SEQUENCE, h.sequence.to_wire());
        put_field(&mut buf, OFF_CLOCKWISE, i16::from(h.clockwise));
        put_field(&mut buf, OFF_COUNTER_CLOCKWISE, i16::from(h.counter_clockwise));
        buf[HEADER_LEN..].copy_from_slice(&self.payload);
        Ok(buf)
    }

    /// Parse a [`Frame`] from a raw byte slice.
    ///
    /// Everything after the header is payload; an empty payload is fine.
    /// A header field counts as set when it is non-zero.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < HEADER_LEN {
            return Err(DecodeError::Truncated { len: buf.len() });
        }

        Ok(Frame {
            header: Header {
                is_command: get_field(buf, OFF_IS_COMMAND) != 0,
                is_ack: get_field(buf, OFF_IS_ACK) != 0,
                sequence: Sequence::from_wire(get_field(buf, OFF_SEQUENCE)),
                clockwise: get_field(buf, OFF_CLOCKWISE) != 0,
                counter_clockwise: get_field(buf, OFF_COUNTER_CLOCKWISE) != 0,
            },
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }
}

fn put_field(buf: &mut [u8], offset: usize, value: i16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

fn get_field(buf: &[u8], offset: usize) -> i16 {
    i16::from_be_bytes([buf[offset], buf[offset + 1]])
}
