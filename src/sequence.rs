//! Alternating-bit sequence numbers and duplicate suppression.
//!
//! Every new command flips the sender's [`Sequence`]; the matching ACK echoes
//! it back.  On the receive side a [`SequenceTracker`] remembers the last
//! accepted value and rejects an immediate repeat as a duplicate.
//!
//! # Known limitation
//!
//! The window is a single bit.  The tracker can only tell "same as the
//! previous accepted command" apart from "different".  If the sender gives up
//! on a command that never reached the receiver and then flips again, the
//! next command lands on the parity the receiver already holds and is
//! silently treated as a duplicate.  Widening the sequence space would change
//! the wire format, so the limitation is kept as-is.

use std::fmt;

/// One-bit sequence marker carried in every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sequence {
    Zero,
    One,
}

impl Sequence {
    /// The other parity.
    pub fn flip(self) -> Self {
        match self {
            Sequence::Zero => Sequence::One,
            Sequence::One => Sequence::Zero,
        }
    }

    /// Interpret a 16-bit header field.  Any non-zero value reads as `One`.
    pub fn from_wire(value: i16) -> Self {
        if value == 0 {
            Sequence::Zero
        } else {
            Sequence::One
        }
    }

    /// Value written into the header field.
    pub fn to_wire(self) -> i16 {
        match self {
            Sequence::Zero => 0,
            Sequence::One => 1,
        }
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}

/// Receive-side duplicate detector.
///
/// Starts *unset* so the very first command is always accepted, whatever its
/// parity.  Never reset for the lifetime of the receiver.
#[derive(Debug, Default, Clone)]
pub struct SequenceTracker {
    last_seen: Option<Sequence>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `sequence` if it differs from the last accepted value.
    ///
    /// Returns `true` and records `sequence` for a new command, `false` for a
    /// duplicate (state unchanged).
    pub fn accept(&mut self, sequence: Sequence) -> bool {
        if self.last_seen == Some(sequence) {
            return false;
        }
        self.last_seen = Some(sequence);
        true
    }

    /// Sequence of the most recently accepted command, if any.
    pub fn last_seen(&self) -> Option<Sequence> {
        self.last_seen
    }
}
