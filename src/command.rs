//! Motor direction commands.
//!
//! On the wire a direction is two independent flags.  [`Direction`] is the
//! tagged form used everywhere past the protocol boundary; the one illegal
//! flag combination (both set) is rejected by [`Direction::from_flags`].

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// What the motor should do for one command (the command intent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Stop,
    Clockwise,
    CounterClockwise,
}

/// Both direction flags were set on a command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("command sets both clockwise and counter-clockwise")]
pub struct InvalidCommand;

/// Text that does not name a direction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown direction {0:?} (expected cw, ccw or stop)")]
pub struct ParseDirectionError(pub String);

impl Direction {
    /// Decode the `(clockwise, counter_clockwise)` flag pair.
    pub fn from_flags(clockwise: bool, counter_clockwise: bool) -> Result<Self, InvalidCommand> {
        match (clockwise, counter_clockwise) {
            (false, false) => Ok(Direction::Stop),
            (true, false) => Ok(Direction::Clockwise),
            (false, true) => Ok(Direction::CounterClockwise),
            (true, true) => Err(InvalidCommand),
        }
    }

    /// Flag pair written into a command frame.
    pub fn flags(self) -> (bool, bool) {
        match self {
            Direction::Stop => (false, false),
            Direction::Clockwise => (true, false),
            Direction::CounterClockwise => (false, true),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Stop => "stop",
            Direction::Clockwise => "clockwise",
            Direction::CounterClockwise => "counter-clockwise",
        };
        f.write_str(name)
    }
}

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stop" | "s" | "off" | "" => Ok(Direction::Stop),
            "cw" | "clockwise" | "right" | "r" => Ok(Direction::Clockwise),
            "ccw" | "counter-clockwise" | "counterclockwise" | "left" | "l" => {
                Ok(Direction::CounterClockwise)
            }
            other => Err(ParseDirectionError(other.to_string())),
        }
    }
}
