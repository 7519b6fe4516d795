//! Reliable send loop finite-state machine (FSM) types.
//!
//! [`SendState`] records where the last [`crate::sender::ReliableSender::deliver`]
//! call ended.  The in-flight phases only exist inside `deliver`:
//!
//! ```text
//!  IDLE ──build──▶ TRANSMITTING ──sent──▶ AWAITING_ACK ──matching ACK──▶ COMPLETE
//!                       ▲                      │   ▲
//!                       │       timeout        │   │ stale / malformed
//!                       └──────────────────────┘   └───────┘
//!                                              │
//!                        attempts exhausted    ▼
//!                                            FAILED
//! ```

use std::fmt;

use crate::sequence::Sequence;

/// Outcome of the most recent command transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendState {
    /// No command has been sent yet.
    #[default]
    Idle,
    /// The ACK arrived after `attempts` transmissions.
    Complete { sequence: Sequence, attempts: u32 },
    /// No ACK after `attempts` transmissions, or the wait was cancelled.
    Failed { sequence: Sequence, attempts: u32 },
}

impl fmt::Display for SendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendState::Idle => write!(f, "idle"),
            SendState::Complete { sequence, attempts } => {
                write!(f, "complete seq={sequence} after {attempts} attempt(s)")
            }
            SendState::Failed { sequence, attempts } => {
                write!(f, "failed seq={sequence} after {attempts} attempt(s)")
            }
        }
    }
}
