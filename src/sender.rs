//! Outbound command delivery with stop-and-wait reliability.
//!
//! [`ReliableSender`] owns the controller's transport and the alternating
//! sequence bit.  One call to [`ReliableSender::deliver`] runs the whole
//! Build → Transmit → Await → Validate → Complete cycle for one command.
//!
//! # Stop-and-Wait contract
//! - At most **one** command is in flight at any moment.
//! - Every new command flips the sequence bit.  The exception is a retry:
//!   after a failed delivery, the next command for the same direction reuses
//!   the failed sequence.  If the motors node did apply it, the retry is
//!   acknowledged as a duplicate; if it never arrived, the retry is applied.
//! - On timeout: resend the same bytes unchanged, up to
//!   [`RetryPolicy::max_attempts`] transmissions in total.
//! - A stale or malformed datagram does not trigger a retransmission; the
//!   sender keeps waiting until the current attempt's deadline.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::command::Direction;
use crate::config::RetryPolicy;
use crate::packet::{EncodeError, Frame};
use crate::sequence::Sequence;
use crate::socket::Transport;
use crate::state::SendState;

/// Errors surfaced by [`ReliableSender::deliver`].
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("transport error: {0}")]
    Io(#[from] io::Error),

    #[error("no ack for seq={sequence} after {attempts} attempt(s)")]
    DeliveryFailed { sequence: Sequence, attempts: u32 },

    #[error("delivery cancelled")]
    Cancelled,
}

/// A command that the peer acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub sequence: Sequence,
    pub direction: Direction,
    /// Transmissions needed (1 = acknowledged on the first send).
    pub attempts: u32,
}

/// Stop-and-wait send side of the controller.
#[derive(Debug)]
pub struct ReliableSender<T> {
    transport: T,
    peer: SocketAddr,
    policy: RetryPolicy,
    /// Sequence of the most recent command; flipped before each new one.
    sequence: Sequence,
    /// Last command that was never acknowledged.
    unresolved: Option<(Direction, Sequence)>,
    state: SendState,
}

impl<T: Transport> ReliableSender<T> {
    /// Create a sender whose first command carries sequence `0`.
    pub fn new(transport: T, peer: SocketAddr, policy: RetryPolicy) -> Self {
        Self {
            transport,
            peer,
            policy,
            sequence: Sequence::One,
            unresolved: None,
            state: SendState::Idle,
        }
    }

    /// Send one command and wait until the peer acknowledges it.
    ///
    /// Returns [`SendError::DeliveryFailed`] once every attempt timed out,
    /// [`SendError::Cancelled`] as soon as `cancel` fires, and
    /// [`SendError::Io`] if the transport fails.
    pub async fn deliver(
        &mut self,
        direction: Direction,
        payload: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Delivery, SendError> {
        // Build
        let sequence = match self.unresolved {
            Some((pending, sequence)) if pending == direction => sequence,
            _ => self.sequence.flip(),
        };
        let bytes = Frame::command(sequence, direction, payload.to_vec()).encode()?;
        self.sequence = sequence;

        let max = self.policy.max_attempts;
        let mut attempts = 0;
        let outcome = loop {
            if attempts == max {
                break Err(SendError::DeliveryFailed { sequence, attempts });
            }
            if cancel.is_cancelled() {
                break Err(SendError::Cancelled);
            }

            // Transmit
            if let Err(e) = self.transport.send_to(&bytes, self.peer).await {
                break Err(e.into());
            }
            attempts += 1;
            if attempts == 1 {
                log::debug!("[send] → CMD seq={sequence} to {}", self.peer);
            } else {
                log::info!("[send] timeout; retransmitted seq={sequence} ({attempts}/{max})");
            }

            // Await
            let deadline = Instant::now() + self.policy.ack_timeout;
            match self.await_ack(sequence, deadline, cancel).await {
                Ok(true) => break Ok(()),
                Ok(false) => {}
                Err(e) => break Err(e),
            }
        };

        match outcome {
            Ok(()) => {
                self.unresolved = None;
                self.state = SendState::Complete { sequence, attempts };
                Ok(Delivery {
                    sequence,
                    direction,
                    attempts,
                })
            }
            Err(e) => {
                self.unresolved = Some((direction, sequence));
                self.state = SendState::Failed { sequence, attempts };
                Err(e)
            }
        }
    }

    /// Wait for the ACK of `sequence` until `deadline`.
    ///
    /// Returns `Ok(false)` on timeout.  Non-matching and undecodable datagrams
    /// are logged and skipped without extending the deadline.
    async fn await_ack(
        &self,
        sequence: Sequence,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<bool, SendError> {
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }

            let received = tokio::select! {
                _ = cancel.cancelled() => return Err(SendError::Cancelled),
                result = self.transport.recv_timeout(deadline - now) => result,
            };
            let (bytes, src) = match received {
                Ok(Some(datagram)) => datagram,
                Ok(None) => continue,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    log::warn!("[send] discarding datagram: {e}");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            match Frame::decode(&bytes) {
                Err(e) => log::warn!("[send] discarding datagram from {src}: {e}"),
                Ok(frame) if frame.acknowledges(sequence) => {
                    log::debug!("[send] ← ACK seq={sequence} from {src}");
                    return Ok(true);
                }
                Ok(frame) => log::debug!(
                    "[send] ← stale frame from {src} (ack={} seq={}); waiting for seq={sequence}",
                    frame.header.is_ack,
                    frame.header.sequence
                ),
            }
        }
    }

    /// Sequence carried by the most recent command.
    pub fn last_sequence(&self) -> Sequence {
        self.sequence
    }

    /// Outcome of the most recent delivery.
    pub fn state(&self) -> SendState {
        self.state
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
