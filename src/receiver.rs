//! Inbound command dispatch for the motors node.
//!
//! The [`CommandReceiver`] is responsible for everything that happens after a
//! raw datagram arrives:
//! - Decoding it into a [`Frame`] (truncated datagrams are counted and dropped).
//! - Validating the direction flags once, at the boundary.
//! - Asking the [`SequenceTracker`] whether the command is new.
//! - Applying the effect exactly once per new command, on a blocking worker,
//!   and waiting for it before doing anything else.
//! - Acknowledging every command frame, new or duplicate, to the address the
//!   datagram came from.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::command::{Direction, InvalidCommand};
use crate::motor::{MotorDriver, MotorError};
use crate::packet::{DecodeError, EncodeError, Frame};
use crate::sequence::{Sequence, SequenceTracker};
use crate::socket::Transport;

/// Why a datagram could not be dispatched.
///
/// None of these are fatal; [`CommandReceiver::run`] logs them and keeps
/// listening.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The frame was acknowledged but no effect was applied.
    #[error("rejected seq={sequence}: {source}")]
    InvalidCommand {
        sequence: Sequence,
        #[source]
        source: InvalidCommand,
    },

    /// The command was accepted and acknowledged, but the motor failed.
    #[error(transparent)]
    Motor(#[from] MotorError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

/// What happened to one well-formed datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// New command: the effect was applied and the frame acknowledged.
    Applied {
        sequence: Sequence,
        direction: Direction,
    },
    /// Same sequence as the last accepted command: acknowledged again only.
    Duplicate { sequence: Sequence },
    /// Not a pure command frame: no effect, no ACK.
    Ignored,
}

/// Counters kept for the lifetime of the receiver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub applied: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub malformed: u64,
    pub ignored: u64,
    /// Accepted commands whose effect failed.
    pub motor_failures: u64,
    pub acks_sent: u64,
}

/// Receive side of the motors node.
pub struct CommandReceiver<T, M> {
    transport: T,
    motor: Arc<Mutex<M>>,
    tracker: SequenceTracker,
    /// Payload of the last accepted command; reused in place.
    last_payload: Vec<u8>,
    echo_payload: bool,
    idle_timeout: Duration,
    stats: ReceiverStats,
}

impl<T: Transport, M: MotorDriver> CommandReceiver<T, M> {
    pub fn new(transport: T, motor: M) -> Self {
        Self {
            transport,
            motor: Arc::new(Mutex::new(motor)),
            tracker: SequenceTracker::new(),
            last_payload: Vec::new(),
            echo_payload: false,
            idle_timeout: Duration::from_secs(10),
            stats: ReceiverStats::default(),
        }
    }

    /// Copy each command's payload into its ACK.
    pub fn with_echo_payload(mut self, echo: bool) -> Self {
        self.echo_payload = echo;
        self
    }

    /// Receive window between cancellation checks while the link is idle.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Serve until `cancel` fires.  Returns the final counters.
    pub async fn run(&mut self, cancel: &CancellationToken) -> ReceiverStats {
        log::info!("[recv] listening on {}", self.transport.local_addr());
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.transport.recv_timeout(self.idle_timeout) => result,
            };
            match received {
                Ok(Some((bytes, src))) => {
                    if let Err(e) = self.handle_datagram(&bytes, src).await {
                        self.log_failure(&e, src);
                    }
                }
                Ok(None) => log::trace!("[recv] idle for {:?}", self.idle_timeout),
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    self.stats.malformed += 1;
                    log::warn!("[recv] {e}");
                }
                Err(e) => {
                    log::error!("[recv] could not read from socket: {e}");
                    // Avoid spinning on a persistent socket error.
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_millis(100)) => {}
                    }
                }
            }
        }
        log::info!("[recv] shutting down: {:?}", self.stats);
        self.stats
    }

    /// Receive and dispatch a single datagram.
    ///
    /// Returns `Ok(None)` if nothing arrived within the idle timeout.
    pub async fn receive_once(&mut self) -> Result<Option<Dispatch>, DispatchError> {
        match self.transport.recv_timeout(self.idle_timeout).await? {
            Some((bytes, src)) => self.handle_datagram(&bytes, src).await.map(Some),
            None => Ok(None),
        }
    }

    /// Decode, dispatch and acknowledge one datagram from `src`.
    pub async fn handle_datagram(
        &mut self,
        bytes: &[u8],
        src: SocketAddr,
    ) -> Result<Dispatch, DispatchError> {
        let frame = match Frame::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.malformed += 1;
                return Err(e.into());
            }
        };

        if !frame.is_pure_command() {
            log::debug!(
                "[recv] ignoring non-command frame from {src} (cmd={} ack={})",
                frame.header.is_command,
                frame.header.is_ack
            );
            self.stats.ignored += 1;
            return Ok(Dispatch::Ignored);
        }

        let sequence = frame.header.sequence;
        let direction = match frame.direction() {
            Ok(direction) => direction,
            Err(source) => {
                self.stats.rejected += 1;
                self.acknowledge(&frame, src).await?;
                return Err(DispatchError::InvalidCommand { sequence, source });
            }
        };

        if !self.tracker.accept(sequence) {
            log::debug!("[recv] ← duplicate seq={sequence} from {src}");
            self.stats.duplicates += 1;
            self.acknowledge(&frame, src).await?;
            return Ok(Dispatch::Duplicate { sequence });
        }

        log::debug!("[recv] ← CMD seq={sequence} {direction} from {src}");
        self.last_payload.clear();
        self.last_payload.extend_from_slice(&frame.payload);

        let applied = self.actuate(direction).await;
        match applied {
            Ok(()) => self.stats.applied += 1,
            Err(_) => self.stats.motor_failures += 1,
        }
        self.acknowledge(&frame, src).await?;
        applied?;
        Ok(Dispatch::Applied {
            sequence,
            direction,
        })
    }

    /// Run the motor on a short-lived blocking worker and wait for it.
    async fn actuate(&self, direction: Direction) -> Result<(), MotorError> {
        let motor = Arc::clone(&self.motor);
        tokio::task::spawn_blocking(move || {
            let mut motor = motor
                .lock()
                .map_err(|e| MotorError::Worker(e.to_string()))?;
            motor.apply(direction)
        })
        .await
        .map_err(|e| MotorError::Worker(e.to_string()))?
    }

    async fn acknowledge(
        &mut self,
        command: &Frame,
        dest: SocketAddr,
    ) -> Result<(), DispatchError> {
        let payload = if self.echo_payload {
            command.payload.clone()
        } else {
            Vec::new()
        };
        let ack = Frame::ack(command.header.sequence, payload).encode()?;
        self.transport.send_to(&ack, dest).await?;
        self.stats.acks_sent += 1;
        log::debug!("[recv] → ACK seq={} to {dest}", command.header.sequence);
        Ok(())
    }

    fn log_failure(&self, e: &DispatchError, src: SocketAddr) {
        match e {
            DispatchError::Decode(_) | DispatchError::InvalidCommand { .. } => {
                log::warn!("[recv] datagram from {src}: {e}")
            }
            DispatchError::Motor(_) | DispatchError::Encode(_) | DispatchError::Io(_) => {
                log::error!("[recv] datagram from {src}: {e}")
            }
        }
    }

    /// Payload of the last accepted command.
    pub fn last_payload(&self) -> &[u8] {
        &self.last_payload
    }

    pub fn last_sequence(&self) -> Option<Sequence> {
        self.tracker.last_seen()
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
