//! Motor driver interface.
//!
//! The receiver never drives pins itself.  It hands each accepted command to
//! a [`MotorDriver`], which is synchronous and may block for the duration of
//! the movement.  Two drivers ship with the crate:
//! - [`LogMotor`] logs the movement and holds for the actuation delay.
//! - [`RecordingMotor`] remembers every effect, for tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

use crate::command::Direction;

/// Failures while applying an effect.
#[derive(Debug, Error)]
pub enum MotorError {
    #[error("motor hardware error: {0}")]
    Hardware(String),

    #[error("motor worker failed: {0}")]
    Worker(String),
}

/// Anything that can turn a [`Direction`] into a physical effect.
///
/// `apply(Direction::Stop)` must be safe to call any number of times.
pub trait MotorDriver: Send + 'static {
    fn apply(&mut self, direction: Direction) -> Result<(), MotorError>;
}

/// Driver that only logs and waits, standing in for the GPIO motor board.
#[derive(Debug, Clone)]
pub struct LogMotor {
    actuation: Duration,
}

impl LogMotor {
    pub fn new(actuation: Duration) -> Self {
        Self { actuation }
    }
}

impl MotorDriver for LogMotor {
    fn apply(&mut self, direction: Direction) -> Result<(), MotorError> {
        match direction {
            Direction::Clockwise => log::info!("[motor] Clockwise"),
            Direction::CounterClockwise => log::info!("[motor] Anti-clockwise"),
            Direction::Stop => {
                // Stopping only drops the enable line; nothing to hold.
                log::info!("[motor] Stopping");
                return Ok(());
            }
        }
        std::thread::sleep(self.actuation);
        Ok(())
    }
}

/// Driver that records every applied effect.
///
/// Clones share the same log, so a test can keep one handle while the
/// receiver owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingMotor {
    applied: Arc<Mutex<Vec<Direction>>>,
}

impl RecordingMotor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every effect applied so far, oldest first.
    pub fn applied(&self) -> Vec<Direction> {
        match self.applied.lock() {
            Ok(log) => log.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl MotorDriver for RecordingMotor {
    fn apply(&mut self, direction: Direction) -> Result<(), MotorError> {
        self.applied
            .lock()
            .map_err(|e| MotorError::Hardware(e.to_string()))?
            .push(direction);
        Ok(())
    }
}
