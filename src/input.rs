//! Input sampling for the controller.
//!
//! [`InputSource`] is the button-reading collaborator: one call returns the
//! intent for one polling cycle.  The [`Debouncer`] decides which samples are
//! worth sending; a reading has to hold for several polls and differ from the
//! last intent the motors node acknowledged.
//!
//! [`StdinButtons`] replaces the physical buttons with lines typed on stdin
//! (`cw`, `ccw`, `stop`, ...).  Any `FnMut() -> Direction` closure is also an
//! input source, which is what the tests use.

use std::io::BufRead;

use tokio::sync::watch;

use crate::command::Direction;

/// Samples the current command intent.
pub trait InputSource {
    fn poll_input(&mut self) -> Direction;
}

impl<F> InputSource for F
where
    F: FnMut() -> Direction,
{
    fn poll_input(&mut self) -> Direction {
        self()
    }
}

// ---------------------------------------------------------------------------
// Debouncer
// ---------------------------------------------------------------------------

/// Turns a stream of raw samples into intents to send.
#[derive(Debug, Clone)]
pub struct Debouncer {
    threshold: u32,
    candidate: Option<Direction>,
    stable_polls: u32,
    delivered: Option<Direction>,
}

impl Debouncer {
    /// `threshold` consecutive identical samples make a reading stable.
    /// A threshold of `0` behaves like `1`.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            candidate: None,
            stable_polls: 0,
            delivered: None,
        }
    }

    /// Feed one sample.  Returns the intent to send, if any.
    ///
    /// Keeps returning the same intent on every poll until
    /// [`mark_delivered`](Self::mark_delivered) is called for it, so a failed
    /// delivery is retried on the next cycle.
    pub fn observe(&mut self, sample: Direction) -> Option<Direction> {
        if self.candidate == Some(sample) {
            self.stable_polls = self.stable_polls.saturating_add(1);
        } else {
            self.candidate = Some(sample);
            self.stable_polls = 1;
        }

        if self.stable_polls >= self.threshold && self.delivered != Some(sample) {
            Some(sample)
        } else {
            None
        }
    }

    /// Record that the motors node acknowledged `direction`.
    pub fn mark_delivered(&mut self, direction: Direction) {
        self.delivered = Some(direction);
    }

    /// Last acknowledged intent.
    pub fn delivered(&self) -> Option<Direction> {
        self.delivered
    }
}

// ---------------------------------------------------------------------------
// StdinButtons
// ---------------------------------------------------------------------------

/// Button state latched from lines read on stdin.
///
/// A background thread parses each line into a [`Direction`]; the latest
/// valid one is what [`poll_input`](InputSource::poll_input) reports, just as
/// a held button keeps reading the same level.  Starts at `Stop`.
#[derive(Debug)]
pub struct StdinButtons {
    state: watch::Receiver<Direction>,
}

impl StdinButtons {
    /// Start the reader thread.
    pub fn spawn() -> Self {
        let (tx, rx) = watch::channel(Direction::Stop);
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match line.parse::<Direction>() {
                    Ok(direction) => {
                        log::debug!("[input] buttons now {direction}");
                        if tx.send(direction).is_err() {
                            break;
                        }
                    }
                    Err(e) => log::warn!("[input] {e}"),
                }
            }
            log::debug!("[input] stdin closed; holding last button state");
        });
        Self { state: rx }
    }
}

impl InputSource for StdinButtons {
    fn poll_input(&mut self) -> Direction {
        *self.state.borrow()
    }
}
