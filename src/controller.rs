//! Controller (input node) main loop.
//!
//! Every poll interval the controller samples its [`InputSource`], runs the
//! sample through the [`Debouncer`], and hands any resulting intent to the
//! [`ReliableSender`].  Delivery blocks the loop: input is not sampled again
//! until the command is acknowledged or given up on.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::ControllerConfig;
use crate::input::{Debouncer, InputSource};
use crate::sender::{Delivery, ReliableSender, SendError};
use crate::socket::Transport;

/// Counters returned when [`Controller::run`] exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub delivered: u64,
    pub failed: u64,
}

pub struct Controller<T, I> {
    sender: ReliableSender<T>,
    input: I,
    debouncer: Debouncer,
    poll_interval: Duration,
    stats: ControllerStats,
}

impl<T: Transport, I: InputSource> Controller<T, I> {
    pub fn new(
        sender: ReliableSender<T>,
        input: I,
        poll_interval: Duration,
        debounce_polls: u32,
    ) -> Self {
        Self {
            sender,
            input,
            debouncer: Debouncer::new(debounce_polls),
            poll_interval,
            stats: ControllerStats::default(),
        }
    }

    /// Wire a controller from its config around an already-bound transport.
    pub fn from_config(transport: T, input: I, config: &ControllerConfig) -> Self {
        let sender = ReliableSender::new(transport, config.peer, config.retry);
        Self::new(sender, input, config.poll_interval, config.debounce_polls)
    }

    /// Poll until `cancel` fires.
    pub async fn run(&mut self, cancel: &CancellationToken) -> ControllerStats {
        log::info!(
            "[ctl] sending to {} from {}",
            self.sender.peer(),
            self.sender.transport().local_addr()
        );
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match self.poll_once(cancel).await {
                Ok(Some(d)) => log::info!(
                    "[ctl] {} delivered (seq={}, {} attempt(s))",
                    d.direction,
                    d.sequence,
                    d.attempts
                ),
                Ok(None) => {}
                Err(SendError::Cancelled) => break,
                Err(e @ SendError::DeliveryFailed { .. }) => log::warn!("[ctl] {e}"),
                Err(e) => log::error!("[ctl] {e}"),
            }
        }

        log::info!("[ctl] shutting down: {:?}", self.stats);
        self.stats
    }

    /// Take one input sample and deliver it if the debouncer says so.
    ///
    /// A failed intent stays pending and is offered again on the next poll,
    /// under the same sequence number.
    pub async fn poll_once(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Delivery>, SendError> {
        let sample = self.input.poll_input();
        let Some(intent) = self.debouncer.observe(sample) else {
            return Ok(None);
        };

        match self.sender.deliver(intent, &[], cancel).await {
            Ok(delivery) => {
                self.debouncer.mark_delivered(intent);
                self.stats.delivered += 1;
                Ok(Some(delivery))
            }
            Err(SendError::Cancelled) => Err(SendError::Cancelled),
            Err(e) => {
                self.stats.failed += 1;
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    pub fn sender(&self) -> &ReliableSender<T> {
        &self.sender
    }
}
