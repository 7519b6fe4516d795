//! Fault-injecting transport for deterministic testing.
//!
//! Real networks drop and duplicate datagrams.  To exercise the retry loop and
//! duplicate suppression without depending on actual network conditions, the
//! [`Simulator`] wraps any [`Transport`] and intercepts sends, applying a
//! configurable fault model:
//!
//! | Fault         | Description                                     |
//! |---------------|-------------------------------------------------|
//! | Packet loss   | Drop a datagram with probability `loss_rate`.   |
//! | Duplication   | Deliver a datagram twice (`duplicate_rate`).    |
//!
//! Decisions come from a `StdRng` seeded with `seed`, so a failing run can be
//! replayed with the same configuration.

use std::io;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::socket::{Datagram, Transport};

/// Configuration for the fault-injection model.
///
/// Probabilities are clamped into `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Probability that any given outbound datagram is silently dropped.
    pub loss_rate: f64,
    /// Probability that a delivered datagram is sent a second time.
    pub duplicate_rate: f64,
    /// RNG seed.
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default: the simulator is a transparent pass-through.
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            seed: 0,
        }
    }
}

/// What happened to one outbound datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fate {
    Dropped,
    Delivered,
    Duplicated,
}

/// A fault-injecting wrapper around another transport.
#[derive(Debug)]
pub struct Simulator<T> {
    inner: T,
    config: SimulatorConfig,
    rng: Mutex<StdRng>,
}

impl<T: Transport> Simulator<T> {
    pub fn new(inner: T, config: SimulatorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            inner,
            config,
            rng: Mutex::new(rng),
        }
    }

    fn roll(&self) -> Fate {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if rng.random_bool(self.config.loss_rate.clamp(0.0, 1.0)) {
            Fate::Dropped
        } else if rng.random_bool(self.config.duplicate_rate.clamp(0.0, 1.0)) {
            Fate::Duplicated
        } else {
            Fate::Delivered
        }
    }
}

impl<T: Transport> Transport for Simulator<T> {
    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<()> {
        match self.roll() {
            Fate::Dropped => {
                log::trace!("[sim] dropped {} bytes to {dest}", bytes.len());
                Ok(())
            }
            Fate::Delivered => self.inner.send_to(bytes, dest).await,
            Fate::Duplicated => {
                log::trace!("[sim] duplicated {} bytes to {dest}", bytes.len());
                self.inner.send_to(bytes, dest).await?;
                self.inner.send_to(bytes, dest).await
            }
        }
    }

    async fn recv_timeout(&self, timeout: Duration) -> io::Result<Option<Datagram>> {
        self.inner.recv_timeout(timeout).await
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::MemoryTransport;

    fn link() -> (MemoryTransport, MemoryTransport) {
        MemoryTransport::pair(
            "127.0.0.1:1001".parse().unwrap(),
            "127.0.0.1:1002".parse().unwrap(),
        )
    }

    async fn drain(t: &MemoryTransport) -> usize {
        let mut n = 0;
        while t
            .recv_timeout(Duration::from_millis(10))
            .await
            .unwrap()
            .is_some()
        {
            n += 1;
        }
        n
    }

    #[tokio::test]
    async fn default_config_is_pass_through() {
        let (a, b) = link();
        let sim = Simulator::new(a, SimulatorConfig::default());
        for _ in 0..20 {
            sim.send_to(b"x", b.local_addr()).await.unwrap();
        }
        assert_eq!(drain(&b).await, 20);
    }

    #[tokio::test]
    async fn full_loss_drops_everything() {
        let (a, b) = link();
        let sim = Simulator::new(
            a,
            SimulatorConfig {
                loss_rate: 1.0,
                ..SimulatorConfig::default()
            },
        );
        for _ in 0..10 {
            sim.send_to(b"x", b.local_addr()).await.unwrap();
        }
        assert_eq!(drain(&b).await, 0);
    }

    #[tokio::test]
    async fn full_duplication_doubles_everything() {
        let (a, b) = link();
        let sim = Simulator::new(
            a,
            SimulatorConfig {
                duplicate_rate: 1.0,
                ..SimulatorConfig::default()
            },
        );
        for _ in 0..5 {
            sim.send_to(b"x", b.local_addr()).await.unwrap();
        }
        assert_eq!(drain(&b).await, 10);
    }

    #[tokio::test]
    async fn same_seed_same_losses() {
        let config = SimulatorConfig {
            loss_rate: 0.5,
            duplicate_rate: 0.0,
            seed: 42,
        };
        let mut counts = Vec::new();
        for _ in 0..2 {
            let (a, b) = link();
            let sim = Simulator::new(a, config.clone());
            for _ in 0..50 {
                sim.send_to(b"x", b.local_addr()).await.unwrap();
            }
            counts.push(drain(&b).await);
        }
        assert_eq!(counts[0], counts[1]);
        assert!(counts[0] > 0 && counts[0] < 50);
    }
}
