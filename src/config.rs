//! Runtime configuration for both roles.
//!
//! Values come from CLI flags in `main.rs`; every struct has a [`Default`]
//! matching the reference deployment (port 5020, 5 s ack timeout on the
//! controller, 10 s receive window on the motors node).  The `from_cli`
//! builders validate what they are given and return [`ConfigError`], which is
//! the only error class that is fatal to the process.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;

/// Default UDP port for both roles.
pub const DEFAULT_PORT: u16 = 5020;

/// Startup configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {what} address {value:?}")]
    InvalidAddress { what: &'static str, value: String },

    #[error("max attempts must be at least 1")]
    ZeroAttempts,

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("could not bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Retransmission bounds for the reliable send loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// How long to wait for a matching ACK after each transmission.
    pub ack_timeout: Duration,
    /// Total transmissions (first send included) before giving up.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(5),
            max_attempts: 10,
        }
    }
}

impl RetryPolicy {
    pub fn new(ack_timeout: Duration, max_attempts: u32) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if ack_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("ack timeout"));
        }
        Ok(Self {
            ack_timeout,
            max_attempts,
        })
    }
}

/// Controller (input node) settings.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Local address the controller socket binds.
    pub bind: SocketAddr,
    /// Motors node address all commands go to.
    pub peer: SocketAddr,
    pub retry: RetryPolicy,
    /// Delay between two input polls.
    pub poll_interval: Duration,
    /// Consecutive identical polls before an intent is sent.
    pub debounce_polls: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            peer: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_millis(10),
            debounce_polls: 3,
        }
    }
}

impl ControllerConfig {
    /// Build from the `-c` / `-o` / `-p` flags.
    ///
    /// The controller binds `client_ip` on [`DEFAULT_PORT`]; the peer port
    /// defaults to [`DEFAULT_PORT`] unless overridden.
    pub fn from_cli(
        client_ip: &str,
        peer_ip: &str,
        peer_port: Option<u16>,
    ) -> Result<Self, ConfigError> {
        let bind = SocketAddr::new(parse_ip("controller", client_ip)?, DEFAULT_PORT);
        let peer = SocketAddr::new(
            parse_ip("motors", peer_ip)?,
            peer_port.unwrap_or(DEFAULT_PORT),
        );
        Ok(Self {
            bind,
            peer,
            ..Self::default()
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_polling(
        mut self,
        interval: Duration,
        debounce_polls: u32,
    ) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroTimeout("poll interval"));
        }
        self.poll_interval = interval;
        self.debounce_polls = debounce_polls.max(1);
        Ok(self)
    }
}

/// Motors (actuator node) settings.
#[derive(Debug, Clone)]
pub struct MotorsConfig {
    pub bind: SocketAddr,
    /// Receive window between cancellation checks when the link is idle.
    pub idle_timeout: Duration,
    /// Copy the command payload into its ACK.
    pub echo_payload: bool,
    /// How long the logging motor holds each movement.
    pub actuation: Duration,
}

impl Default for MotorsConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            idle_timeout: Duration::from_secs(10),
            echo_payload: false,
            actuation: Duration::from_millis(10),
        }
    }
}

impl MotorsConfig {
    /// Build from the `-i` / `-p` flags.
    pub fn from_cli(listen_ip: &str, port: Option<u16>) -> Result<Self, ConfigError> {
        let bind = SocketAddr::new(parse_ip("listen", listen_ip)?, port.unwrap_or(DEFAULT_PORT));
        Ok(Self {
            bind,
            ..Self::default()
        })
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Result<Self, ConfigError> {
        if idle_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("idle timeout"));
        }
        self.idle_timeout = idle_timeout;
        Ok(self)
    }
}

fn parse_ip(what: &'static str, value: &str) -> Result<IpAddr, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidAddress {
        what,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_defaults_to_port_5020() {
        let cfg = ControllerConfig::from_cli("192.168.1.10", "192.168.1.20", None).unwrap();
        assert_eq!(cfg.bind, "192.168.1.10:5020".parse().unwrap());
        assert_eq!(cfg.peer, "192.168.1.20:5020".parse().unwrap());
        assert_eq!(cfg.retry.ack_timeout, Duration::from_secs(5));
    }

    #[test]
    fn peer_port_override() {
        let cfg = ControllerConfig::from_cli("10.0.0.1", "10.0.0.2", Some(6000)).unwrap();
        assert_eq!(cfg.peer.port(), 6000);
        assert_eq!(cfg.bind.port(), DEFAULT_PORT);
    }

    #[test]
    fn bad_peer_address_is_rejected() {
        let err = ControllerConfig::from_cli("10.0.0.1", "not-an-ip", None).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidAddress { what: "motors", .. }
        ));
    }

    #[test]
    fn retry_policy_bounds() {
        assert!(matches!(
            RetryPolicy::new(Duration::from_secs(1), 0),
            Err(ConfigError::ZeroAttempts)
        ));
        assert!(matches!(
            RetryPolicy::new(Duration::ZERO, 3),
            Err(ConfigError::ZeroTimeout(_))
        ));
        let p = RetryPolicy::new(Duration::from_millis(50), 3).unwrap();
        assert_eq!(p.max_attempts, 3);
    }

    #[test]
    fn motors_defaults() {
        let cfg = MotorsConfig::from_cli("0.0.0.0", None).unwrap();
        assert_eq!(cfg.bind.port(), DEFAULT_PORT);
        assert_eq!(cfg.idle_timeout, Duration::from_secs(10));
        assert!(!cfg.echo_payload);
        assert!(MotorsConfig::from_cli("0.0.0.0.0", None).is_err());
    }
}
