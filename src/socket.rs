//! Datagram transport abstraction.
//!
//! The protocol core never touches a socket directly; it talks to a
//! [`Transport`].  Two implementations live here:
//! - [`UdpTransport`]: a thin wrapper around `tokio::net::UdpSocket`.
//! - [`MemoryTransport`]: an in-process pair joined by channels, for tests.
//!
//! Transports move raw bytes only.  Encoding and decoding of frames happens in
//! the sender and receiver so a malformed datagram can be logged by the layer
//! that knows what it expected.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};

use crate::packet::MAX_DATAGRAM;

/// A received datagram together with the address it came from.
pub type Datagram = (Vec<u8>, SocketAddr);

/// Connectionless, unreliable datagram I/O.
pub trait Transport: Send + Sync {
    /// Send `bytes` as a single datagram to `dest`.
    fn send_to(
        &self,
        bytes: &[u8],
        dest: SocketAddr,
    ) -> impl Future<Output = io::Result<()>> + Send;

    /// Wait up to `timeout` for the next datagram.
    ///
    /// Returns `Ok(None)` when nothing arrived within the window.  A datagram
    /// that cannot be a valid frame is reported as
    /// [`io::ErrorKind::InvalidData`]; the transport stays usable.
    fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = io::Result<Option<Datagram>>> + Send;

    /// Address this transport receives on.
    fn local_addr(&self) -> SocketAddr;
}

// ---------------------------------------------------------------------------
// UdpTransport
// ---------------------------------------------------------------------------

/// An async UDP socket.
///
/// All methods are `&self` so the socket can be shared across tasks if needed.
#[derive(Debug)]
pub struct UdpTransport {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl UdpTransport {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing port `0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> io::Result<Self> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }
}

impl Transport for UdpTransport {
    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<()> {
        let n = self.inner.send_to(bytes, dest).await?;
        log::trace!("[udp] wrote {n} bytes to {dest}");
        Ok(())
    }

    async fn recv_timeout(&self, timeout: Duration) -> io::Result<Option<Datagram>> {
        // One spare byte tells an oversized datagram apart from a full one.
        let mut buf = vec![0u8; MAX_DATAGRAM + 1];
        match tokio::time::timeout(timeout, self.inner.recv_from(&mut buf)).await {
            Ok(Ok((n, addr))) if n > MAX_DATAGRAM => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("datagram from {addr} exceeds {MAX_DATAGRAM} bytes"),
            )),
            Ok(Ok((n, addr))) => {
                buf.truncate(n);
                Ok(Some((buf, addr)))
            }
            Ok(Err(e)) => Err(e),
            Err(_elapsed) => Ok(None),
        }
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

// ---------------------------------------------------------------------------
// MemoryTransport
// ---------------------------------------------------------------------------

/// One end of an in-memory datagram link.
///
/// Whatever one end sends is delivered to the other end, stamped with the
/// sender's address; the destination passed to `send_to` is ignored.  Nothing
/// is ever lost, so fault injection is layered on top with
/// [`crate::simulator::Simulator`].
#[derive(Debug)]
pub struct MemoryTransport {
    local_addr: SocketAddr,
    tx: mpsc::UnboundedSender<Datagram>,
    rx: Mutex<mpsc::UnboundedReceiver<Datagram>>,
}

impl MemoryTransport {
    /// Create two connected ends with the given addresses.
    pub fn pair(a: SocketAddr, b: SocketAddr) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            Self {
                local_addr: a,
                tx: a_tx,
                rx: Mutex::new(a_rx),
            },
            Self {
                local_addr: b,
                tx: b_tx,
                rx: Mutex::new(b_rx),
            },
        )
    }
}

impl Transport for MemoryTransport {
    async fn send_to(&self, bytes: &[u8], _dest: SocketAddr) -> io::Result<()> {
        self.tx
            .send((bytes.to_vec(), self.local_addr))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer end dropped"))
    }

    async fn recv_timeout(&self, timeout: Duration) -> io::Result<Option<Datagram>> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(datagram)) => Ok(Some(datagram)),
            Ok(None) => Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "peer end dropped",
            )),
            Err(_elapsed) => Ok(None),
        }
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Transport that fails a set number of sends and receives before passing
/// everything through to a [`MemoryTransport`].
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct FlakyTransport {
    inner: MemoryTransport,
    failing_sends: std::sync::atomic::AtomicU32,
    failing_recvs: std::sync::atomic::AtomicU32,
}

#[cfg(test)]
impl FlakyTransport {
    pub(crate) fn new(inner: MemoryTransport, failing_sends: u32, failing_recvs: u32) -> Self {
        Self {
            inner,
            failing_sends: failing_sends.into(),
            failing_recvs: failing_recvs.into(),
        }
    }

    fn take(counter: &std::sync::atomic::AtomicU32) -> bool {
        use std::sync::atomic::Ordering;
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[cfg(test)]
impl Transport for FlakyTransport {
    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<()> {
        if Self::take(&self.failing_sends) {
            return Err(io::Error::other("injected send failure"));
        }
        self.inner.send_to(bytes, dest).await
    }

    async fn recv_timeout(&self, timeout: Duration) -> io::Result<Option<Datagram>> {
        if Self::take(&self.failing_recvs) {
            return Err(io::Error::other("injected receive failure"));
        }
        self.inner.recv_timeout(timeout).await
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr()
    }
}
