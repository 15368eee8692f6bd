//! Packet transport towards the multiviewer cards.
//!
//! Two implementations share the [`PacketTransport`] trait:
//!
//! - [`UdpTransport`] (default) owns one bound datagram socket and sends each
//!   packet with `send_to`.  Sending never waits for the peer.
//! - [`TcpTransport`] opens a short-lived connection per packet, writes it
//!   and closes the connection again.
//!
//! # Probing (for beginners)
//!
//! The cards never answer a tally packet, so there is no way to ask "are you
//! there?" in this protocol.  [`PacketTransport::probe`] therefore only
//! checks what the transport itself can see:
//!
//! - TCP: the three-way handshake completed within the timeout.
//! - UDP: a route exists and an empty datagram left the socket.  That says
//!   nothing about whether a card is listening.
//!
//! The UDP probe is a weak heuristic and is reported as such in its message.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::debug;

use crate::domain::TransportKind;

/// Error type for packet delivery.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The OS rejected the connect or send.
    #[error("Connection failed: {source}")]
    Io {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The socket accepted fewer bytes than the packet holds.
    #[error("short write to {addr}: {written} of {expected} bytes")]
    ShortWrite {
        addr: SocketAddr,
        written: usize,
        expected: usize,
    },

    /// Handing the packet to the network took longer than allowed.
    #[error("Operation timeout after {after:?} sending to {addr}")]
    Timeout { addr: SocketAddr, after: Duration },

    /// The target is not an IP address.
    #[error("invalid address: '{0}'")]
    InvalidAddress(String),
}

/// Result of a connectivity probe.  Failures are data, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn reachable(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn unreachable(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }

    pub fn timed_out() -> Self {
        Self::unreachable("Connection timeout")
    }
}

/// Delivers raw packets to a card endpoint.
///
/// Infrastructure implementations use sockets; tests record calls or inject
/// failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PacketTransport: Send + Sync {
    /// Hands `packet` to the network for `addr`.
    async fn send(&self, addr: SocketAddr, packet: &[u8]) -> Result<(), TransportError>;

    /// Best-effort connectivity check, bounded by `limit`.
    async fn probe(&self, addr: SocketAddr, limit: Duration) -> ProbeOutcome;
}

// ── UDP ───────────────────────────────────────────────────────────────────────

/// Datagram transport sharing one socket across all sends.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Binds the sending socket on `local` (use port 0 for an ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns the OS error if the socket cannot be bound.
    pub async fn bind(local: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[async_trait]
impl PacketTransport for UdpTransport {
    async fn send(&self, addr: SocketAddr, packet: &[u8]) -> Result<(), TransportError> {
        let written = self
            .socket
            .send_to(packet, addr)
            .await
            .map_err(|source| TransportError::Io { addr, source })?;
        if written != packet.len() {
            return Err(TransportError::ShortWrite {
                addr,
                written,
                expected: packet.len(),
            });
        }
        debug!(%addr, bytes = written, "udp packet sent");
        Ok(())
    }

    async fn probe(&self, addr: SocketAddr, limit: Duration) -> ProbeOutcome {
        let attempt = async {
            let local: SocketAddr = if addr.is_ipv4() {
                SocketAddr::from(([0, 0, 0, 0], 0))
            } else {
                SocketAddr::from(([0u16; 8], 0))
            };
            let socket = UdpSocket::bind(local).await?;
            socket.connect(addr).await?;
            socket.send(&[]).await
        };

        match timeout(limit, attempt).await {
            Ok(Ok(_)) => ProbeOutcome::reachable(format!(
                "Datagram sent to {addr} (unacknowledged; card presence not confirmed)"
            )),
            Ok(Err(e)) => ProbeOutcome::unreachable(format!("Connection failed: {e}")),
            Err(_) => ProbeOutcome::timed_out(),
        }
    }
}

// ── TCP ───────────────────────────────────────────────────────────────────────

/// Stream transport: connect, write one packet, close.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl PacketTransport for TcpTransport {
    async fn send(&self, addr: SocketAddr, packet: &[u8]) -> Result<(), TransportError> {
        let mut stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::Timeout {
                addr,
                after: self.connect_timeout,
            })?
            .map_err(|source| TransportError::Io { addr, source })?;

        stream
            .write_all(packet)
            .await
            .map_err(|source| TransportError::Io { addr, source })?;
        // The peer may already have closed its side; the packet is out either way.
        let _ = stream.shutdown().await;

        debug!(%addr, bytes = packet.len(), "tcp packet sent");
        Ok(())
    }

    async fn probe(&self, addr: SocketAddr, limit: Duration) -> ProbeOutcome {
        match timeout(limit, TcpStream::connect(addr)).await {
            Ok(Ok(mut stream)) => {
                let _ = stream.shutdown().await;
                ProbeOutcome::reachable(format!("Connected to {addr}"))
            }
            Ok(Err(e)) => ProbeOutcome::unreachable(format!("Connection failed: {e}")),
            Err(_) => ProbeOutcome::timed_out(),
        }
    }
}

/// Builds the transport selected in the configuration.
///
/// # Errors
///
/// Returns the OS error if the UDP socket cannot be bound.
pub async fn build_transport(
    kind: TransportKind,
    connect_timeout: Duration,
) -> io::Result<Arc<dyn PacketTransport>> {
    let transport: Arc<dyn PacketTransport> = match kind {
        TransportKind::Udp => {
            Arc::new(UdpTransport::bind(SocketAddr::from(([0, 0, 0, 0], 0))).await?)
        }
        TransportKind::Tcp => Arc::new(TcpTransport::new(connect_timeout)),
    };
    Ok(transport)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{decode_tally, encode_tally};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[tokio::test]
    async fn test_udp_send_delivers_exact_bytes() {
        // Arrange
        let receiver = UdpSocket::bind(loopback()).await.unwrap();
        let target = receiver.local_addr().unwrap();
        let transport = UdpTransport::bind(loopback()).await.unwrap();

        // Act
        transport.send(target, &encode_tally(6, true)).await.unwrap();

        // Assert
        let mut buf = [0u8; 64];
        let (n, from) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(n, 12);
        assert_eq!(from, transport.local_addr().unwrap());
        let packet = decode_tally(&buf[..n]).unwrap();
        assert_eq!(packet.index, 6);
        assert!(packet.tally_on);
    }

    #[tokio::test]
    async fn test_udp_probe_reports_unacknowledged_success() {
        let receiver = UdpSocket::bind(loopback()).await.unwrap();
        let transport = UdpTransport::bind(loopback()).await.unwrap();

        let outcome = transport
            .probe(receiver.local_addr().unwrap(), Duration::from_secs(1))
            .await;

        assert!(outcome.success);
        assert!(outcome.message.unwrap().contains("unacknowledged"));
    }

    #[tokio::test]
    async fn test_tcp_send_writes_packet_then_closes() {
        let listener = TcpListener::bind(loopback()).await.unwrap();
        let target = listener.local_addr().unwrap();
        let transport = TcpTransport::new(Duration::from_secs(1));

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await.unwrap();
            buf
        });

        transport.send(target, &encode_tally(3, false)).await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received, encode_tally(3, false).to_vec());
    }

    #[tokio::test]
    async fn test_tcp_probe_connects_to_listener() {
        let listener = TcpListener::bind(loopback()).await.unwrap();
        let transport = TcpTransport::new(Duration::from_secs(1));

        let outcome = transport
            .probe(listener.local_addr().unwrap(), Duration::from_secs(1))
            .await;

        assert!(outcome.success, "{outcome:?}");
        assert_eq!(
            outcome.message.unwrap(),
            format!("Connected to {}", listener.local_addr().unwrap())
        );
    }

    #[tokio::test]
    async fn test_tcp_probe_refused_is_unreachable_not_error() {
        // Bind then drop to obtain a port with nothing listening.
        let addr = {
            let listener = TcpListener::bind(loopback()).await.unwrap();
            listener.local_addr().unwrap()
        };
        let transport = TcpTransport::new(Duration::from_secs(1));

        let outcome = transport.probe(addr, Duration::from_secs(1)).await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().starts_with("Connection failed"));
    }

    #[test]
    fn test_probe_outcome_json_shape() {
        let json = serde_json::to_value(ProbeOutcome::timed_out()).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "error": "Connection timeout"}));
    }
}
