//! TCP Transport Implementation
//!
//! Blocking TCP connection to the Message Manager. Nagle's algorithm is
//! disabled so each message leaves as soon as it is written, and the option
//! is read back after setting it: a socket that still coalesces sends is
//! refused rather than silently adding latency.

use super::{readiness, Direction, Readiness, Timeout, Transport, TransportStats};
use crate::{Result, TransportError};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Instant;
use tracing::{debug, info, warn};

/// TCP connection owned by one client session
pub struct TcpTransport {
    stream: TcpStream,
    peer_addr: SocketAddr,
    connected_at: Instant,
    bytes_sent: u64,
    bytes_received: u64,
}

impl TcpTransport {
    /// Connect to a numeric broker address and configure the socket
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        info!("Connecting to RTMA message manager at {}", addr);

        let stream =
            TcpStream::connect(addr).map_err(|source| TransportError::Connect { addr, source })?;

        let transport = Self::from_stream(stream)?;
        info!("Successfully connected to {}", transport.peer_addr);
        Ok(transport)
    }

    /// Wrap an already connected stream, applying the protocol's socket options
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        configure_socket(&stream)?;

        let peer_addr = stream
            .peer_addr()
            .map_err(|e| TransportError::io("peer_addr", e))?;

        Ok(Self {
            stream,
            peer_addr,
            connected_at: Instant::now(),
            bytes_sent: 0,
            bytes_received: 0,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.stream
            .local_addr()
            .map_err(|e| TransportError::io("local_addr", e))
    }

    /// Handle that can shut the connection down from another thread,
    /// unblocking any call waiting on it
    pub fn shutdown_handle(&self) -> Result<ShutdownHandle> {
        let stream = self
            .stream
            .try_clone()
            .map_err(|e| TransportError::io("clone stream", e))?;
        Ok(ShutdownHandle { stream })
    }
}

fn configure_socket(stream: &TcpStream) -> Result<()> {
    stream
        .set_nodelay(true)
        .map_err(|e| TransportError::socket_option("TCP_NODELAY", e.to_string()))?;

    let applied = stream
        .nodelay()
        .map_err(|e| TransportError::socket_option("TCP_NODELAY", e.to_string()))?;
    if !applied {
        warn!("TCP_NODELAY did not take effect");
        return Err(TransportError::socket_option(
            "TCP_NODELAY",
            "option reads back as disabled after being set",
        ));
    }

    set_reuse_addr(stream)
}

#[cfg(unix)]
fn set_reuse_addr(stream: &TcpStream) -> Result<()> {
    use nix::sys::socket::{setsockopt, sockopt};

    setsockopt(stream, sockopt::ReuseAddr, &true)
        .map_err(|e| TransportError::socket_option("SO_REUSEADDR", e.to_string()))
}

#[cfg(not(unix))]
fn set_reuse_addr(_stream: &TcpStream) -> Result<()> {
    debug!("SO_REUSEADDR not applied on this target");
    Ok(())
}

impl Transport for TcpTransport {
    fn wait_ready(&self, direction: Direction, timeout: Timeout) -> Result<Readiness> {
        readiness::wait(&self.stream, direction, timeout)
            .map_err(|source| TransportError::Poll { direction, source })
    }

    fn send_all(&mut self, bytes: &[u8]) -> Result<usize> {
        self.stream
            .write_all(bytes)
            .map_err(|e| TransportError::io("send", e))?;

        self.bytes_sent += bytes.len() as u64;
        Ok(bytes.len())
    }

    fn recv_exact(&mut self, buf: &mut [u8], operation: &'static str) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(TransportError::ShortRead {
                        operation,
                        expected: buf.len(),
                        received: filled,
                    })
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::io(operation, e)),
            }
        }

        self.bytes_received += filled as u64;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => {}
            // Peer already gone; nothing left to tear down
            Err(e) if e.kind() == ErrorKind::NotConnected => {
                debug!(peer = %self.peer_addr, "Connection already closed by peer");
            }
            Err(e) => return Err(TransportError::io("shutdown", e)),
        }
        info!("Closed TCP connection to {}", self.peer_addr);
        Ok(())
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.peer_addr)
    }

    fn stats(&self) -> TransportStats {
        TransportStats {
            bytes_sent: self.bytes_sent,
            bytes_received: self.bytes_received,
            connected_duration: self.connected_at.elapsed(),
        }
    }
}

/// Cross-thread cancellation for a blocked transport
pub struct ShutdownHandle {
    stream: TcpStream,
}

impl ShutdownHandle {
    pub fn shutdown(&self) -> Result<()> {
        self.stream
            .shutdown(Shutdown::Both)
            .map_err(|e| TransportError::io("shutdown", e))
    }
}
