//! Synchronous Transport Layer
//!
//! One transport capability interface for the session layer, with exactly
//! one TCP implementation. Readiness polling is selected per build target
//! in [`readiness`]; everything above this module is platform independent.

use crate::Result;
use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

pub mod readiness;
pub mod tcp;


pub use tcp::{ShutdownHandle, TcpTransport};

/// Blocking stream transport used by a client session
///
/// Implementations own their connection exclusively. Methods take `&mut self`
/// where the kernel buffer is consumed or filled so a transport can never be
/// driven from two places at once.
pub trait Transport: Send {
    /// Block until the socket is ready for `direction` or `timeout` elapses
    fn wait_ready(&self, direction: Direction, timeout: Timeout) -> Result<Readiness>;

    /// Write the entire buffer, blocking as needed; returns bytes written
    fn send_all(&mut self, bytes: &[u8]) -> Result<usize>;

    /// Fill `buf` completely; a peer that closes first is a short read
    fn recv_exact(&mut self, buf: &mut [u8], operation: &'static str) -> Result<()>;

    /// Shut down both directions; the transport is unusable afterwards
    fn shutdown(&mut self) -> Result<()>;

    fn peer_addr(&self) -> Option<SocketAddr>;

    fn stats(&self) -> TransportStats;
}

/// Readiness direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Read => write!(f, "read"),
            Direction::Write => write!(f, "write"),
        }
    }
}

/// Outcome of a readiness wait that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
}

/// How long a blocking operation may wait
///
/// Converts from the protocol's floating-point seconds convention: negative
/// means wait forever, exactly zero means a single non-blocking probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    #[default]
    Blocking,
    NonBlocking,
    After(Duration),
}

impl Timeout {
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_nan() || secs < 0.0 {
            Timeout::Blocking
        } else if secs == 0.0 {
            Timeout::NonBlocking
        } else {
            // Too large to represent waits forever
            Duration::try_from_secs_f64(secs)
                .map(Timeout::After)
                .unwrap_or(Timeout::Blocking)
        }
    }

    /// Absolute deadline measured from `now`; `None` waits forever
    pub fn deadline_from(self, now: Instant) -> Option<Instant> {
        match self {
            Timeout::Blocking => None,
            Timeout::NonBlocking => Some(now),
            Timeout::After(duration) => now.checked_add(duration),
        }
    }

    pub fn as_secs_f64(self) -> f64 {
        match self {
            Timeout::Blocking => -1.0,
            Timeout::NonBlocking => 0.0,
            Timeout::After(duration) => duration.as_secs_f64(),
        }
    }
}

impl From<f64> for Timeout {
    fn from(secs: f64) -> Self {
        Timeout::from_secs_f64(secs)
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        if duration.is_zero() {
            Timeout::NonBlocking
        } else {
            Timeout::After(duration)
        }
    }
}

/// Byte counters for one connection
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub connected_duration: Duration,
}
