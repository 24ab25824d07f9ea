//! Transport Error Types
//!
//! Every failing socket operation is reported with the operation name and
//! the underlying OS error. Whether a failure ends the process, triggers a
//! reconnect or is retried is decided by the caller.

use std::net::SocketAddr;
use thiserror::Error;

use crate::transports::Direction;

/// Main transport error type
#[derive(Error, Debug)]
pub enum TransportError {
    /// Could not open a connection to the broker
    #[error("Connection error: failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// A socket option could not be applied or did not take effect
    #[error("Socket option error: {option}: {message}")]
    SocketOption {
        option: &'static str,
        message: String,
    },

    /// Readiness polling failed
    #[error("Poll error: waiting for {direction} readiness: {source}")]
    Poll {
        direction: Direction,
        source: std::io::Error,
    },

    /// Generic I/O errors
    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: &'static str,
        source: std::io::Error,
    },

    /// Peer closed the connection in the middle of a message
    #[error("Short read during {operation}: expected {expected} bytes, received {received}")]
    ShortRead {
        operation: &'static str,
        expected: usize,
        received: usize,
    },
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Create an I/O error tagged with the failing operation
    pub fn io(operation: &'static str, source: std::io::Error) -> Self {
        Self::Io { operation, source }
    }

    /// Create a socket option error
    pub fn socket_option(option: &'static str, message: impl Into<String>) -> Self {
        Self::SocketOption {
            option,
            message: message.into(),
        }
    }

    /// A truncated message: the stream is no longer aligned on a header
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, TransportError::ShortRead { .. })
    }

    /// Check if reconnecting may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Connect { .. } => true,
            TransportError::Io { .. } => true,
            TransportError::ShortRead { .. } => true,
            TransportError::Poll { .. } => false,
            TransportError::SocketOption { .. } => false,
        }
    }

    /// Get error category for diagnostics
    pub fn category(&self) -> &'static str {
        match self {
            TransportError::Connect { .. } => "connect",
            TransportError::SocketOption { .. } => "socket_option",
            TransportError::Poll { .. } => "poll",
            TransportError::Io { .. } => "io",
            TransportError::ShortRead { .. } => "short_read",
        }
    }
}
