//! Session-level errors
//!
//! Transport and codec failures pass through unchanged via `#[from]`; the
//! remaining variants are session usage and handshake failures.

use rtma_codec::ProtocolError;
use rtma_config::ConfigError;
use rtma_network::TransportError;
use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Session is not connected")]
    NotConnected,

    #[error("Session is already connected to {peer:?}")]
    AlreadyConnected { peer: Option<SocketAddr> },

    #[error("Invalid server address {addr:?}: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: AddrParseError,
    },

    /// Handshake sent but never acknowledged
    #[error("No ACKNOWLEDGE for {operation} within {timeout:?}")]
    AckTimeout {
        operation: &'static str,
        timeout: Duration,
    },
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    pub fn invalid_address(addr: impl Into<String>, source: AddrParseError) -> Self {
        Self::InvalidAddress {
            addr: addr.into(),
            source,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            ClientError::Transport(e) => e.category(),
            ClientError::Protocol(e) => e.category(),
            ClientError::Config(_) => "config",
            ClientError::NotConnected => "not_connected",
            ClientError::AlreadyConnected { .. } => "already_connected",
            ClientError::InvalidAddress { .. } => "invalid_address",
            ClientError::AckTimeout { .. } => "ack_timeout",
        }
    }

    /// The connection can no longer be used and should be torn down
    pub fn is_fatal(&self) -> bool {
        match self {
            ClientError::Transport(e) => !matches!(e, TransportError::Connect { .. }),
            ClientError::Protocol(e) => e.is_stream_corrupt(),
            _ => false,
        }
    }

    /// Worth retrying the same operation, possibly after reconnecting
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(e) => e.is_retryable(),
            ClientError::AckTimeout { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let short = ClientError::from(TransportError::ShortRead {
            operation: "recv header",
            expected: 48,
            received: 0,
        });
        assert!(short.is_fatal());
        assert_eq!(short.category(), "short_read");

        let oversized = ClientError::from(ProtocolError::payload_too_large(4097));
        assert!(!oversized.is_fatal());
        assert!(!oversized.is_retryable());

        let ack = ClientError::AckTimeout {
            operation: "connect",
            timeout: Duration::from_secs(3),
        };
        assert!(!ack.is_fatal());
        assert!(ack.is_retryable());
        assert_eq!(ack.to_string(), "No ACKNOWLEDGE for connect within 3s");
    }

    #[test]
    fn test_invalid_address_display() {
        let source = "not-an-ip".parse::<std::net::IpAddr>().unwrap_err();
        let err = ClientError::invalid_address("not-an-ip", source);
        assert_eq!(err.category(), "invalid_address");
        assert!(err.to_string().starts_with("Invalid server address \"not-an-ip\""));
    }
}
