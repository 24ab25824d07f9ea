//! RTMA Network Infrastructure
//!
//! Synchronous transport for the RTMA client: one blocking TCP connection,
//! readiness polling with explicit timeouts, and the timestamp source used
//! to stamp message headers.

pub mod error;
pub mod time;
pub mod transports;

// Re-export commonly used types
pub use error::{Result, TransportError};
pub use time::{SystemClock, TimeSource};
pub use transports::{
    Direction, Readiness, ShutdownHandle, TcpTransport, Timeout, Transport, TransportStats,
};

/// Default Message Manager port
pub const DEFAULT_PORT: u16 = 7111;

/// Default Message Manager address
pub const DEFAULT_SERVER: &str = "127.0.0.1";
