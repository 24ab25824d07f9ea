//! # RTMA Client
//!
//! ## Purpose
//!
//! Publish/subscribe client for the RTMA Message Manager. A [`Client`] is
//! one module's session: it performs the CONNECT handshake, sends and
//! receives framed messages, and manages subscriptions through the
//! acknowledgement protocol.
//!
//! ## Architecture Role
//!
//! ```text
//! rtma-config ──▶ rtma-client ◀── rtma-codec    (header, payload, verbs)
//!                     │
//!                     ▼
//!               rtma-network                      (TCP, readiness, clock)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use rtma_client::{AckStatus, Client};
//!
//! # fn main() -> rtma_client::Result<()> {
//! let mut client = Client::new(0, 0);
//! client.connect("127.0.0.1", 7111)?;
//!
//! if client.subscribe(1234)? == AckStatus::Acknowledged {
//!     client.send(1234, b"hello")?;
//!     if let Some(msg) = client.receive(1.0)? {
//!         println!("{}", msg.dump());
//!     }
//! }
//! client.disconnect()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod session;

pub use error::{ClientError, Result};
pub use session::{AckStatus, Client, ClientState, DEFAULT_ACK_TIMEOUT};

// Re-export the types every caller needs alongside a session
pub use rtma_codec::{ControlVerb, Message, MessageHeader, MessageType, Payload};
pub use rtma_network::Timeout;
