//! # RTMA Protocol Codec
//!
//! ## Purpose
//!
//! This crate contains the "Rules" layer of the RTMA client:
//! - The fixed 48-byte message header layout
//! - The message-type space (reserved control verbs vs. application types)
//! - The capacity-bounded payload buffer
//! - Wire layouts of the control message definitions
//!
//! ## Architecture Role
//!
//! ```text
//! rtma-codec → rtma-client ← rtma-network
//!     ↑             ↓              ↑
//! Header Layout  Session       Sockets
//! Message Types  Ack Protocol  Readiness
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Network transport logic (belongs in rtma-network)
//! - Session state, sequencing or acknowledgement handling (rtma-client)
//!
//! ## Portability
//!
//! Headers and definitions are encoded in host-native byte order with C
//! layout. A client and the Message Manager it talks to must share
//! endianness; this mirrors every existing RTMA deployment.

pub mod constants;
pub mod definitions;
pub mod error;
pub mod header;
pub mod message;
pub mod message_type;
pub mod payload;

pub use constants::*;
pub use definitions::{
    ConnectData, FailSubscribe, FailedMessage, ForceDisconnect, MessageDefinition, ModuleReady,
    SaveMessageLog, SubscriptionControl,
};
pub use error::ProtocolError;
pub use header::MessageHeader;
pub use message::Message;
pub use message_type::{ControlVerb, MessageType};
pub use payload::Payload;
