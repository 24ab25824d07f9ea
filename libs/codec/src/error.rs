//! Protocol-level errors for RTMA message encoding and decoding
//!
//! Each variant carries enough context to diagnose the failure without a
//! packet capture: the offending size or field value and the limit that was
//! violated.

use thiserror::Error;

/// Wire codec errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload exceeds the fixed per-message capacity
    #[error("Payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// A decoded header announced a payload length the protocol cannot carry
    #[error("Invalid payload length {declared} in header (type {msg_type}, maximum {max})")]
    InvalidPayloadLength {
        declared: i32,
        msg_type: i32,
        max: usize,
    },

    /// Buffer is too small to contain the expected structure
    #[error("Message too small: need {need} bytes, got {got} (context: {context})")]
    MessageTooSmall {
        need: usize,
        got: usize,
        context: &'static str,
    },

    /// Payload size does not match the message definition it is read as
    #[error("Payload size mismatch for {struct_name}: expected {expected} bytes, got {got}")]
    PayloadSizeMismatch {
        expected: usize,
        got: usize,
        struct_name: &'static str,
    },

    /// Destination address outside the module/host id space
    #[error("Invalid destination: {field} = {value} (allowed {allowed})")]
    InvalidDestination {
        field: &'static str,
        value: i32,
        allowed: &'static str,
    },
}

impl ProtocolError {
    pub fn payload_too_large(size: usize) -> Self {
        Self::PayloadTooLarge {
            size,
            max: crate::MAX_DATA_BYTES,
        }
    }

    pub fn message_too_small(need: usize, got: usize, context: &'static str) -> Self {
        Self::MessageTooSmall { need, got, context }
    }

    /// Get error category for diagnostics
    pub fn category(&self) -> &'static str {
        match self {
            ProtocolError::PayloadTooLarge { .. } => "payload_too_large",
            ProtocolError::InvalidPayloadLength { .. } => "invalid_payload_length",
            ProtocolError::MessageTooSmall { .. } => "message_too_small",
            ProtocolError::PayloadSizeMismatch { .. } => "payload_size_mismatch",
            ProtocolError::InvalidDestination { .. } => "invalid_destination",
        }
    }

    /// True when the error was raised on bytes read from the peer, meaning
    /// the stream can no longer be trusted to be aligned on a message boundary.
    pub fn is_stream_corrupt(&self) -> bool {
        matches!(self, ProtocolError::InvalidPayloadLength { .. })
    }
}
