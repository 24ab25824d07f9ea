//! Message Header Implementation
//!
//! The header is identical for all messages and carries sequencing, timing
//! and addressing information.

use crate::constants::{HostId, ModuleId, MAX_DATA_BYTES};
use crate::error::ProtocolError;
use crate::message_type::MessageType;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// Message Header (48 bytes)
///
/// Transmitted as one contiguous block before any payload bytes, in
/// host-native byte order. The protocol assumes client and broker share
/// endianness; no normalization is performed.
///
/// **CRITICAL**: Field order matches the Message Manager's struct layout and
/// packs to exactly 48 bytes without padding. DO NOT REORDER.
///
/// ```text
/// ┌─────────────────┬──────────────────────────────┐
/// │ MessageHeader   │ Payload                      │
/// │ (48 bytes)      │ (0..=4096 bytes)             │
/// └─────────────────┴──────────────────────────────┘
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, AsBytes, FromBytes, FromZeroes)]
pub struct MessageHeader {
    pub msg_type: i32,  // bytes 0-3
    pub msg_count: i32, // bytes 4-7, sender's sequence number

    pub send_time: f64, // bytes 8-15, seconds
    pub recv_time: f64, // bytes 16-23, zero until the receiver stamps it

    pub src_host_id: HostId,    // bytes 24-25
    pub src_mod_id: ModuleId,   // bytes 26-27
    pub dest_host_id: HostId,   // bytes 28-29
    pub dest_mod_id: ModuleId,  // bytes 30-31, 0 = broadcast

    pub num_data_bytes: i32,  // bytes 32-35
    pub remaining_bytes: i32, // bytes 36-39
    pub is_dynamic: i32,      // bytes 40-43
    pub reserved: i32,        // bytes 44-47
}
// Total: EXACTLY 48 bytes with zero padding!

impl MessageHeader {
    /// Header size in bytes
    pub const SIZE: usize = 48;

    /// Header for a message of the given type with every other field zeroed
    pub fn new(msg_type: impl Into<MessageType>) -> Self {
        let mut header = Self::new_zeroed();
        header.msg_type = msg_type.into().raw();
        header
    }

    /// Decoded message type
    pub fn message_type(&self) -> MessageType {
        MessageType::from(self.msg_type)
    }

    /// Decode a header from the first [`Self::SIZE`] bytes of `bytes`
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Self::read_from_prefix(bytes)
            .ok_or_else(|| ProtocolError::message_too_small(Self::SIZE, bytes.len(), "header"))
    }

    /// Number of payload bytes that follow this header on the wire
    ///
    /// Fails when the peer announced a negative length or one larger than
    /// the payload capacity; the stream is not usable after that.
    pub fn payload_len(&self) -> Result<usize, ProtocolError> {
        usize::try_from(self.num_data_bytes)
            .ok()
            .filter(|len| *len <= MAX_DATA_BYTES)
            .ok_or(ProtocolError::InvalidPayloadLength {
                declared: self.num_data_bytes,
                msg_type: self.msg_type,
                max: MAX_DATA_BYTES,
            })
    }

    /// A message with no payload carries all of its meaning in its type
    pub fn is_signal(&self) -> bool {
        self.num_data_bytes == 0
    }

    /// Time spent in flight, if both ends stamped the header
    pub fn latency(&self) -> Option<f64> {
        (self.recv_time > 0.0).then(|| self.recv_time - self.send_time)
    }
}
