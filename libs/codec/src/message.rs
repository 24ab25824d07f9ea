//! Complete RTMA message: header plus bounded payload
//!
//! Encoding always produces the header as one contiguous block followed by
//! exactly `num_data_bytes` payload bytes. Decoding is split in two steps
//! because the payload length is only known once the header is read.

use crate::definitions::MessageDefinition;
use crate::error::ProtocolError;
use crate::header::MessageHeader;
use crate::message_type::MessageType;
use crate::payload::Payload;
use bytes::{BufMut, BytesMut};
use std::fmt::Write as _;
use zerocopy::{AsBytes, FromBytes};

/// One unit of wire communication
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub header: MessageHeader,
    pub payload: Payload,
}

impl Message {
    /// Build a message, keeping `num_data_bytes` consistent with the payload
    pub fn new(mut header: MessageHeader, payload: Payload) -> Self {
        header.num_data_bytes = payload.len() as i32;
        Self { header, payload }
    }

    pub fn message_type(&self) -> MessageType {
        self.header.message_type()
    }

    pub fn is_signal(&self) -> bool {
        self.payload.is_empty()
    }

    /// Decode the payload as a typed message definition
    pub fn payload_as<T: FromBytes>(&self) -> Result<T, ProtocolError> {
        self.payload.read_struct()
    }

    /// Decode the payload when this message is the verb `T` belongs to
    pub fn definition<T: MessageDefinition>(&self) -> Option<T> {
        if self.message_type().is(T::VERB) {
            self.payload.read_struct().ok()
        } else {
            None
        }
    }

    /// Total encoded size: header plus payload
    pub fn wire_len(&self) -> usize {
        MessageHeader::SIZE + self.payload.len()
    }

    /// Append the wire encoding to `buf`
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(self.wire_len());
        buf.put_slice(self.header.as_bytes());
        buf.put_slice(&self.payload);
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        self.encode_into(&mut buf);
        buf
    }

    /// Decode a complete message from a contiguous buffer
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let header = MessageHeader::decode(bytes)?;
        let len = header.payload_len()?;
        let body = &bytes[MessageHeader::SIZE..];
        if body.len() < len {
            return Err(ProtocolError::message_too_small(
                MessageHeader::SIZE + len,
                bytes.len(),
                "payload",
            ));
        }
        Ok(Self {
            header,
            payload: Payload::copy_from_slice(&body[..len])?,
        })
    }

    /// Human-readable dump: header fields, then the payload in 8-byte hex rows
    pub fn dump(&self) -> String {
        let h = &self.header;
        let mut out = String::new();
        let _ = writeln!(out, "-----RTMA Header-----");
        let _ = writeln!(out, "msg_type:\t\t{} ({})", h.msg_type, h.message_type());
        let _ = writeln!(out, "msg_count:\t\t{}", h.msg_count);
        let _ = writeln!(out, "send_time:\t\t{:.6}", h.send_time);
        let _ = writeln!(out, "recv_time:\t\t{:.6}", h.recv_time);
        let _ = writeln!(out, "src_host_id:\t\t{}", h.src_host_id);
        let _ = writeln!(out, "src_mod_id:\t\t{}", h.src_mod_id);
        let _ = writeln!(out, "dest_host_id:\t\t{}", h.dest_host_id);
        let _ = writeln!(out, "dest_mod_id:\t\t{}", h.dest_mod_id);
        let _ = writeln!(out, "num_data_bytes:\t\t{}", h.num_data_bytes);
        let _ = writeln!(out, "is_dynamic:\t\t{}", h.is_dynamic);
        let _ = writeln!(out, "reserved:\t\t{}", h.reserved);

        if self.payload.is_empty() {
            return out;
        }

        let _ = writeln!(out, "-----Data-----");
        for (row, chunk) in self.payload.chunks(8).enumerate() {
            let printable: String = chunk
                .iter()
                .map(|b| if b.is_ascii_graphic() { *b as char } else { '.' })
                .collect();
            let _ = writeln!(out, "{:04}: {:<16} | {}", row * 8, hex::encode(chunk), printable);
        }
        out
    }
}
