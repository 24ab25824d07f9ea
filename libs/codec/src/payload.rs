//! Capacity-bounded message payload
//!
//! Replaces the fixed 4096-byte buffer embedded in every message with an
//! owned buffer whose length is checked once, at construction.

use crate::constants::MAX_DATA_BYTES;
use crate::error::ProtocolError;
use bytes::Bytes;
use std::ops::Deref;
use zerocopy::{AsBytes, FromBytes};

/// Owned payload of at most [`MAX_DATA_BYTES`] bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload(Bytes);

impl Payload {
    /// Empty payload, as carried by signals
    pub fn empty() -> Self {
        Self(Bytes::new())
    }

    pub fn new(data: impl Into<Bytes>) -> Result<Self, ProtocolError> {
        let data = data.into();
        if data.len() > MAX_DATA_BYTES {
            return Err(ProtocolError::payload_too_large(data.len()));
        }
        Ok(Self(data))
    }

    pub fn copy_from_slice(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() > MAX_DATA_BYTES {
            return Err(ProtocolError::payload_too_large(data.len()));
        }
        Ok(Self(Bytes::copy_from_slice(data)))
    }

    /// Payload holding the raw bytes of a message definition struct
    pub fn from_struct<T: AsBytes>(value: &T) -> Result<Self, ProtocolError> {
        Self::copy_from_slice(value.as_bytes())
    }

    /// Reinterpret the payload as a message definition struct
    ///
    /// The payload must be exactly `size_of::<T>()` bytes.
    pub fn read_struct<T: FromBytes>(&self) -> Result<T, ProtocolError> {
        T::read_from(self.0.as_ref()).ok_or(ProtocolError::PayloadSizeMismatch {
            expected: std::mem::size_of::<T>(),
            got: self.0.len(),
            struct_name: std::any::type_name::<T>(),
        })
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for Payload {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<Vec<u8>> for Payload {
    type Error = ProtocolError;

    fn try_from(data: Vec<u8>) -> Result<Self, Self::Error> {
        Self::new(data)
    }
}

impl TryFrom<&[u8]> for Payload {
    type Error = ProtocolError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        Self::copy_from_slice(data)
    }
}
