//! Message definitions for the control verbs that carry a payload
//!
//! Each struct is the exact wire layout of a control message payload.

use crate::constants::{ModuleId, MAX_LOGGER_FILENAME_LENGTH};
use crate::header::MessageHeader;
use crate::message_type::ControlVerb;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// Wire layout of a control payload, tied to the verb that carries it
pub trait MessageDefinition: AsBytes + FromBytes + Copy {
    const VERB: ControlVerb;
}

/// CONNECT payload (4 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
pub struct ConnectData {
    pub logger_status: i16,
    pub daemon_status: i16,
}

impl MessageDefinition for ConnectData {
    const VERB: ControlVerb = ControlVerb::Connect;
}

/// FAIL_SUBSCRIBE payload (8 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
pub struct FailSubscribe {
    pub mod_id: ModuleId,
    pub reserved: i16,
    pub msg_type: i32,
}

impl MessageDefinition for FailSubscribe {
    const VERB: ControlVerb = ControlVerb::FailSubscribe;
}

/// FAILED_MESSAGE payload (64 bytes), echoes the header that could not be delivered
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, AsBytes, FromBytes, FromZeroes)]
pub struct FailedMessage {
    pub dest_mod_id: ModuleId,
    pub reserved: [i16; 3],
    pub time_of_failure: f64,
    pub msg_header: MessageHeader,
}

impl MessageDefinition for FailedMessage {
    const VERB: ControlVerb = ControlVerb::FailedMessage;
}

/// FORCE_DISCONNECT payload
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
pub struct ForceDisconnect {
    pub mod_id: i32,
}

impl MessageDefinition for ForceDisconnect {
    const VERB: ControlVerb = ControlVerb::ForceDisconnect;
}

/// MODULE_READY payload
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
pub struct ModuleReady {
    pub pid: i32,
}

impl MessageDefinition for ModuleReady {
    const VERB: ControlVerb = ControlVerb::ModuleReady;
}

/// SAVE_MESSAGE_LOG payload (260 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
pub struct SaveMessageLog {
    pub pathname: [u8; MAX_LOGGER_FILENAME_LENGTH],
    pub pathname_length: i32,
}

impl SaveMessageLog {
    /// Request for the logger to save to `path`, truncated to the field capacity
    pub fn new(path: &str) -> Self {
        let mut msg = Self::new_zeroed();
        let len = path.len().min(MAX_LOGGER_FILENAME_LENGTH - 1);
        msg.pathname[..len].copy_from_slice(&path.as_bytes()[..len]);
        msg.pathname_length = len as i32;
        msg
    }

    pub fn path(&self) -> String {
        let len = usize::try_from(self.pathname_length)
            .unwrap_or(0)
            .min(MAX_LOGGER_FILENAME_LENGTH);
        String::from_utf8_lossy(&self.pathname[..len]).into_owned()
    }
}

impl MessageDefinition for SaveMessageLog {
    const VERB: ControlVerb = ControlVerb::SaveMessageLog;
}

/// Payload of SUBSCRIBE / UNSUBSCRIBE / PAUSE_SUBSCRIPTION / RESUME_SUBSCRIPTION
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
pub struct SubscriptionControl {
    pub msg_type: i32,
}
