//! # Message Type Space
//!
//! ## Purpose
//!
//! Splits the 32-bit message type carried in every header into the reserved
//! control vocabulary and the open application range, so dispatch happens by
//! pattern matching instead of integer comparison chains.
//!
//! ```text
//! 0 ..= 99          reserved: ControlVerb, or Unassigned if not (yet) defined
//! 100 ..= 0x7FFFFFFE  application-defined
//! 0x7FFFFFFF        AllTypes (wildcard subscription only)
//! < 0               Unassigned
//! ```

use crate::constants::{ALL_MESSAGE_TYPES, MAX_RTMA_MSG_TYPE};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// Reserved control verbs understood by both client and broker
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum ControlVerb {
    Exit = 0,
    Kill = 1,
    Acknowledge = 2,
    FailSubscribe = 6,
    FailedMessage = 8,
    Connect = 13,
    Disconnect = 14,
    Subscribe = 15,
    Unsubscribe = 16,
    ShutdownRtma = 17,
    ShutdownApp = 18,
    ModuleReady = 26,
    SmExit = 48,
    LmExit = 55,
    SaveMessageLog = 56,
    MessageLogSaved = 57,
    PauseMessageLogging = 58,
    ResumeMessageLogging = 59,
    ResetMessageLog = 60,
    DumpMessageLog = 61,
    ForceDisconnect = 82,
    MmError = 83,
    MmInfo = 84,
    PauseSubscription = 85,
    ResumeSubscription = 86,
    MmReady = 94,
    LmReady = 96,
}

impl ControlVerb {
    /// Wire name, as used in logs and message dumps
    pub fn name(self) -> &'static str {
        match self {
            ControlVerb::Exit => "EXIT",
            ControlVerb::Kill => "KILL",
            ControlVerb::Acknowledge => "ACKNOWLEDGE",
            ControlVerb::FailSubscribe => "FAIL_SUBSCRIBE",
            ControlVerb::FailedMessage => "FAILED_MESSAGE",
            ControlVerb::Connect => "CONNECT",
            ControlVerb::Disconnect => "DISCONNECT",
            ControlVerb::Subscribe => "SUBSCRIBE",
            ControlVerb::Unsubscribe => "UNSUBSCRIBE",
            ControlVerb::ShutdownRtma => "SHUTDOWN_RTMA",
            ControlVerb::ShutdownApp => "SHUTDOWN_APP",
            ControlVerb::ModuleReady => "MODULE_READY",
            ControlVerb::SmExit => "SM_EXIT",
            ControlVerb::LmExit => "LM_EXIT",
            ControlVerb::SaveMessageLog => "SAVE_MESSAGE_LOG",
            ControlVerb::MessageLogSaved => "MESSAGE_LOG_SAVED",
            ControlVerb::PauseMessageLogging => "PAUSE_MESSAGE_LOGGING",
            ControlVerb::ResumeMessageLogging => "RESUME_MESSAGE_LOGGING",
            ControlVerb::ResetMessageLog => "RESET_MESSAGE_LOG",
            ControlVerb::DumpMessageLog => "DUMP_MESSAGE_LOG",
            ControlVerb::ForceDisconnect => "FORCE_DISCONNECT",
            ControlVerb::MmError => "MM_ERROR",
            ControlVerb::MmInfo => "MM_INFO",
            ControlVerb::PauseSubscription => "PAUSE_SUBSCRIPTION",
            ControlVerb::ResumeSubscription => "RESUME_SUBSCRIPTION",
            ControlVerb::MmReady => "MM_READY",
            ControlVerb::LmReady => "LM_READY",
        }
    }

    /// Verbs the broker confirms with an ACKNOWLEDGE
    pub fn expects_ack(self) -> bool {
        matches!(
            self,
            ControlVerb::Connect
                | ControlVerb::Subscribe
                | ControlVerb::Unsubscribe
                | ControlVerb::PauseSubscription
                | ControlVerb::ResumeSubscription
        )
    }
}

/// Any message type that can appear in a header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Reserved protocol verb
    Control(ControlVerb),
    /// Application-defined type above the reserved range
    Application(i32),
    /// Wildcard, valid only as a subscription target
    AllTypes,
    /// Inside the reserved range but not a known verb, or negative
    Unassigned(i32),
}

impl MessageType {
    pub fn raw(self) -> i32 {
        match self {
            MessageType::Control(verb) => verb.into(),
            MessageType::Application(value) | MessageType::Unassigned(value) => value,
            MessageType::AllTypes => ALL_MESSAGE_TYPES,
        }
    }

    pub fn is_control(self) -> bool {
        matches!(self, MessageType::Control(_))
    }

    pub fn is(self, verb: ControlVerb) -> bool {
        self == MessageType::Control(verb)
    }
}

impl From<i32> for MessageType {
    fn from(value: i32) -> Self {
        if value == ALL_MESSAGE_TYPES {
            return MessageType::AllTypes;
        }
        if let Ok(verb) = ControlVerb::try_from(value) {
            return MessageType::Control(verb);
        }
        if value > MAX_RTMA_MSG_TYPE {
            MessageType::Application(value)
        } else {
            MessageType::Unassigned(value)
        }
    }
}

impl From<ControlVerb> for MessageType {
    fn from(verb: ControlVerb) -> Self {
        MessageType::Control(verb)
    }
}

impl From<MessageType> for i32 {
    fn from(msg_type: MessageType) -> Self {
        msg_type.raw()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Control(verb) => write!(f, "{}", verb.name()),
            MessageType::Application(value) => write!(f, "{}", value),
            MessageType::AllTypes => write!(f, "ALL_MESSAGE_TYPES"),
            MessageType::Unassigned(value) => write!(f, "UNASSIGNED({})", value),
        }
    }
}
