//! # Protocol Constants
//!
//! ## Purpose
//!
//! Central registry of the values both ends of the RTMA protocol agree on:
//! payload capacity, the reserved message-type range, well-known module ids
//! and the host id sentinels. These must stay stable for wire compatibility
//! with existing Message Manager deployments.
//!
//! ## Architecture Role
//!
//! ```text
//! Client Session → [Protocol Constants] → Header Fields
//!       ↑                  ↓                   ↓
//!  Identity Setup    Capacity Checks     Module/Host Ids
//! ```

/// Module identifier as carried in the header
pub type ModuleId = i16;

/// Host identifier as carried in the header
pub type HostId = i16;

/// Maximum payload carried by a single message
pub const MAX_DATA_BYTES: usize = 4096;

/// Maximum length of the pathname in a SAVE_MESSAGE_LOG request
pub const MAX_LOGGER_FILENAME_LENGTH: usize = 256;

/// Highest message type reserved for the protocol itself
pub const MAX_RTMA_MSG_TYPE: i32 = 99;

/// Highest module id reserved for core modules
pub const MAX_RTMA_MODULE_ID: ModuleId = 9;

/// Wildcard used only to subscribe to every message type
pub const ALL_MESSAGE_TYPES: i32 = 0x7FFF_FFFF;

pub const MAX_MODULES: ModuleId = 200;
pub const DYN_MOD_ID_START: ModuleId = 100;
pub const MAX_HOSTS: HostId = 5;
pub const MAX_MESSAGE_TYPES: i32 = 10_000;

/// Module ids of the core modules
pub mod module_ids {
    use super::ModuleId;

    /// Also the "assign me one" request value when used as own identity
    pub const MESSAGE_MANAGER: ModuleId = 0;
    pub const COMMAND_MODULE: ModuleId = 1;
    pub const APPLICATION_MODULE: ModuleId = 2;
    pub const NETWORK_RELAY: ModuleId = 3;
    pub const STATUS_MODULE: ModuleId = 4;
    pub const QUICKLOGGER: ModuleId = 5;

    /// Destination module meaning "fan out by subscription"
    pub const BROADCAST: ModuleId = 0;
    /// Own identity requesting a broker-assigned module id
    pub const DYNAMIC: ModuleId = 0;
}

/// Host id sentinels
pub mod host_ids {
    use super::HostId;

    pub const LOCAL_HOST: HostId = 0;
    pub const ALL_HOSTS: HostId = 0x7FFF;
}
