//! RTMA Client Configuration
//!
//! ## Purpose
//!
//! Everything a session needs before it connects: broker address, requested
//! identity, CONNECT flags and the two timeouts. Values come from three
//! layers, later layers winning:
//!
//! ```text
//! ClientConfig::default()  ->  TOML file (optional)  ->  RTMA_* environment
//! ```
//!
//! Environment keys are the field names upper-cased behind the prefix, e.g.
//! `RTMA_SERVER=10.0.0.5:7111` or `RTMA_ACK_TIMEOUT_SECS=0.5`.

use config::{Config, Environment, File};
use rtma_codec::{host_ids, HostId, ModuleId, MAX_HOSTS, MAX_MODULES};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "RTMA";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path:?}: {source}")]
    Load {
        path: Option<PathBuf>,
        #[source]
        source: config::ConfigError,
    },

    #[error("Invalid configuration value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Settings for one client session
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Numeric broker address, `host:port`
    pub server: String,
    /// Requested module id; 0 asks the broker to assign one
    pub module_id: ModuleId,
    pub host_id: HostId,
    /// Bound on each acknowledgement wait, seconds
    pub ack_timeout_secs: f64,
    /// Write readiness bound for sends, seconds; negative blocks
    pub send_timeout_secs: f64,
    pub logger_status: bool,
    pub daemon_status: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:7111".to_string(),
            module_id: 0,
            host_id: host_ids::LOCAL_HOST,
            ack_timeout_secs: 3.0,
            send_timeout_secs: -1.0,
            logger_status: false,
            daemon_status: false,
        }
    }
}

impl ClientConfig {
    /// Load defaults, then `path` if given, then `RTMA_*` overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// As [`ClientConfig::load`] with a custom environment prefix
    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let load_err = |source| ConfigError::Load {
            path: path.map(Path::to_path_buf),
            source,
        };

        let mut builder = Config::builder();
        if let Some(path) = path {
            info!("Loading client config: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .try_parsing(true),
        );

        let config: ClientConfig = builder
            .build()
            .map_err(load_err)?
            .try_deserialize()
            .map_err(load_err)?;

        config.validate()?;
        debug!(?config, "Client configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.server_addr()?;

        if !(0..=MAX_MODULES).contains(&self.module_id) {
            return Err(ConfigError::invalid(
                "module_id",
                format!("{} outside 0..={}", self.module_id, MAX_MODULES),
            ));
        }
        if !(0..=MAX_HOSTS).contains(&self.host_id) && self.host_id != host_ids::ALL_HOSTS {
            return Err(ConfigError::invalid(
                "host_id",
                format!("{} outside 0..={}", self.host_id, MAX_HOSTS),
            ));
        }
        if !self.ack_timeout_secs.is_finite() || self.ack_timeout_secs < 0.0 {
            return Err(ConfigError::invalid(
                "ack_timeout_secs",
                format!("{} is not a finite, non-negative duration", self.ack_timeout_secs),
            ));
        }
        if self.send_timeout_secs.is_nan() {
            return Err(ConfigError::invalid("send_timeout_secs", "NaN"));
        }
        Ok(())
    }

    /// Broker address; names are not resolved
    pub fn server_addr(&self) -> Result<SocketAddr> {
        self.server
            .parse()
            .map_err(|e| ConfigError::invalid("server", format!("{:?}: {}", self.server, e)))
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.ack_timeout_secs).unwrap_or(Duration::from_secs(3))
    }
}
