use std::path::{Path, PathBuf};
use std::time::Duration;

use fleetgate_frame::{DEFAULT_MAX_FRAME_LEN, MIN_FRAME_SIZE};
use fleetgate_protocol::DEFAULT_AUTH_TOKEN;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Default device listen address.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:7053";
/// Default read idle timeout before a silent device is dropped.
pub const DEFAULT_READ_IDLE_TIMEOUT_SECS: u64 = 300;
/// Default bound on one device write.
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 10;
/// Control socket file name, placed in the system temp dir by default.
pub const DEFAULT_CONTROL_SOCKET_NAME: &str = "fleetgate.sock";

/// Default control socket path.
pub fn default_control_socket() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_CONTROL_SOCKET_NAME)
}

/// Gateway runtime configuration.
///
/// Loaded from an optional JSON file; every field has a default, and the CLI
/// layers environment variables and flags on top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Device listen address.
    pub listen: String,
    /// Control-plane socket path.
    pub control_socket: PathBuf,
    /// Seconds without a frame before a connection is closed.
    pub read_idle_timeout_secs: u64,
    /// Seconds allowed for one device write.
    pub write_timeout_secs: u64,
    /// Largest escaped frame accepted from a device.
    pub max_frame_len: usize,
    /// Token returned in registration acks.
    pub auth_token: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            control_socket: default_control_socket(),
            read_idle_timeout_secs: DEFAULT_READ_IDLE_TIMEOUT_SECS,
            write_timeout_secs: DEFAULT_WRITE_TIMEOUT_SECS,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            auth_token: DEFAULT_AUTH_TOKEN.to_string(),
        }
    }
}

impl GatewayConfig {
    /// Load a JSON config file; absent fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| GatewayError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| GatewayError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the gateway cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.listen.trim().is_empty() {
            return Err(GatewayError::InvalidConfig {
                field: "listen",
                message: "must not be empty".to_string(),
            });
        }
        if self.read_idle_timeout_secs == 0 {
            return Err(GatewayError::InvalidConfig {
                field: "read_idle_timeout_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.write_timeout_secs == 0 {
            return Err(GatewayError::InvalidConfig {
                field: "write_timeout_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.max_frame_len < MIN_FRAME_SIZE {
            return Err(GatewayError::InvalidConfig {
                field: "max_frame_len",
                message: format!("must be at least {MIN_FRAME_SIZE}"),
            });
        }
        if !self.auth_token.is_ascii() {
            return Err(GatewayError::InvalidConfig {
                field: "auth_token",
                message: "must be ASCII".to_string(),
            });
        }
        Ok(())
    }

    pub fn read_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.read_idle_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}
