use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::PeerAddress;
use crate::utils::{P2PError, Result};

pub const DEFAULT_PORT: u16 = 51162;

/// Ports are valid strictly between the privileged range and the last port.
pub fn is_valid_port(port: u16) -> bool {
    port > 1024 && port < 65535
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Host every node contacts once at startup to exchange registries.
    pub seed_host: String,
    /// The single port used network-wide, for listening and for outbound calls.
    pub port: u16,
    pub shared_dir: PathBuf,
    pub registry_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed_host: "localhost".to_string(),
            port: DEFAULT_PORT,
            shared_dir: PathBuf::from("./share"),
            registry_path: PathBuf::from("./share/PeerRegister.txt"),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !is_valid_port(self.port) {
            return Err(P2PError::ConfigError(format!(
                "Invalid port {}; out of valid range",
                self.port
            )));
        }
        if self.seed_host.trim().is_empty() {
            return Err(P2PError::ConfigError("Invalid seed host".to_string()));
        }
        if is_blank(&self.shared_dir) {
            return Err(P2PError::ConfigError("Invalid shared directory".to_string()));
        }
        if is_blank(&self.registry_path) {
            return Err(P2PError::ConfigError("Invalid registry path".to_string()));
        }
        Ok(())
    }

    pub fn seed(&self) -> PeerAddress {
        PeerAddress::new(self.seed_host.trim())
    }
}

fn is_blank(path: &std::path::Path) -> bool {
    path.to_string_lossy().trim().is_empty()
}
