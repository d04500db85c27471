//! Configuration types for the tool bridge.
//!
//! Configuration is loaded from a single YAML file (conventionally
//! `toolbridge.yaml`) and threaded, immutable, into discovery, security
//! translation and the request bridge when they are constructed.
//!
//! ```yaml
//! mcp:
//!   transport: http
//!   port: 8080
//!   mount_path: /mcp
//! discovery:
//!   include: ["api/*"]
//!   exclude: ["api/internal/*"]
//!   expose_auth_as_params: true
//! ```

pub mod discovery;
pub mod mcp;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use discovery::DiscoveryConfig;
pub use mcp::{McpConfig, Transport};

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BridgeConfig {
    /// MCP endpoint settings.
    #[serde(default)]
    pub mcp: McpConfig,

    /// Route discovery settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Invalid(String),
}

impl BridgeConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content and validate it.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.mcp.mount_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "mcp.mount_path must start with '/', got '{}'",
                self.mcp.mount_path
            )));
        }

        let patterns = self
            .discovery
            .include
            .iter()
            .chain(self.discovery.exclude.iter());
        for pattern in patterns {
            if pattern.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "discovery patterns must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
