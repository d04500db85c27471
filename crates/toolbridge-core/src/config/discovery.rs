//! Route discovery configuration.

use serde::{Deserialize, Serialize};

/// Controls which host routes become tools and how credentials are advertised.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Whether routes are converted to tools at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Route name / URL patterns to include. Empty means everything.
    ///
    /// Supports exact matches, `*`, and trailing wildcards such as `api/*`.
    #[serde(default)]
    pub include: Vec<String>,

    /// Route name / URL patterns to exclude. Applied after `include`.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Publish credential parameters (`auth_token`, `username`, `password`)
    /// in tool input schemas. When false, callers are expected to send
    /// credentials as headers on the inbound request instead.
    #[serde(default = "default_expose_auth")]
    pub expose_auth_as_params: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            include: Vec::new(),
            exclude: Vec::new(),
            expose_auth_as_params: default_expose_auth(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_expose_auth() -> bool {
    true
}
