//! # toolbridge-core
//!
//! Shared types for the tool bridge: configuration, the host route catalog
//! that discovery reads from, and the structured validation schemas host
//! handlers declare.

// Configuration types shared across all toolbridge crates
pub mod config;

// Host-facing route and payload declarations
pub mod routes;
pub mod validation;

pub use config::{BridgeConfig, ConfigError, DiscoveryConfig, McpConfig, Transport};
pub use routes::{
    CommittedRoutes, HandlerParam, RouteCatalog, RouteDescriptor, RouteMethod, SecurityScheme,
};
pub use validation::{FieldKind, FieldSchema, ValidationSchema};
