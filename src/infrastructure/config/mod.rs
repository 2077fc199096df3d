//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - JSON file loading
//! - Environment variable overrides
//! - Configuration validation
//! - Type-safe config structs

pub mod loader;

pub use loader::{ConfigLoader, DEFAULT_CONFIG_PATH};
