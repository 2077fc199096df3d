//! Infrastructure layer: ambient concerns shared by every subsystem —
//! configuration, logging, the event bus, the optional key-value store,
//! and the bridge transport boundary.

pub mod bridge;
pub mod config;
pub mod events;
pub mod kv_store;
pub mod logging;
