//! Swarmmesh — a single-process distributed agent orchestration runtime.
//!
//! Five coupled subsystems (Agent Registry, Task Scheduler, Neural Mesh,
//! Consensus Manager, Lifecycle Orchestrator) communicate exclusively
//! through a shared event bus; Resource/Health and Config/Logging round out
//! the ambient stack. The library is the real surface — `src/main.rs` is a
//! thin `clap` demonstration shell over it.

pub mod domain;
pub mod infrastructure;
pub mod runtime;

pub use domain::error::{ErrorCode, OrchestratorError};
pub use domain::models::config::Config;
pub use infrastructure::config::ConfigLoader;
pub use infrastructure::events::{Envelope, EventBus, OrchestrationEvent};
pub use runtime::Orchestrator;
