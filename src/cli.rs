//! Demonstration CLI surface. Not the focus of this crate — a thin
//! `clap`-derived shell exercising the programmatic contracts
//! (`register`, `submit_task`, `propose`, `vote`, `subscribe`) the way the
//! teacher's `main.rs` exercises its own service layer through `clap`.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "swarmmesh", about = "Distributed agent orchestration runtime")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Emit output as JSON instead of plain text.
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the orchestrator and block until SIGINT/SIGTERM.
    Run,
    /// Register a demonstration agent and print its id.
    RegisterAgent {
        #[arg(long, default_value = "demo-agent")]
        name: String,
        #[arg(long, value_enum, default_value = "code-worker")]
        kind: AgentKindArg,
    },
    /// Print the health monitor's overall status once and exit.
    Health,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum AgentKindArg {
    CodeWorker,
    DataWorker,
    ValidationWorker,
    SwarmCoordinator,
    ConsensusCoordinator,
    TopologyCoordinator,
    McpBridge,
    A2aBridge,
}

impl From<AgentKindArg> for swarmmesh::domain::models::agent::AgentKind {
    fn from(value: AgentKindArg) -> Self {
        use swarmmesh::domain::models::agent::AgentKind;
        match value {
            AgentKindArg::CodeWorker => AgentKind::CodeWorker,
            AgentKindArg::DataWorker => AgentKind::DataWorker,
            AgentKindArg::ValidationWorker => AgentKind::ValidationWorker,
            AgentKindArg::SwarmCoordinator => AgentKind::SwarmCoordinator,
            AgentKindArg::ConsensusCoordinator => AgentKind::ConsensusCoordinator,
            AgentKindArg::TopologyCoordinator => AgentKind::TopologyCoordinator,
            AgentKindArg::McpBridge => AgentKind::McpBridge,
            AgentKindArg::A2aBridge => AgentKind::A2aBridge,
        }
    }
}
