//! Swarmmesh CLI entry point

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use swarmmesh::infrastructure::config::ConfigLoader;
use swarmmesh::infrastructure::logging::{LogConfig, LogFormat, LoggerImpl};
use swarmmesh::runtime::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load().context("failed to load configuration")?;

    let log_format = match config.system.log_format.as_str() {
        "pretty" => LogFormat::Pretty,
        _ => LogFormat::Json,
    };
    let _logger = LoggerImpl::init(&LogConfig {
        level: config.system.log_level.clone(),
        format: log_format,
        ..LogConfig::default()
    })
    .context("failed to initialize logger")?;

    match cli.command {
        Commands::Run => {
            let orchestrator = Orchestrator::build(config);
            orchestrator.initialize().await.context("failed to initialize orchestrator")?;
            let signal_handle = orchestrator.install_signal_handlers();
            let supervisor_handle = orchestrator.supervise_tickers();

            tokio::select! {
                result = signal_handle => {
                    result.context("signal handler task panicked")?;
                }
                result = supervisor_handle => {
                    if result.context("ticker supervisor task panicked")? {
                        std::process::exit(1);
                    }
                }
            }
        }
        Commands::RegisterAgent { name, kind } => {
            let orchestrator = Orchestrator::build(config);
            orchestrator.initialize().await.context("failed to initialize orchestrator")?;

            let identity = swarmmesh::domain::models::agent::AgentIdentity::new(name.clone(), kind.into(), "1.0.0");
            let record = swarmmesh::domain::models::agent::AgentRecord::new(identity.clone(), vec![]);
            orchestrator.register_agent(record).await;

            if cli.json {
                println!("{}", serde_json::json!({"id": identity.id}));
            } else {
                println!("registered agent {} ({})", identity.id, name);
            }
            orchestrator.shutdown().await;
        }
        Commands::Health => {
            let orchestrator = Orchestrator::build(config);
            orchestrator.initialize().await.context("failed to initialize orchestrator")?;
            let results = orchestrator.health().run_checks().await;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for result in &results {
                    println!("{}: {:?} — {}", result.name, result.status, result.message);
                }
            }
            orchestrator.shutdown().await;
        }
    }

    Ok(())
}
