//! `flowctl` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate` — check a flow JSON file against the publish rules.
//! - `run`      — execute a flow JSON file in sandbox mode and print the result.
//!
//! No collaborators are wired here, so AI blocks answer with their sandbox
//! or fallback replies.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine::{ExecuteOptions, ExecutorConfig, FlowExecutor, FlowGraph, HandlerRegistry};
use nodes::Collaborators;

/// Shown when a test run produced no message at all.
const EMPTY_RESPONSE: &str = "Aucune réponse générée par le flow.";

#[derive(Parser)]
#[command(
    name = "flowctl",
    about = "Validate and dry-run conversational flows",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a flow definition JSON file.
    Validate {
        /// Path to the flow JSON file.
        path: PathBuf,
    },
    /// Run a flow definition against one message.
    Run {
        /// Path to the flow JSON file.
        path: PathBuf,
        /// Inbound user message.
        #[arg(short, long)]
        message: String,
        /// Include the per-step execution trace in the output.
        #[arg(long)]
        trace: bool,
        /// Step budget for the run.
        #[arg(long, env = "FLOW_MAX_STEPS", default_value_t = 50)]
        max_steps: usize,
        #[arg(long)]
        agent_id: Option<String>,
        #[arg(long)]
        conversation_id: Option<String>,
    },
}

fn load_flow(path: &Path) -> Result<FlowGraph> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("invalid flow JSON in {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("flowctl=info,engine=info,nodes=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path } => {
            let flow = load_flow(&path)?;
            match engine::validate_flow(&flow) {
                Ok(()) => {
                    println!(
                        "✅ Flow is valid: {} nodes, {} edges",
                        flow.nodes.len(),
                        flow.edges.len()
                    );
                }
                Err(e) => {
                    eprintln!("❌ Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Run {
            path,
            message,
            trace,
            max_steps,
            agent_id,
            conversation_id,
        } => {
            let flow = load_flow(&path)?;
            let executor = FlowExecutor::new(
                HandlerRegistry::with_defaults(&Collaborators::none()),
                ExecutorConfig {
                    max_steps,
                    ..ExecutorConfig::default()
                },
            );

            let options = ExecuteOptions {
                sandbox: true,
                trace_execution: trace,
                agent_id,
                conversation_id,
                ..ExecuteOptions::default()
            };

            info!(
                "running {} with {} registered blocks",
                path.display(),
                executor.registry().len()
            );
            let result = executor.execute(&flow, &message, options).await?;

            let report = serde_json::json!({
                "response": result.response_or(EMPTY_RESPONSE),
                "sources": result.sources,
                "variables": result.variables,
                "stepsExecuted": result.steps_executed,
                "truncated": result.truncated,
                "executionTrace": result.trace,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
