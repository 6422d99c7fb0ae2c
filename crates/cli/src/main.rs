//! `flowcanvas` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate` — build the canvas graph for a workflow JSON file.
//! - `list`     — list the workflows stored by the service.
//! - `create`   — create an empty workflow.
//! - `run`      — execute a workflow and follow its progress.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client::{ClientConfig, ExecutionService, HttpExecutionService, WorkflowDefinition};
use engine::{
    build_graph, CanvasSession, LayeredLayout, PollerConfig, SessionConfig, SessionEvent,
};
use serde_json::Value;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "flowcanvas",
    about = "Visual workflow canvas and execution tracker",
    version
)]
struct Cli {
    /// Base URL of the workflow service API.
    #[arg(
        long,
        global = true,
        env = "FLOWCANVAS_API_URL",
        default_value = "http://localhost:5000/api"
    )]
    base_url: String,

    /// Bearer token sent with every request.
    #[arg(long, global = true, env = "FLOWCANVAS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the canvas graph for a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
        /// Fail if the definition has any diagnostics.
        #[arg(long)]
        strict: bool,
        /// Write the laid-out definition to this file.
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// List stored workflows.
    List,
    /// Create an empty workflow.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Execute a workflow and follow it until it finishes.
    Run {
        workflow_id: String,
        /// JSON passed as the execution's `input_data`.
        #[arg(long, default_value = "{}")]
        input: String,
        #[arg(long, default_value_t = 1000)]
        poll_interval_ms: u64,
        #[arg(long, default_value_t = 3000)]
        cooldown_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path, strict, export } => validate(&path, strict, export.as_deref()),
        Command::List => {
            let service = connect(cli.base_url, cli.token)?;
            for workflow in service.list_workflows().await? {
                println!("{}\t{}\t{} steps", workflow.id, workflow.name, workflow.steps.len());
            }
            Ok(())
        }
        Command::Create { name, description } => {
            let service = connect(cli.base_url, cli.token)?;
            let created = service.create_workflow(&name, &description).await?;
            println!("Created workflow {} ({})", created.id, created.name);
            Ok(())
        }
        Command::Run { workflow_id, input, poll_interval_ms, cooldown_ms } => {
            let input: Value = serde_json::from_str(&input).context("--input is not valid JSON")?;
            let config = SessionConfig {
                poller: PollerConfig {
                    poll_interval: Duration::from_millis(poll_interval_ms),
                    cooldown: Duration::from_millis(cooldown_ms),
                    ..PollerConfig::default()
                },
                ..SessionConfig::default()
            };
            let service = connect(cli.base_url, cli.token)?;
            run(service, &workflow_id, input, config, tokio::signal::ctrl_c()).await
        }
    }
}

fn connect(base_url: String, token: Option<String>) -> Result<Arc<dyn ExecutionService>> {
    let config = ClientConfig { base_url, token, ..ClientConfig::default() };
    Ok(Arc::new(HttpExecutionService::new(config)?))
}

fn validate(path: &std::path::Path, strict: bool, export: Option<&std::path::Path>) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    let workflow: WorkflowDefinition =
        serde_json::from_str(&content).context("invalid workflow JSON")?;

    let build = build_graph(&workflow, &LayeredLayout::default());
    for diagnostic in &build.diagnostics {
        eprintln!("warning: {diagnostic}");
    }
    if strict && !build.diagnostics.is_empty() {
        bail!("{} problem(s) found in {}", build.diagnostics.len(), path.display());
    }

    let graph = build.graph;
    println!(
        "✅ {}: {} nodes, {} connections",
        graph.name(),
        graph.nodes().len(),
        graph.connections().len()
    );
    for node in graph.nodes() {
        println!(
            "  [{:>9}] {} ({:.0}, {:.0})",
            node.style().label,
            node.name,
            node.position.x,
            node.position.y
        );
    }

    if let Some(out) = export {
        let json = serde_json::to_string_pretty(&graph.to_definition())?;
        std::fs::write(out, json).with_context(|| format!("cannot write {}", out.display()))?;
        info!("exported laid-out definition to {}", out.display());
    }
    Ok(())
}

enum Step {
    Event(Option<SessionEvent>),
    Interrupted,
}

/// Execute `workflow_id` and print progress until it finishes or
/// `interrupt` resolves.  An interrupted run is an error.
async fn run<F: Future>(
    service: Arc<dyn ExecutionService>,
    workflow_id: &str,
    input: Value,
    config: SessionConfig,
    interrupt: F,
) -> Result<()> {
    let mut session = CanvasSession::load(service, workflow_id, config).await?;
    for diagnostic in session.diagnostics() {
        warn!("{diagnostic}");
    }
    session.start(input);

    tokio::pin!(interrupt);

    loop {
        let step = tokio::select! {
            event = session.next_event() => Step::Event(event),
            _ = &mut interrupt => Step::Interrupted,
        };

        match step {
            Step::Interrupted => {
                session.cancel();
                session.close();
                bail!("execution cancelled");
            }
            Step::Event(None) => break,
            Step::Event(Some(event)) => {
                debug!(?event, "session event");
                match event {
                    SessionEvent::ExecutionStarted { execution_id, .. } => {
                        println!("Started execution {execution_id}");
                    }
                    SessionEvent::SnapshotApplied { executed, total, .. } => {
                        println!("Progress: {executed}/{total} steps");
                    }
                    SessionEvent::Completed { .. } => {
                        println!("✅ Execution completed");
                        break;
                    }
                    SessionEvent::Failed { reason, .. } => {
                        session.close();
                        bail!("❌ {reason}");
                    }
                    _ => {}
                }
            }
        }
    }

    session.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use client::mock::MockExecutionService;
    use client::{ExecutionSnapshot, ExecutionStatus};
    use serde_json::json;

    fn demo_service() -> Arc<MockExecutionService> {
        let workflow: WorkflowDefinition =
            serde_json::from_value(json!({ "id": "wf-1", "name": "Demo", "steps": {} })).unwrap();
        let running = ExecutionSnapshot {
            execution_id: "exec-1".into(),
            status: ExecutionStatus::Running,
            current_step: None,
            steps_executed: Vec::new(),
            error_message: None,
        };
        Arc::new(
            MockExecutionService::accepting("exec-1")
                .with_workflows([workflow])
                .with_snapshots([running]),
        )
    }

    #[tokio::test]
    async fn interrupted_run_is_an_error() {
        let service: Arc<dyn ExecutionService> = demo_service();
        let err = run(service, "wf-1", json!({}), SessionConfig::default(), async {})
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "execution cancelled");
    }

    #[tokio::test]
    async fn unknown_workflow_is_an_error() {
        let service: Arc<dyn ExecutionService> = demo_service();
        let err = run(service, "missing", json!({}), SessionConfig::default(), async {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing"), "{err}");
    }
}
