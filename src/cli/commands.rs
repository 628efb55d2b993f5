// ABOUTME: Command implementations for the waypoint CLI
// ABOUTME: Wires parsing, the plugin manager, and the interpreter together

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ConfigService;
use crate::engine::instance::WorkflowStatus;
use crate::engine::interpreter::Interpreter;
use crate::parser::WorkflowParser;
use crate::plugin::builtin::default_manager;

use super::Args;

pub async fn run_workflow(
    workflow_path: PathBuf,
    vars: Vec<String>,
    input: Option<String>,
    dry_run: bool,
    config: Arc<ConfigService>,
) -> Result<()> {
    let parser = WorkflowParser::new();
    let mut definition = parser
        .parse_file(&workflow_path)
        .await
        .with_context(|| format!("Failed to load workflow from {:?}", workflow_path))?;

    for (key, value) in Args::parse_variables(&vars)? {
        definition
            .variables
            .insert(key, Value::String(value));
    }

    if dry_run {
        info!("Workflow '{}' is valid (dry run, not executing)", definition.name);
        return Ok(());
    }

    let input = match input {
        Some(raw) => serde_json::from_str(&raw).context("Failed to parse --input as JSON")?,
        None => Value::Null,
    };

    let manager = default_manager(config);
    manager
        .load()
        .await
        .map_err(|e| anyhow!("Plugin startup failed: {}", e))?;

    // Ctrl-C requests a graceful stop through the cancellation token.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling workflow");
            signal_cancel.cancel();
        }
    });

    let interpreter = Interpreter::new(Arc::clone(&manager));
    let result = interpreter.run(definition, input, cancel).await;
    manager.unload().await;

    let workflow = result.map_err(|e| anyhow!("Workflow execution failed: {}", e))?;
    println!("{}", serde_yaml::to_string(&workflow)?);

    match workflow.status {
        WorkflowStatus::Completed => Ok(()),
        WorkflowStatus::Cancelled => Err(anyhow!("Workflow '{}' was cancelled", workflow.name)),
        status => Err(anyhow!(
            "Workflow '{}' finished with status {}: {}",
            workflow.name,
            status,
            workflow.error_message.unwrap_or_default()
        )),
    }
}

pub async fn validate_workflow(workflow_path: PathBuf) -> Result<()> {
    let parser = WorkflowParser::new();
    let definition = parser
        .parse_file(&workflow_path)
        .await
        .with_context(|| format!("Failed to load workflow from {:?}", workflow_path))?;

    debug!("Parsed workflow '{}' v{}", definition.name, definition.version);
    info!("Workflow '{}' is valid", definition.name);
    println!("{}: OK", workflow_path.display());
    Ok(())
}
