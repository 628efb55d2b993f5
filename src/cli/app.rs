// ABOUTME: Main application orchestration for the waypoint CLI
// ABOUTME: Coordinates argument parsing, configuration, logging, and commands

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use super::{commands, Args, Commands};
use crate::config::ConfigService;

pub struct App {
    config: Arc<ConfigService>,
}

impl App {
    pub fn new(config: Arc<ConfigService>) -> Self {
        Self { config }
    }

    /// Create an application from parsed arguments, loading the optional
    /// configuration file into the config service.
    pub fn from_args(args: &Args) -> Result<Self> {
        let config = Arc::new(ConfigService::new());
        if let Some(path) = &args.config {
            load_config_file(&config, path)?;
        }
        Ok(Self::new(config))
    }

    /// Initialize logging. Verbosity from the flag, overridable by the
    /// standard env filter variable.
    pub fn init_logging(&self, verbose: bool, no_color: bool) {
        let level = if verbose { "debug" } else { "info" };
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(!no_color)
            .with_target(false)
            .init();

        debug!("Logging initialized with level: {}", level);
    }

    pub async fn run(&self, args: Args) -> Result<()> {
        match args.command {
            Commands::Run {
                workflow,
                vars,
                input,
                dry_run,
            } => {
                commands::run_workflow(workflow, vars, input, dry_run, Arc::clone(&self.config))
                    .await
            }
            Commands::Validate { workflow } => commands::validate_workflow(workflow).await,
        }
    }
}

/// Load a YAML configuration file into the service. Nested mappings
/// flatten into dotted keys, so `engine: {id_separator: "."}` becomes
/// `engine.id_separator`.
fn load_config_file(config: &ConfigService, path: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file {:?}", path))?;
    let document: Value = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse configuration file {:?}", path))?;
    flatten_into(config, "", &document);
    Ok(())
}

fn flatten_into(config: &ConfigService, prefix: &str, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let full = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(config, &full, nested);
            }
        }
        other => {
            if !prefix.is_empty() {
                config.set(prefix, other.clone());
            }
        }
    }
}
