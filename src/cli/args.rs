// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the main CLI structure and subcommands for waypoint

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "waypoint")]
#[command(about = "A workflow engine that interprets declarative YAML task trees")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a workflow from a YAML file
    Run {
        #[arg(help = "Path to workflow YAML file")]
        workflow: PathBuf,

        #[arg(
            short = 'V',
            long = "var",
            help = "Override workflow variables (key=value)"
        )]
        vars: Vec<String>,

        #[arg(short, long, help = "Workflow input as a JSON document")]
        input: Option<String>,

        #[arg(long, help = "Dry run - validate without executing")]
        dry_run: bool,
    },

    /// Validate a workflow file without executing
    Validate {
        #[arg(help = "Path to workflow YAML file")]
        workflow: PathBuf,
    },
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parse variables from key=value format
    pub fn parse_variables(
        vars: &[String],
    ) -> anyhow::Result<std::collections::HashMap<String, String>> {
        let mut variables = std::collections::HashMap::new();

        for var in vars {
            if let Some((key, value)) = var.split_once('=') {
                variables.insert(key.to_string(), value.to_string());
            } else {
                return Err(anyhow::anyhow!(
                    "Invalid variable format '{}'. Expected 'key=value'",
                    var
                ));
            }
        }

        Ok(variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variables() {
        let vars = vec!["env=production".to_string(), "region=us-east-1".to_string()];
        let parsed = Args::parse_variables(&vars).unwrap();

        assert_eq!(parsed.get("env"), Some(&"production".to_string()));
        assert_eq!(parsed.get("region"), Some(&"us-east-1".to_string()));
    }

    #[test]
    fn test_parse_variables_rejects_bare_keys() {
        let vars = vec!["malformed".to_string()];
        assert!(Args::parse_variables(&vars).is_err());
    }

    #[test]
    fn test_command_line_parsing() {
        let args = Args::try_parse_from([
            "waypoint", "run", "flow.yaml", "--var", "a=1", "--input", "{}", "--dry-run",
        ])
        .unwrap();
        match args.command {
            Commands::Run {
                workflow,
                vars,
                input,
                dry_run,
            } => {
                assert_eq!(workflow, PathBuf::from("flow.yaml"));
                assert_eq!(vars, vec!["a=1".to_string()]);
                assert_eq!(input.as_deref(), Some("{}"));
                assert!(dry_run);
            }
            _ => panic!("expected run command"),
        }
    }
}
