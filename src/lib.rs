// ABOUTME: Main library module for the waypoint workflow engine
// ABOUTME: Exports all core modules and provides the public API

pub mod cli;
pub mod config;
pub mod engine;
pub mod handlers;
pub mod parser;
pub mod plugin;

// Re-export commonly used types
pub use cli::{App, Args};
pub use config::ConfigService;
pub use engine::{Interpreter, TaskStatus, Workflow, WorkflowStatus};
pub use handlers::{HandlerCall, HandlerContext, HandlerOutcome, TaskHandler};
pub use parser::{WorkflowDefinition, WorkflowParser};
pub use plugin::{Plugin, PluginManager, Registration};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
