// ABOUTME: Plugin lifecycle trait, capability contracts, and registration types
// ABOUTME: Every engine extension point is a typed capability resolved by priority

pub mod builtin;
pub mod manager;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

use crate::config::ConfigService;
use crate::engine::error::Result;
use crate::engine::instance::Workflow;
use crate::handlers::TaskHandler;
use crate::parser::WorkflowDefinition;

pub use manager::PluginManager;

/// Priority assigned to the built-in default plugins. Anything registered
/// without an explicit priority sits above this, so user plugins always win.
pub const PRIORITY_BUILTIN: i32 = -100;
pub const PRIORITY_DEFAULT: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Interpolator,
    ScriptEngine,
    Persistence,
    Logger,
    WorkflowRunner,
    HandlerResolver,
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PluginKind::Interpolator => "interpolator",
            PluginKind::ScriptEngine => "script_engine",
            PluginKind::Persistence => "persistence",
            PluginKind::Logger => "logger",
            PluginKind::WorkflowRunner => "workflow_runner",
            PluginKind::HandlerResolver => "handler_resolver",
        };
        write!(f, "{}", s)
    }
}

/// Handed to `load` and `ready`. Carries the configuration service (the
/// initial snapshot is guaranteed current before `ready` fires) and a weak
/// handle back to the manager so plugins can look up sibling capabilities.
#[derive(Clone)]
pub struct PluginContext {
    pub config: Arc<ConfigService>,
    manager: Weak<PluginManager>,
}

impl PluginContext {
    pub(crate) fn new(config: Arc<ConfigService>, manager: Weak<PluginManager>) -> Self {
        Self { config, manager }
    }

    pub fn manager(&self) -> Option<Arc<PluginManager>> {
        self.manager.upgrade()
    }
}

/// Lifecycle contract shared by every plugin. `load` runs for all plugins in
/// registration order (a failure aborts startup); `ready` fires exactly once
/// after every load finished; `unload` runs in reverse order, best-effort.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> i32 {
        PRIORITY_DEFAULT
    }

    async fn load(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    async fn ready(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    async fn unload(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait Interpolator: Send + Sync {
    /// Resolve interpolation expressions in `value` against `context`.
    /// Invoked per parameter set per handler invocation, including reruns.
    async fn interpolate(&self, value: &Value, context: &Value) -> Result<Value>;
}

#[async_trait]
pub trait ScriptEngine: Send + Sync {
    fn language(&self) -> &str;
    fn supports(&self, extension: &str) -> bool;
    async fn run(&self, script: &str, context: &Value) -> Result<Value>;
}

#[async_trait]
pub trait PersistenceUnit: Send + Sync {
    async fn save(&self, id: &str, data: Value) -> Result<()>;
    async fn load(&self, id: &str) -> Result<Option<Value>>;
    async fn remove(&self, id: &str) -> Result<()>;
    async fn list(&self) -> Result<Vec<String>>;
}

pub trait Persistence: Send + Sync {
    fn unit(&self, name: &str) -> Arc<dyn PersistenceUnit>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

#[async_trait]
pub trait WorkflowRunner: Send + Sync {
    /// Run a nested workflow to a terminal state. The caller's cancellation
    /// token must also abort the nested run.
    async fn run(
        &self,
        definition: WorkflowDefinition,
        input: Value,
        cancel: &CancellationToken,
    ) -> Result<Workflow>;
}

pub trait HandlerResolver: Send + Sync {
    fn resolve(&self, handler: &str) -> Option<Arc<dyn TaskHandler>>;
}

/// Capability view of a registered plugin. Registration pairs the lifecycle
/// view with exactly one capability, so call sites get typed accessors
/// instead of string-keyed method dispatch.
#[derive(Clone)]
pub enum Capability {
    Interpolator(Arc<dyn Interpolator>),
    ScriptEngine(Arc<dyn ScriptEngine>),
    Persistence(Arc<dyn Persistence>),
    Logger(Arc<dyn LogSink>),
    WorkflowRunner(Arc<dyn WorkflowRunner>),
    HandlerResolver(Arc<dyn HandlerResolver>),
}

impl Capability {
    pub fn kind(&self) -> PluginKind {
        match self {
            Capability::Interpolator(_) => PluginKind::Interpolator,
            Capability::ScriptEngine(_) => PluginKind::ScriptEngine,
            Capability::Persistence(_) => PluginKind::Persistence,
            Capability::Logger(_) => PluginKind::Logger,
            Capability::WorkflowRunner(_) => PluginKind::WorkflowRunner,
            Capability::HandlerResolver(_) => PluginKind::HandlerResolver,
        }
    }
}

#[derive(Clone)]
pub struct Registration {
    pub plugin: Arc<dyn Plugin>,
    pub capability: Capability,
}

impl Registration {
    pub fn interpolator<P: Plugin + Interpolator + 'static>(plugin: Arc<P>) -> Self {
        Self {
            plugin: plugin.clone(),
            capability: Capability::Interpolator(plugin),
        }
    }

    pub fn script_engine<P: Plugin + ScriptEngine + 'static>(plugin: Arc<P>) -> Self {
        Self {
            plugin: plugin.clone(),
            capability: Capability::ScriptEngine(plugin),
        }
    }

    pub fn persistence<P: Plugin + Persistence + 'static>(plugin: Arc<P>) -> Self {
        Self {
            plugin: plugin.clone(),
            capability: Capability::Persistence(plugin),
        }
    }

    pub fn logger<P: Plugin + LogSink + 'static>(plugin: Arc<P>) -> Self {
        Self {
            plugin: plugin.clone(),
            capability: Capability::Logger(plugin),
        }
    }

    pub fn workflow_runner<P: Plugin + WorkflowRunner + 'static>(plugin: Arc<P>) -> Self {
        Self {
            plugin: plugin.clone(),
            capability: Capability::WorkflowRunner(plugin),
        }
    }

    pub fn handler_resolver<P: Plugin + HandlerResolver + 'static>(plugin: Arc<P>) -> Self {
        Self {
            plugin: plugin.clone(),
            capability: Capability::HandlerResolver(plugin),
        }
    }
}
