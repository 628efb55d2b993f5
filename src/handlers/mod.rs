// ABOUTME: Task handler contract, invocation types, and the built-in handler pack
// ABOUTME: Handlers return an explicit Completed/Rerun outcome instead of throwing

pub mod conditional;
pub mod delay;
pub mod exec;
pub mod lambda;
pub mod log;
pub mod loops;
pub mod recover;
pub mod subflow;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::engine::error::{EngineError, Result};
use crate::engine::session::ExecutionSession;
use crate::parser::TaskDefinition;
use crate::plugin::{HandlerResolver, Plugin, PluginManager, PRIORITY_BUILTIN};

/// The outcome of one handler invocation. `Rerun` is the engine's sole
/// looping primitive: the handler hands back its updated output (its only
/// persisted state) and asks to be re-invoked after any child collection it
/// attached to the session has run to completion.
#[derive(Debug, Clone)]
pub enum HandlerOutcome {
    Completed(Value),
    Rerun(Value),
}

/// One invocation of a handler. `parameters` are freshly interpolated for
/// every invocation, reruns included; `output` is exactly what the previous
/// invocation of this task instance left behind.
#[derive(Clone)]
pub struct HandlerCall {
    pub task_id: String,
    pub definition: Arc<TaskDefinition>,
    pub parameters: Value,
    pub output: Value,
    /// Set when an attached child collection failed and the handler declared
    /// `handles_child_failure`. Carries the child failure's message.
    pub child_failure: Option<String>,
}

#[derive(Clone)]
pub struct HandlerContext {
    pub session: Arc<ExecutionSession>,
    pub plugins: Arc<PluginManager>,
    pub cancel: CancellationToken,
    /// The interpolation/script context for this invocation: input,
    /// variables, the task's accumulated output, and the parent's output.
    pub scope: Value,
}

#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether an attached child collection's failure re-enters this handler
    /// (with the failure in `call.child_failure`) instead of propagating.
    /// Only recovery-style handlers opt in.
    fn handles_child_failure(&self) -> bool {
        false
    }

    async fn execute(&self, call: HandlerCall, ctx: HandlerContext) -> Result<HandlerOutcome>;
}

/// Parameter accessors shared by the built-in handlers. Missing or
/// mistyped values surface as invalid-parameter conditions naming the field.
pub mod params {
    use super::*;

    pub fn get<'a>(parameters: &'a Value, field: &str) -> Option<&'a Value> {
        match parameters.get(field) {
            Some(Value::Null) | None => None,
            Some(v) => Some(v),
        }
    }

    pub fn require<'a>(parameters: &'a Value, field: &str) -> Result<&'a Value> {
        get(parameters, field)
            .ok_or_else(|| EngineError::invalid_parameter(field, "missing required parameter"))
    }

    pub fn require_str<'a>(parameters: &'a Value, field: &str) -> Result<&'a str> {
        require(parameters, field)?
            .as_str()
            .ok_or_else(|| EngineError::invalid_parameter(field, "expected a string"))
    }

    pub fn opt_str<'a>(parameters: &'a Value, field: &str) -> Result<Option<&'a str>> {
        match get(parameters, field) {
            None => Ok(None),
            Some(v) => v
                .as_str()
                .map(Some)
                .ok_or_else(|| EngineError::invalid_parameter(field, "expected a string")),
        }
    }

    pub fn require_i64(parameters: &Value, field: &str) -> Result<i64> {
        require(parameters, field)?
            .as_i64()
            .ok_or_else(|| EngineError::invalid_parameter(field, "expected an integer"))
    }

    pub fn opt_i64(parameters: &Value, field: &str) -> Result<Option<i64>> {
        match get(parameters, field) {
            None => Ok(None),
            Some(v) => v
                .as_i64()
                .map(Some)
                .ok_or_else(|| EngineError::invalid_parameter(field, "expected an integer")),
        }
    }
}

/// The built-in handler pack, exposed to the interpreter as a low-priority
/// HandlerResolver plugin so external packs can shadow any built-in name.
pub struct Builtins {
    handlers: HashMap<&'static str, Arc<dyn TaskHandler>>,
}

impl Builtins {
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Arc<dyn TaskHandler>> = HashMap::new();
        for handler in [
            Arc::new(conditional::IfHandler) as Arc<dyn TaskHandler>,
            Arc::new(conditional::SwitchHandler),
            Arc::new(loops::ForHandler),
            Arc::new(loops::WhileHandler),
            Arc::new(loops::IterateHandler),
            Arc::new(recover::TryHandler),
            Arc::new(subflow::RunWorkflowHandler),
            Arc::new(delay::DelayHandler),
            Arc::new(exec::ExecHandler),
            Arc::new(lambda::LambdaHandler),
            Arc::new(log::LogHandler),
        ] {
            handlers.insert(handler.name(), handler);
        }
        Self { handlers }
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for Builtins {
    fn name(&self) -> &str {
        "builtin-handlers"
    }

    fn priority(&self) -> i32 {
        PRIORITY_BUILTIN
    }
}

impl HandlerResolver for Builtins {
    fn resolve(&self, handler: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(handler).cloned()
    }
}
